//! Order invoices as PDF documents.

use chrono::Utc;
use storefront_invoice::{invoice_filename, render_pdf, FontSpec, InvoiceLayout};
use tracing::info;

use crate::config::InvoiceConfig;
use crate::error::Result;
use crate::storage::Storage;

/// A rendered invoice ready for download.
#[derive(Debug, Clone)]
pub struct RenderedInvoice {
    /// Suggested download name, `<order_number>_<YYYYMMDD>.pdf`.
    pub filename: String,
    /// PDF bytes.
    pub pdf: Vec<u8>,
}

/// Render the invoice of an order.
///
/// # Errors
///
/// Returns not found for unknown orders and an invoice error when the font
/// family cannot be loaded or rendering fails.
pub fn render_order_invoice(
    storage: &Storage,
    order_id: i64,
    config: &InvoiceConfig,
) -> Result<RenderedInvoice> {
    let data = storage.invoice_data(order_id)?;
    let layout = InvoiceLayout::build(&data, &config.currency);
    let pdf = render_pdf(&layout, &FontSpec::new(&config.font_dir, &config.font_family))?;

    info!(order_id, size = pdf.len(), "Rendered invoice");
    Ok(RenderedInvoice {
        filename: invoice_filename(&data.order_number, Utc::now()),
        pdf,
    })
}

/// `Content-Disposition` value for an invoice download.
#[must_use]
pub fn content_disposition(filename: &str) -> String {
    format!("attachment; filename=\"{filename}\"")
}
