//! Invoice document structure.
//!
//! Builds the text content of every section of an invoice from an order
//! snapshot. The renderer only decides how the strings are placed on a page.

use chrono::{DateTime, Utc};

/// Column headers of the line-item table.
pub const ITEM_HEADER: [&str; 4] = ["Product", "Price", "Qty", "Amount"];

/// Label placed in the quantity column of the total row.
const TOTAL_LABEL: &str = "TOTAL:";

/// A single order line as it appears on the invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceLine {
    /// Product name.
    pub name: String,
    /// Unit price at the time of ordering, in minor units.
    pub unit_price_minor: i64,
    /// Ordered quantity.
    pub quantity: u32,
}

impl InvoiceLine {
    /// Create a new invoice line.
    #[must_use]
    pub fn new(name: impl Into<String>, unit_price_minor: i64, quantity: u32) -> Self {
        Self {
            name: name.into(),
            unit_price_minor,
            quantity,
        }
    }

    /// Line total in minor units, saturating at the `i64` bounds.
    #[must_use]
    pub fn total_minor(&self) -> i64 {
        self.unit_price_minor.saturating_mul(i64::from(self.quantity))
    }
}

/// Snapshot of an order used to build an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceData {
    /// Human-facing order number.
    pub order_number: String,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
    /// Display label of the order status.
    pub status: String,
    /// Customer line, usually `"Name (email)"`.
    pub customer: String,
    /// Contact phone number.
    pub phone: String,
    /// Delivery address.
    pub shipping_address: String,
    /// Customer notes, omitted from the invoice when empty.
    pub notes: Option<String>,
    /// Ordered items.
    pub lines: Vec<InvoiceLine>,
    /// Stored order total in minor units.
    pub total_minor: i64,
}

/// One row of the line-item table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRow {
    /// Product name.
    pub name: String,
    /// Formatted unit price.
    pub price: String,
    /// Formatted quantity.
    pub quantity: String,
    /// Formatted line total.
    pub amount: String,
}

/// The complete text content of an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceLayout {
    /// Document title.
    pub title: String,
    /// Label/value pairs of the order metadata table.
    pub metadata: Vec<(String, String)>,
    /// Heading above the line-item table.
    pub items_heading: String,
    /// Line-item rows, without header and total.
    pub items: Vec<ItemRow>,
    /// Total row: label and formatted amount.
    pub total: (String, String),
}

impl InvoiceLayout {
    /// Build the invoice layout for an order.
    ///
    /// `currency` is appended to every amount, e.g. `"2499.00 ₽"`.
    #[must_use]
    pub fn build(data: &InvoiceData, currency: &str) -> Self {
        let money = |minor: i64| format!("{} {currency}", format_minor_units(minor));

        let mut metadata = vec![
            (
                "Order date:".to_string(),
                data.created_at.format("%d.%m.%Y %H:%M").to_string(),
            ),
            ("Status:".to_string(), data.status.clone()),
            ("Customer:".to_string(), data.customer.clone()),
            ("Phone:".to_string(), data.phone.clone()),
            ("Shipping address:".to_string(), data.shipping_address.clone()),
        ];

        if let Some(notes) = data.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            metadata.push(("Notes:".to_string(), notes.to_string()));
        }

        let items = data
            .lines
            .iter()
            .map(|line| ItemRow {
                name: line.name.clone(),
                price: money(line.unit_price_minor),
                quantity: line.quantity.to_string(),
                amount: money(line.total_minor()),
            })
            .collect();

        Self {
            title: format!("ORDER No. {}", data.order_number),
            metadata,
            items_heading: "Order items:".to_string(),
            items,
            total: (TOTAL_LABEL.to_string(), money(data.total_minor)),
        }
    }
}

/// Format an amount in minor units as a decimal string with two digits.
///
/// ```
/// use storefront_invoice::format_minor_units;
///
/// assert_eq!(format_minor_units(123_450), "1234.50");
/// assert_eq!(format_minor_units(-5), "-0.05");
/// ```
#[must_use]
pub fn format_minor_units(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// File name offered for an invoice download: `<order_number>_<YYYYMMDD>.pdf`.
#[must_use]
pub fn invoice_filename(order_number: &str, today: DateTime<Utc>) -> String {
    format!("{order_number}_{}.pdf", today.format("%Y%m%d"))
}
