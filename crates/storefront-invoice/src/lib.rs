//! `storefront-invoice` - order invoices for the storefront backend
//!
//! Invoices are produced in two steps. [`InvoiceLayout::build`] turns an
//! [`InvoiceData`] snapshot of an order into the fixed document structure
//! (title, order metadata table, line-item table, total row) as plain
//! strings. [`render_pdf`] then lays that structure out on A4 pages.
//!
//! Only rendering needs font files: a TTF family loaded from disk, so that
//! Cyrillic product names come out right.
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use storefront_invoice::{render_pdf, FontSpec, InvoiceData, InvoiceLayout, InvoiceLine};
//!
//! let data = InvoiceData {
//!     order_number: "ORD-20240115-1a2b3c4d".to_string(),
//!     created_at: Utc::now(),
//!     status: "Pending".to_string(),
//!     customer: "Ivan Petrov (ivan@example.com)".to_string(),
//!     phone: "+7 900 000-00-00".to_string(),
//!     shipping_address: "Moscow, Tverskaya 1".to_string(),
//!     notes: None,
//!     lines: vec![InvoiceLine::new("Kettle", 249_900, 1)],
//!     total_minor: 249_900,
//! };
//!
//! let layout = InvoiceLayout::build(&data, "₽");
//! let font = FontSpec::new("/usr/share/fonts/truetype/liberation", "LiberationSans");
//! let pdf = render_pdf(&layout, &font).unwrap();
//! assert!(pdf.starts_with(b"%PDF"));
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

mod error;
mod layout;
mod render;

pub use error::{InvoiceError, Result};
pub use layout::{
    format_minor_units, invoice_filename, InvoiceData, InvoiceLayout, InvoiceLine, ItemRow,
    ITEM_HEADER,
};
pub use render::{render_pdf, FontSpec};
