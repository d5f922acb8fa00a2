//! Error types for invoice rendering.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while rendering an invoice.
#[derive(Error, Debug)]
pub enum InvoiceError {
    /// The font family could not be loaded from disk.
    #[error("failed to load font family '{family}' from {dir}: {message}")]
    FontLoad {
        /// Directory searched for the font files.
        dir: PathBuf,
        /// Font family name.
        family: String,
        /// Description of what went wrong.
        message: String,
    },

    /// The PDF document could not be rendered.
    #[error("failed to render invoice: {0}")]
    Render(String),
}

/// A specialized Result type for invoice operations.
pub type Result<T> = std::result::Result<T, InvoiceError>;

impl From<genpdf::error::Error> for InvoiceError {
    fn from(err: genpdf::error::Error) -> Self {
        Self::Render(err.to_string())
    }
}
