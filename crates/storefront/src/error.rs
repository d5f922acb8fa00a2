//! Error types for storefront.
//!
//! This module defines all error types used throughout the storefront crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for storefront operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Domain Errors ===
    /// Input failed validation.
    #[error("{message}")]
    Validation {
        /// Offending field, when the failure is tied to one.
        field: Option<&'static str>,
        /// Description of the validation failure.
        message: String,
    },

    /// The requested record does not exist.
    #[error("{entity} not found")]
    NotFound {
        /// Kind of record that was looked up.
        entity: &'static str,
    },

    /// The operation conflicts with existing data (e.g. a unique value).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The caller is not allowed to perform the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Credentials are missing or invalid.
    #[error("authentication failed: {0}")]
    Authentication(String),

    // === Invoice Errors ===
    /// Invoice rendering failed.
    #[error("invoice error: {0}")]
    Invoice(#[from] storefront_invoice::InvoiceError),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for storefront operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a validation error that is not tied to a field.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            field: None,
            message: message.into(),
        }
    }

    /// Create a validation error for a specific input field.
    #[must_use]
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: Some(field),
            message: message.into(),
        }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    /// Create a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a permission denied error.
    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }

    /// Create an authentication error.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error means a record was missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is a validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Translate SQLite constraint failures into domain errors.
    ///
    /// Unique violations become [`Error::Conflict`], foreign key violations
    /// become validation errors; everything else is kept as a query error.
    #[must_use]
    pub fn from_constraint(err: rusqlite::Error, what: &str) -> Self {
        if let rusqlite::Error::SqliteFailure(ref code, ref message) = err {
            if code.code == rusqlite::ErrorCode::ConstraintViolation {
                let detail = message.as_deref().unwrap_or_default();
                if detail.contains("UNIQUE") {
                    return Self::conflict(format!("{what} already exists"));
                }
                if detail.contains("FOREIGN KEY") {
                    return Self::validation(format!("{what} references missing or protected data"));
                }
                if detail.contains("CHECK") {
                    return Self::validation(format!("{what} has an out-of-range value"));
                }
            }
        }
        Self::DatabaseQuery(err)
    }
}

/// Extension for mapping rusqlite results through [`Error::from_constraint`].
pub trait ConstraintExt<T> {
    /// Map constraint failures on `what` into domain errors.
    ///
    /// # Errors
    ///
    /// Returns the translated error when the underlying operation failed.
    fn on_constraint(self, what: &str) -> Result<T>;
}

impl<T> ConstraintExt<T> for std::result::Result<T, rusqlite::Error> {
    fn on_constraint(self, what: &str) -> Result<T> {
        self.map_err(|e| Error::from_constraint(e, what))
    }
}

/// Extension for turning an absent lookup result into [`Error::NotFound`].
pub trait FoundExt<T> {
    /// Fail with `entity not found` when the value is absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for `None`, or the original error.
    fn found(self, entity: &'static str) -> Result<T>;
}

impl<T> FoundExt<T> for Result<Option<T>> {
    fn found(self, entity: &'static str) -> Result<T> {
        self?.ok_or(Error::NotFound { entity })
    }
}
