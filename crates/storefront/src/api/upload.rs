//! Multipart form reading for uploads.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::Multipart;

use super::error::{ApiError, ApiResult};

/// An uploaded file part.
#[derive(Debug)]
pub struct UploadedFile {
    /// Client-side file name.
    pub file_name: String,
    /// File contents.
    pub bytes: Bytes,
}

/// Text fields and the single file part of a multipart form.
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    file: Option<UploadedFile>,
}

impl UploadForm {
    /// Read every part; the part named `file_field` is kept as the file.
    ///
    /// # Errors
    ///
    /// Returns a 400 for malformed multipart bodies.
    pub async fn read(mut multipart: Multipart, file_field: &str) -> ApiResult<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == file_field {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await?;
                form.file = Some(UploadedFile { file_name, bytes });
            } else {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    /// Take the file part.
    ///
    /// # Errors
    ///
    /// Returns a 400 naming `field` when no file was sent.
    pub fn take_file(&mut self, field: &'static str) -> ApiResult<UploadedFile> {
        self.file
            .take()
            .filter(|file| !file.bytes.is_empty())
            .ok_or_else(|| ApiError::bad_field(field, format!("{field} is required")))
    }

    /// A text field, trimmed; `None` when absent or blank.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// A required integer field.
    ///
    /// # Errors
    ///
    /// Returns a 400 naming `name` when missing or not an integer.
    pub fn integer(&self, name: &'static str) -> ApiResult<i64> {
        let value = self
            .text(name)
            .ok_or_else(|| ApiError::bad_field(name, format!("{name} is required")))?;
        value
            .parse()
            .map_err(|_| ApiError::bad_field(name, format!("{name} must be an integer")))
    }

    /// An optional integer field, `default` when absent.
    ///
    /// # Errors
    ///
    /// Returns a 400 naming `name` when present but not an integer.
    pub fn integer_or(&self, name: &'static str, default: i64) -> ApiResult<i64> {
        match self.text(name) {
            None => Ok(default),
            Some(_) => self.integer(name),
        }
    }

    /// A boolean field: `true`/`1`/`on`/`yes` are true, absent is false.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.text(name).is_some_and(|v| {
            matches!(
                v.to_ascii_lowercase().as_str(),
                "true" | "1" | "on" | "yes"
            )
        })
    }
}
