//! Uploaded media files (product images, product files, profile pictures).
//!
//! Files live under a media root and are referenced in the database by a
//! relative path such as `products/3f2a91c0d4e5_phone.jpg`. The prefix is
//! the BLAKE3 hash of the content, so re-uploading the same bytes under the
//! same name reuses the file.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Upload sub-directory for product images.
pub const PRODUCT_IMAGES: &str = "products";
/// Upload sub-directory for downloadable product files.
pub const PRODUCT_FILES: &str = "product_files";
/// Upload sub-directory for profile pictures.
pub const PROFILE_PICTURES: &str = "profile_pics";

/// Hex characters of the content hash kept in file names.
const HASH_PREFIX_LEN: usize = 12;

/// Longest kept file name stem.
const MAX_STEM_LEN: usize = 80;

/// Media directory on disk.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    /// Media store rooted at `root`; the directory is created on first save.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Media root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` under `dir` and return the stored relative path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, dir: &str, original_name: &str, bytes: &[u8]) -> Result<String> {
        let hash = blake3::hash(bytes).to_hex().to_string();
        let name = format!("{}_{}", &hash[..HASH_PREFIX_LEN], sanitize_file_name(original_name));
        let relative = format!("{dir}/{name}");

        let target_dir = self.root.join(dir);
        if !target_dir.exists() {
            std::fs::create_dir_all(&target_dir).map_err(|source| Error::DirectoryCreate {
                path: target_dir.clone(),
                source,
            })?;
        }
        std::fs::write(target_dir.join(&name), bytes)?;

        debug!(path = %relative, size = bytes.len(), "Saved media file");
        Ok(relative)
    }

    /// Absolute path of a stored file. Paths escaping the root are refused.
    ///
    /// # Errors
    ///
    /// Returns a validation error for absolute paths or `..` components.
    pub fn resolve(&self, stored: &str) -> Result<PathBuf> {
        let relative = Path::new(stored);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(Error::validation(format!("invalid media path: {stored}")));
        }
        Ok(self.root.join(relative))
    }

    /// Read a stored file.
    ///
    /// # Errors
    ///
    /// Returns not found when the file is missing.
    pub fn read(&self, stored: &str) -> Result<Vec<u8>> {
        let path = self.resolve(stored)?;
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::not_found("file")
            } else {
                Error::Io(e)
            }
        })
    }

    /// Delete a stored file. Missing files are ignored.
    pub fn remove(&self, stored: &str) {
        let Ok(path) = self.resolve(stored) else {
            return;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %stored, "Removed media file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %stored, error = %e, "Failed to remove media file"),
        }
    }
}

/// Keep only the final path component, with unsafe characters replaced.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (base, None),
    };

    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    };

    let mut stem: String = clean(stem).chars().take(MAX_STEM_LEN).collect();
    if stem.trim_matches('_').is_empty() {
        stem = "upload".to_string();
    }
    match ext.map(clean).filter(|e| !e.is_empty()) {
        Some(ext) => format!("{stem}.{}", ext.to_lowercase()),
        None => stem,
    }
}
