//! Shared handler state.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::auth::Authenticator;
use crate::cache::CatalogCache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::media::MediaStore;
use crate::storage::Storage;

use super::error::ApiResult;

/// State cloned into every handler.
///
/// The database connection sits behind a mutex; handlers lock it only for
/// synchronous storage calls through [`AppState::db`]. CPU-heavy work such as
/// password hashing goes through [`blocking`] with the lock released.
#[derive(Debug, Clone)]
pub struct AppState {
    storage: Arc<Mutex<Storage>>,
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// Featured products and category statistics.
    pub cache: Arc<CatalogCache>,
    /// Uploaded files.
    pub media: MediaStore,
    /// Password and token handling.
    pub auth: Authenticator,
}

impl AppState {
    /// Build the state around an open storage.
    #[must_use]
    pub fn new(storage: Storage, config: Config) -> Self {
        let storage = storage.with_media_url(config.storage.media_url.clone());
        Self {
            storage: Arc::new(Mutex::new(storage)),
            cache: Arc::new(CatalogCache::from_config(&config)),
            media: MediaStore::new(config.media_root()),
            auth: Authenticator::from_config(&config.auth),
            config: Arc::new(config),
        }
    }

    /// Run `f` with the locked storage.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, converted to an HTTP error.
    pub fn db<T>(&self, f: impl FnOnce(&Storage) -> Result<T>) -> ApiResult<T> {
        let storage = self.storage.lock();
        f(&storage).map_err(Into::into)
    }
}

/// Run `f` on the blocking thread pool.
///
/// # Errors
///
/// Returns whatever `f` returns, or an internal error if the task panicked.
pub(super) async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::internal(format!("blocking task failed: {e}")))?
        .map_err(Into::into)
}
