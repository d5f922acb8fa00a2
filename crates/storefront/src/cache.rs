//! In-process cache for expensive catalog summaries.
//!
//! Holds the featured product list and category statistics. Each entry
//! expires after its own TTL; catalog writes made through the API clear
//! both. Writes from other processes show up once the entries expire.

use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::model::{CategoryStats, FeaturedProduct};

/// A value and the moment it stops being fresh.
#[derive(Debug)]
struct Slot<T> {
    ttl: Duration,
    entry: RwLock<Option<(Instant, T)>>,
}

impl<T: Clone> Slot<T> {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
        }
    }

    fn get(&self) -> Option<T> {
        let entry = self.entry.read();
        entry
            .as_ref()
            .filter(|(expires, _)| Instant::now() < *expires)
            .map(|(_, value)| value.clone())
    }

    fn get_or_load(&self, name: &str, load: impl FnOnce() -> Result<T>) -> Result<T> {
        if let Some(value) = self.get() {
            debug!(entry = name, "Cache hit");
            return Ok(value);
        }
        debug!(entry = name, "Cache miss");
        let value = load()?;
        *self.entry.write() = Some((Instant::now() + self.ttl, value.clone()));
        Ok(value)
    }

    fn clear(&self) {
        *self.entry.write() = None;
    }
}

/// Featured products and category statistics with per-entry TTLs.
#[derive(Debug)]
pub struct CatalogCache {
    featured: Slot<Vec<FeaturedProduct>>,
    categories: Slot<Vec<CategoryStats>>,
}

impl CatalogCache {
    /// Cache with the given lifetimes.
    #[must_use]
    pub fn new(featured_ttl: Duration, categories_ttl: Duration) -> Self {
        Self {
            featured: Slot::new(featured_ttl),
            categories: Slot::new(categories_ttl),
        }
    }

    /// Cache with lifetimes from the `[catalog]` section.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.featured_ttl(), config.categories_ttl())
    }

    /// Featured products, calling `load` when absent or stale.
    ///
    /// # Errors
    ///
    /// Returns the loader's error; nothing is cached in that case.
    pub fn featured(
        &self,
        load: impl FnOnce() -> Result<Vec<FeaturedProduct>>,
    ) -> Result<Vec<FeaturedProduct>> {
        self.featured.get_or_load("featured_products", load)
    }

    /// Category statistics, calling `load` when absent or stale.
    ///
    /// # Errors
    ///
    /// Returns the loader's error; nothing is cached in that case.
    pub fn category_stats(
        &self,
        load: impl FnOnce() -> Result<Vec<CategoryStats>>,
    ) -> Result<Vec<CategoryStats>> {
        self.categories.get_or_load("categories_with_counts", load)
    }

    /// Drop both entries after a product or category change.
    pub fn invalidate(&self) {
        self.featured.clear();
        self.categories.clear();
        debug!("Catalog cache invalidated");
    }
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
