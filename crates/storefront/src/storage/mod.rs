//! Storage layer for the storefront.
//!
//! A single `SQLite` connection holds the whole shop: accounts, catalog,
//! reviews, wishlists, carts and orders. Repository operations are split by
//! concern into submodules, each adding methods to [`Storage`]. Operations
//! that touch several rows (checkout, primary image switch, bulk status
//! changes) run inside one transaction.

mod accounts;
mod catalog;
pub mod migrations;
mod orders;
mod products;
mod reviews;
pub mod schema;
mod shopping;

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::validate::slug_candidate;

pub use accounts::NewAccount;
pub use catalog::CategoryQuery;
pub use orders::DEFAULT_RECENT_DAYS;
pub use products::{DEFAULT_HIGH_RATING, DEFAULT_LOW_STOCK_THRESHOLD};
pub use reviews::ReviewRights;

/// Default public prefix for media URLs.
pub const DEFAULT_MEDIA_URL: &str = "/media/";

/// Storage engine for the shop database.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
    /// Public prefix prepended to stored media paths.
    media_url: String,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist,
    /// enables WAL and foreign keys, and brings the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;
        register_functions(&conn)?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self {
            path,
            conn,
            media_url: DEFAULT_MEDIA_URL.to_string(),
        })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        register_functions(&conn)?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
            media_url: DEFAULT_MEDIA_URL.to_string(),
        })
    }

    /// Use `media_url` as the public prefix for media paths.
    #[must_use]
    pub fn with_media_url(mut self, media_url: impl Into<String>) -> Self {
        self.media_url = media_url.into();
        self
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Public URL for a stored media path.
    #[must_use]
    pub fn media_url(&self, stored: &str) -> String {
        join_media_url(&self.media_url, stored)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let mut tables = Vec::with_capacity(schema::COUNTED_TABLES.len());
        for table in schema::COUNTED_TABLES {
            let rows: i64 =
                self.conn
                    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                        row.get(0)
                    })?;
            tables.push(TableCount { table, rows });
        }

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            tables,
            schema_version: migrations::schema_version(&self.conn)?,
            db_size_bytes,
        })
    }

    /// Run `f` atomically inside a savepoint.
    ///
    /// Savepoints nest, so multi-row operations can be grouped into a larger
    /// unit (the seeder wraps everything it writes in one).
    ///
    /// # Errors
    ///
    /// Returns the error of `f` after rolling its changes back.
    pub fn atomic<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.conn.execute_batch("SAVEPOINT storefront_atomic")?;
        match f() {
            Ok(value) => {
                self.conn.execute_batch("RELEASE storefront_atomic")?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self
                    .conn
                    .execute_batch("ROLLBACK TO storefront_atomic; RELEASE storefront_atomic")
                {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Pick a slug for `table` based on `base`, adding `-2`, `-3`, ... until
    /// it is free. `exclude_id` ignores the row being renamed.
    fn unique_slug(&self, table: &'static str, base: &str, exclude_id: Option<i64>) -> Result<String> {
        let base = if base.is_empty() { "item" } else { base };
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE slug = ?1 AND id != ?2");
        let exclude = exclude_id.unwrap_or(-1);

        let mut attempt = 1;
        loop {
            let candidate = slug_candidate(base, attempt);
            let taken: i64 = self
                .conn
                .query_row(&sql, rusqlite::params![candidate, exclude], |row| row.get(0))?;
            if taken == 0 {
                return Ok(candidate);
            }
            attempt += 1;
        }
    }
}

/// `casefold(text)`: Unicode lowercase, for case-insensitive search.
///
/// `SQLite`'s own `lower()` only folds ASCII.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|v| v.to_lowercase()))
        },
    )?;
    Ok(())
}

/// `%needle%` for a `casefold(column) LIKE ?` search.
fn search_pattern(query: &str) -> String {
    format!("%{}%", query.trim().to_lowercase())
}

/// Current time as stored in the database.
fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Convert an optional limit to SQL, where -1 means unlimited.
fn sql_limit(limit: Option<usize>) -> i64 {
    limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX))
}

fn join_media_url(prefix: &str, stored: &str) -> String {
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        stored.trim_start_matches('/')
    )
}

/// Row count for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    /// Table name.
    pub table: &'static str,
    /// Number of rows.
    pub rows: i64,
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Row counts per table.
    pub tables: Vec<TableCount>,
    /// Applied schema version.
    pub schema_version: i32,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

impl StorageStats {
    /// Row count for `table`, 0 if it is not tracked.
    #[must_use]
    pub fn rows(&self, table: &str) -> i64 {
        self.tables
            .iter()
            .find(|t| t.table == table)
            .map_or(0, |t| t.rows)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_open_in_memory() {
        assert!(Storage::open_in_memory().is_ok());
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let storage = storage();
        let on: i64 = storage
            .conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(on, 1);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested/shop.db");

        let storage = Storage::open(&nested).unwrap();
        assert!(nested.exists());
        assert_eq!(storage.path(), nested);
    }

    #[test]
    fn test_stats_empty() {
        let stats = storage().stats().unwrap();
        assert_eq!(stats.rows("products"), 0);
        assert_eq!(stats.rows("unknown"), 0);
        assert_eq!(stats.schema_version, migrations::CURRENT_VERSION);
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_stats_with_data() {
        let storage = storage();
        product(&storage, "Phone", 100, 1);
        user(&storage, "ivan");

        let stats = storage.stats().unwrap();
        assert_eq!(stats.rows("products"), 1);
        assert_eq!(stats.rows("categories"), 1);
        assert_eq!(stats.rows("users"), 1);
    }

    #[test]
    fn test_stats_db_size() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path().join("shop.db")).unwrap();
        assert!(storage.stats().unwrap().db_size_bytes > 0);
    }

    #[test]
    fn test_unique_slug_suffixes() {
        let storage = storage();
        product(&storage, "Phone", 100, 1);
        product(&storage, "Phone", 100, 1);
        product(&storage, "Phone", 100, 1);

        let slug = storage.unique_slug("products", "phone", None).unwrap();
        assert_eq!(slug, "phone-4");

        let first = storage.product_by_slug("phone").unwrap().unwrap();
        let kept = storage
            .unique_slug("products", "phone", Some(first.summary.id))
            .unwrap();
        assert_eq!(kept, "phone");
    }

    #[test]
    fn test_media_url() {
        let storage = storage();
        assert_eq!(storage.media_url("products/a.jpg"), "/media/products/a.jpg");

        let storage = storage.with_media_url("https://cdn.example/m");
        assert_eq!(
            storage.media_url("/products/a.jpg"),
            "https://cdn.example/m/products/a.jpg"
        );
    }

    #[test]
    fn test_casefold_matches_cyrillic() {
        let storage = storage();
        let hit: bool = storage
            .conn
            .query_row(
                "SELECT casefold('СМАРТФОН Pro') LIKE ?1",
                [search_pattern("смартфон")],
                |row| row.get(0),
            )
            .unwrap();
        assert!(hit);
    }

    #[test]
    fn test_atomic_rolls_back_nested_work() {
        let storage = storage();
        let result: Result<()> = storage.atomic(|| {
            product(&storage, "Phone", 100, 1);
            storage.atomic(|| {
                user(&storage, "ivan");
                Ok(())
            })?;
            Err(Error::internal("abort"))
        });
        assert!(result.is_err());

        let stats = storage.stats().unwrap();
        assert_eq!(stats.rows("products"), 0);
        assert_eq!(stats.rows("users"), 0);
    }

    #[test]
    fn test_atomic_commits_on_success() {
        let storage = storage();
        let id = storage
            .atomic(|| Ok(product(&storage, "Phone", 100, 1)))
            .unwrap();
        assert!(storage.get_product(id).unwrap().is_some());
    }

    #[test]
    fn test_sql_limit() {
        assert_eq!(sql_limit(None), -1);
        assert_eq!(sql_limit(Some(5)), 5);
    }
}
