//! Database schema versioning.
//!
//! The base schema is created idempotently on every open; numbered
//! migrations then bring older databases up to [`CURRENT_VERSION`].

use rusqlite::Connection;
use tracing::info;

use crate::error::{Error, Result};

use super::schema::SCHEMA_STATEMENTS;

/// The current schema version.
pub const CURRENT_VERSION: i32 = 2;

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// Initialize the database schema and run pending migrations.
///
/// # Errors
///
/// Returns an error if schema creation or migration fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute_batch(statement)?;
    }

    let version = schema_version(conn)?;
    if version < CURRENT_VERSION {
        run_migrations(conn, version)?;
    }

    Ok(())
}

/// Get the schema version recorded in the database, 0 when unset.
///
/// # Errors
///
/// Returns an error if the stored value cannot be read or parsed.
pub fn schema_version(conn: &Connection) -> Result<i32> {
    let result: std::result::Result<String, rusqlite::Error> = conn.query_row(
        "SELECT value FROM metadata WHERE key = ?1",
        [VERSION_KEY],
        |row| row.get(0),
    );

    match result {
        Ok(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}

fn run_migrations(conn: &Connection, from_version: i32) -> Result<()> {
    let mut current = from_version;

    while current < CURRENT_VERSION {
        current += 1;
        run_migration(conn, current)?;
        info!(version = current, "Applied schema migration");
    }

    set_schema_version(conn, CURRENT_VERSION)?;
    Ok(())
}

fn run_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => set_schema_version(conn, 1),
        2 => migrate_v2(conn),
        _ => Err(Error::DatabaseMigration {
            message: format!("unknown migration version: {version}"),
        }),
    }
}

/// Version 2: at most one primary image per product.
///
/// Older databases may hold several primary images for a product; keep the
/// first by position before the partial unique index is created.
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        UPDATE product_images SET is_primary = 0
        WHERE is_primary = 1 AND id NOT IN (
            SELECT MIN(id) FROM product_images pi
            WHERE pi.is_primary = 1
              AND pi.position = (
                  SELECT MIN(position) FROM product_images
                  WHERE product_id = pi.product_id AND is_primary = 1
              )
            GROUP BY pi.product_id
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_product_images_one_primary
            ON product_images(product_id) WHERE is_primary = 1;
        ",
    )
    .map_err(|e| Error::DatabaseMigration {
        message: format!("v2: {e}"),
    })?;
    set_schema_version(conn, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().expect("failed to create in-memory database");
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [name],
                |row| row.get(0),
            )
            .unwrap();
        count == 1
    }

    #[test]
    fn test_initialize_schema_creates_tables() {
        let conn = create_test_db();
        initialize_schema(&conn).expect("failed to initialize schema");

        for table in ["metadata", "users", "products", "orders", "order_items"] {
            assert!(table_exists(&conn, table), "missing {table}");
        }
    }

    #[test]
    fn test_initialize_schema_sets_version() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_initialize_schema_idempotent() {
        let conn = create_test_db();
        initialize_schema(&conn).expect("first init failed");
        initialize_schema(&conn).expect("second init failed");
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_schema_version_fresh_db() {
        let conn = create_test_db();
        conn.execute(
            "CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )
        .unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);
    }

    #[test]
    fn test_run_migration_unknown_version() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();

        let err = run_migration(&conn, 999).unwrap_err();
        assert!(err.to_string().contains("unknown migration version"));
    }

    #[test]
    fn test_v2_keeps_single_primary_image() {
        let conn = create_test_db();
        for statement in SCHEMA_STATEMENTS {
            conn.execute_batch(statement).unwrap();
        }
        set_schema_version(&conn, 1).unwrap();
        conn.execute_batch(
            r"
            INSERT INTO categories (name, slug) VALUES ('C', 'c');
            INSERT INTO brands (name, slug) VALUES ('B', 'b');
            INSERT INTO products (name, slug, category_id, brand_id, price, created_at, updated_at)
                VALUES ('P', 'p', 1, 1, 100, '2024-01-01T00:00:00+00:00', '2024-01-01T00:00:00+00:00');
            INSERT INTO product_images (product_id, image, is_primary, position) VALUES (1, 'a.jpg', 1, 2);
            INSERT INTO product_images (product_id, image, is_primary, position) VALUES (1, 'b.jpg', 1, 0);
            ",
        )
        .unwrap();

        initialize_schema(&conn).unwrap();

        let primary: String = conn
            .query_row(
                "SELECT image FROM product_images WHERE is_primary = 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(primary, "b.jpg");

        let second = conn.execute(
            "UPDATE product_images SET is_primary = 1 WHERE image = 'a.jpg'",
            [],
        );
        assert!(second.is_err());
    }

    #[test]
    fn test_indexes_created() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();

        let indexes: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(std::result::Result::ok)
            .collect();

        assert!(indexes.iter().any(|n| n == "idx_products_category"));
        assert!(indexes.iter().any(|n| n == "idx_orders_user"));
        assert!(indexes.iter().any(|n| n == "idx_product_images_one_primary"));
    }
}
