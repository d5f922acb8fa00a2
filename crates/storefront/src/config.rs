//! Configuration management for storefront.
//!
//! Configuration is layered with figment: defaults, then a TOML file, then
//! `STOREFRONT_` environment variables (nested keys split on `__`, e.g.
//! `STOREFRONT_SERVER__PORT=9000`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "storefront";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "storefront.db";

/// Default media directory name.
const MEDIA_DIR_NAME: &str = "media";

/// Prefix of configuration environment variables.
const ENV_PREFIX: &str = "STOREFRONT_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `STOREFRONT_`)
/// 2. TOML config file at `~/.config/storefront/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Database and media configuration.
    pub storage: StorageConfig,
    /// Catalog caching and thresholds.
    pub catalog: CatalogConfig,
    /// Password and token configuration.
    pub auth: AuthConfig,
    /// Invoice rendering configuration.
    pub invoice: InvoiceConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Allowed CORS origins; `*` allows any.
    pub cors_origins: Vec<String>,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/storefront/storefront.db`
    pub database_path: Option<PathBuf>,
    /// Directory holding uploaded images and files.
    /// Defaults to `~/.local/share/storefront/media`
    pub media_root: Option<PathBuf>,
    /// Public URL prefix of media files.
    pub media_url: String,
}

/// Catalog caching and thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Lifetime of the cached featured products list.
    pub featured_cache_secs: u64,
    /// Lifetime of the cached category statistics.
    pub categories_cache_secs: u64,
    /// Products with at most this many units count as low stock.
    pub low_stock_threshold: i64,
    /// Minimum average rating of a highly rated product.
    pub high_rating_threshold: f64,
}

/// Password hashing and validation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// PBKDF2 rounds for new password hashes.
    pub pbkdf2_iterations: u32,
    /// Minimum password length at registration.
    pub min_password_length: usize,
}

/// Invoice rendering settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceConfig {
    /// Directory with the TTF font family.
    pub font_dir: PathBuf,
    /// Font family name (file prefix inside `font_dir`).
    pub font_family: String,
    /// Currency sign appended to amounts.
    pub currency: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            media_root: None,
            media_url: crate::storage::DEFAULT_MEDIA_URL.to_string(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            featured_cache_secs: 300,
            categories_cache_secs: 600,
            low_stock_threshold: crate::storage::DEFAULT_LOW_STOCK_THRESHOLD,
            high_rating_threshold: crate::storage::DEFAULT_HIGH_RATING,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: crate::auth::DEFAULT_ITERATIONS,
            min_password_length: crate::auth::DEFAULT_MIN_PASSWORD_LENGTH,
        }
    }
}

impl Default for InvoiceConfig {
    fn default() -> Self {
        Self {
            font_dir: PathBuf::from("/usr/share/fonts/truetype/liberation"),
            font_family: "LiberationSans".to_string(),
            currency: "₽".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("server.port must be greater than 0"));
        }

        if self.auth.pbkdf2_iterations == 0 {
            return Err(invalid("auth.pbkdf2_iterations must be greater than 0"));
        }

        if self.auth.min_password_length < 1 {
            return Err(invalid("auth.min_password_length must be at least 1"));
        }

        if self.catalog.low_stock_threshold <= 0 {
            return Err(invalid("catalog.low_stock_threshold must be greater than 0"));
        }

        if !(1.0..=5.0).contains(&self.catalog.high_rating_threshold) {
            return Err(invalid(format!(
                "catalog.high_rating_threshold ({}) must be between 1 and 5",
                self.catalog.high_rating_threshold
            )));
        }

        if self.invoice.font_family.trim().is_empty() {
            return Err(invalid("invoice.font_family must not be empty"));
        }

        Ok(())
    }

    /// Socket address the server binds to.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a valid address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| invalid(format!("invalid server address: {e}")))
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the media directory, resolving defaults if not set.
    #[must_use]
    pub fn media_root(&self) -> PathBuf {
        self.storage
            .media_root
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(MEDIA_DIR_NAME))
    }

    /// Lifetime of the featured products cache entry.
    #[must_use]
    pub fn featured_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog.featured_cache_secs)
    }

    /// Lifetime of the category statistics cache entry.
    #[must_use]
    pub fn categories_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog.categories_cache_secs)
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.cors_origins, vec!["*".to_string()]);
        assert_eq!(config.storage.media_url, "/media/");
        assert_eq!(config.catalog.low_stock_threshold, 10);
        assert_eq!(config.invoice.currency, "₽");
    }

    #[test]
    fn test_default_catalog_config() {
        let catalog = CatalogConfig::default();

        assert_eq!(catalog.featured_cache_secs, 300);
        assert_eq!(catalog.categories_cache_secs, 600);
        assert!((catalog.high_rating_threshold - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_default_auth_config() {
        let auth = AuthConfig::default();

        assert_eq!(auth.pbkdf2_iterations, 600_000);
        assert_eq!(auth.min_password_length, 8);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("server.port"));
    }

    #[test]
    fn test_validate_zero_iterations() {
        let mut config = Config::default();
        config.auth.pbkdf2_iterations = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("pbkdf2_iterations"));
    }

    #[test]
    fn test_validate_min_password_length() {
        let mut config = Config::default();
        config.auth.min_password_length = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_low_stock_threshold() {
        let mut config = Config::default();
        config.catalog.low_stock_threshold = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("low_stock_threshold"));
    }

    #[test]
    fn test_validate_rating_threshold_range() {
        let mut config = Config::default();
        config.catalog.high_rating_threshold = 5.5;
        assert!(config.validate().is_err());

        config.catalog.high_rating_threshold = 0.5;
        assert!(config.validate().is_err());

        config.catalog.high_rating_threshold = 5.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bind_addr() {
        let config = Config::default();
        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:8000");

        let mut config = Config::default();
        config.server.host = "not a host".to_string();
        assert!(config.bind_addr().is_err());
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        let path = config.database_path();

        assert!(path.to_string_lossy().contains("storefront.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_media_root_default() {
        let config = Config::default();
        assert!(config.media_root().ends_with("storefront/media"));
    }

    #[test]
    fn test_cache_ttls() {
        let config = Config::default();
        assert_eq!(config.featured_ttl(), Duration::from_secs(300));
        assert_eq!(config.categories_ttl(), Duration::from_secs(600));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("storefront"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.auth, AuthConfig::default());
    }

    #[test]
    fn test_load_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9100\n\n[invoice]\ncurrency = \"$\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.invoice.currency, "$");
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[catalog]\nlow_stock_threshold = 0\n").unwrap();

        let err = Config::load_from(Some(path)).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
    }

    #[test]
    fn test_catalog_config_deserialize() {
        let json = r#"{"low_stock_threshold": 3}"#;
        let catalog: CatalogConfig = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.low_stock_threshold, 3);
        assert_eq!(catalog.featured_cache_secs, 300);
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("max_upload_bytes"));
        assert!(json.contains("font_family"));
    }
}
