//! `storefront` - An online shop backend
//!
//! This library provides the catalog, customer accounts, wishlists, carts,
//! orders and invoices of a small shop, the REST API that exposes them and
//! the administration console built on top of the same storage.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod api;
pub mod auth;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod invoice;
pub mod logging;
pub mod media;
pub mod model;
pub mod money;
pub mod seed;
pub mod storage;
pub mod validate;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use money::Money;
pub use storage::{Storage, StorageStats};

/// Crate version reported by `/api/health`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
