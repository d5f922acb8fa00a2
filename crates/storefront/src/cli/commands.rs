//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::model::{OrderStatus, StockLevel};

/// Server command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to bind, overriding `server.host`
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on, overriding `server.port`
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Seed command arguments.
#[derive(Debug, Args)]
pub struct SeedCommand {
    /// Number of products to create
    #[arg(long, default_value = "50")]
    pub count: usize,

    /// Number of customer accounts to create
    #[arg(long, default_value = "20")]
    pub users: usize,
}

/// User account commands.
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Create a user account
    Create {
        /// Login name
        username: String,

        /// E-mail address
        email: String,

        /// Password (checked against the password policy)
        #[arg(long)]
        password: String,

        /// First name
        #[arg(long, default_value = "")]
        first_name: String,

        /// Last name
        #[arg(long, default_value = "")]
        last_name: String,

        /// Grant staff rights
        #[arg(long)]
        staff: bool,
    },

    /// List user accounts
    List {
        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Grant staff rights to a user
    Promote {
        /// Login name
        username: String,
    },

    /// Disable a user account and revoke its token
    Deactivate {
        /// Login name
        username: String,
    },
}

/// Category commands.
#[derive(Debug, Subcommand)]
pub enum CategoryCommand {
    /// List categories with product counts
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

/// Brand commands.
#[derive(Debug, Subcommand)]
pub enum BrandCommand {
    /// List brands with product counts
    List {
        /// Filter by name
        #[arg(short, long)]
        search: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

/// Product commands.
#[derive(Debug, Subcommand)]
pub enum ProductCommand {
    /// List products
    List {
        /// Filter by stock band
        #[arg(long, value_enum)]
        stock: Option<StockArg>,

        /// Filter by category slug
        #[arg(long)]
        category: Option<String>,

        /// Search name, description, brand and category
        #[arg(short, long)]
        search: Option<String>,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only available products rated at or above the configured threshold
        #[arg(long, conflicts_with_all = ["stock", "category", "search"])]
        top_rated: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Change price, stock or flags of a product
    Update {
        /// Product id
        id: i64,

        /// New price, e.g. 1299.90
        #[arg(long)]
        price: Option<String>,

        /// New stock count
        #[arg(long)]
        stock: Option<i64>,

        /// Whether the product is for sale
        #[arg(long)]
        available: Option<bool>,

        /// Whether the product is featured
        #[arg(long)]
        featured: Option<bool>,
    },
}

/// Review commands.
#[derive(Debug, Subcommand)]
pub enum ReviewCommand {
    /// List reviews
    List {
        /// Rating filter: 5 and 1 are exact, 2 to 4 mean "or more"
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: Option<u8>,

        /// Filter by product id
        #[arg(short, long)]
        product: Option<i64>,

        /// Only reviews that already have a response
        #[arg(long)]
        answered: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Set the shop's response to a review
    Respond {
        /// Review id
        id: i64,

        /// Response text
        text: String,
    },
}

/// Order commands.
#[derive(Debug, Subcommand)]
pub enum OrderCommand {
    /// List orders, newest first
    List {
        /// Filter by status
        #[arg(short, long, value_enum)]
        status: Option<StatusArg>,

        /// Only orders from the last N days
        #[arg(long)]
        recent: Option<i64>,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Set the status of one or more orders
    Mark {
        /// New status
        #[arg(value_enum)]
        status: StatusArg,

        /// Order ids
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Render an order's PDF invoice
    Invoice {
        /// Order id
        id: i64,

        /// Output file (defaults to `<order_number>_<date>.pdf`)
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Stock band argument for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StockArg {
    /// At or above the low-stock threshold
    InStock,
    /// Below the threshold but not empty
    LowStock,
    /// Nothing left
    OutOfStock,
}

impl From<StockArg> for StockLevel {
    fn from(arg: StockArg) -> Self {
        match arg {
            StockArg::InStock => Self::InStock,
            StockArg::LowStock => Self::LowStock,
            StockArg::OutOfStock => Self::OutOfStock,
        }
    }
}

/// Order status argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    /// Awaiting processing
    Pending,
    /// Being prepared
    Processing,
    /// Handed to the carrier
    Shipped,
    /// Received by the customer
    Delivered,
    /// Cancelled
    Cancelled,
    /// Money returned
    Refunded,
}

impl From<StatusArg> for OrderStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => Self::Pending,
            StatusArg::Processing => Self::Processing,
            StatusArg::Shipped => Self::Shipped,
            StatusArg::Delivered => Self::Delivered,
            StatusArg::Cancelled => Self::Cancelled,
            StatusArg::Refunded => Self::Refunded,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Aligned text table
    #[default]
    Table,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_arg_conversion() {
        assert_eq!(StockLevel::from(StockArg::InStock), StockLevel::InStock);
        assert_eq!(StockLevel::from(StockArg::LowStock), StockLevel::LowStock);
        assert_eq!(
            StockLevel::from(StockArg::OutOfStock),
            StockLevel::OutOfStock
        );
    }

    #[test]
    fn test_status_arg_covers_every_status() {
        let converted: Vec<OrderStatus> = StatusArg::value_variants()
            .iter()
            .map(|arg| OrderStatus::from(*arg))
            .collect();
        assert_eq!(converted, OrderStatus::ALL.to_vec());
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Table);
    }

    #[test]
    fn test_stock_arg_names() {
        let name = StockArg::LowStock
            .to_possible_value()
            .map(|v| v.get_name().to_string());
        assert_eq!(name.as_deref(), Some("low-stock"));
    }
}
