//! Command-line interface for storefront.
//!
//! This module provides the CLI structure and command handlers for the
//! `storefront` binary.

mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    BrandCommand, CategoryCommand, ConfigCommand, OrderCommand, OutputFormat, ProductCommand,
    ReviewCommand, SeedCommand, ServeCommand, StatusArg, StatusCommand, StockArg, UserCommand,
};

/// storefront - online shop backend and administration console
///
/// Runs the REST API and manages the catalog, customers and orders from the
/// command line.
#[derive(Debug, Parser)]
#[command(name = "storefront")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve(ServeCommand),

    /// Create or upgrade the database
    Migrate,

    /// Show database statistics
    Status(StatusCommand),

    /// Fill the database with fake data
    Seed(SeedCommand),

    /// Manage user accounts
    #[command(subcommand)]
    User(UserCommand),

    /// Inspect categories
    #[command(subcommand)]
    Category(CategoryCommand),

    /// Inspect brands
    #[command(subcommand)]
    Brand(BrandCommand),

    /// List and edit products
    #[command(subcommand)]
    Product(ProductCommand),

    /// Moderate reviews
    #[command(subcommand)]
    Review(ReviewCommand),

    /// Process orders
    #[command(subcommand)]
    Order(OrderCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
