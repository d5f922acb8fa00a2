//! Orders and their line items.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::money::Money;

/// Fulfilment state of an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
        Self::Refunded,
    ];

    /// Stored/wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Human-readable label, used on invoices and in the console.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Awaiting processing",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Refunded => "Refunded",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::field("status", format!("unknown order status: {s}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItemView {
    pub id: i64,
    pub order: i64,
    pub product: i64,
    pub product_name: String,
    pub product_slug: String,
    pub quantity: u32,
    /// Unit price at the time the order was placed.
    pub price: Money,
    pub total_price: Money,
}

/// An order with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderView {
    pub id: i64,
    pub user: i64,
    pub user_email: String,
    pub user_name: String,
    pub order_number: String,
    pub status: OrderStatus,
    pub status_display: &'static str,
    pub total_amount: Money,
    pub shipping_address: String,
    pub phone_number: String,
    pub customer_notes: Option<String>,
    pub items: Vec<OrderItemView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Checkout input.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub cart_id: i64,
    pub shipping_address: String,
    pub phone_number: String,
    #[serde(default)]
    pub customer_notes: Option<String>,
}

/// Order list filter.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub user: Option<i64>,
    pub status: Option<OrderStatus>,
    /// Only orders created within the last N days.
    pub recent_days: Option<i64>,
    pub limit: Option<usize>,
}

/// Build an order number: `ORD-YYYYMMDD-` plus the first 8 characters of a
/// fresh v4 UUID.
#[must_use]
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let id = uuid::Uuid::new_v4().to_string();
    format!("ORD-{}-{}", now.format("%Y%m%d"), &id[..8])
}
