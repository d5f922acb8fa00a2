//! Wishlists and carts.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::money::Money;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WishlistItemView {
    pub id: i64,
    pub wishlist: i64,
    pub product: i64,
    pub product_name: String,
    pub product_price: Money,
    pub product_image: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// A user's wishlist with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WishlistView {
    pub id: i64,
    pub user: i64,
    pub user_email: String,
    pub items_count: i64,
    pub items: Vec<WishlistItemView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItemView {
    pub id: i64,
    pub cart: i64,
    pub product: i64,
    pub product_name: String,
    /// Current product price.
    pub product_price: Money,
    pub product_image: Option<String>,
    pub quantity: u32,
    pub total_price: Money,
}

/// A user's cart. Totals are computed from current product prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub id: i64,
    pub user: i64,
    pub user_email: String,
    pub items: Vec<CartItemView>,
    pub total_price: Money,
    /// Number of distinct products.
    pub items_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartView {
    /// Sum of the item totals.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the sum exceeds [`Money::MAX`].
    pub fn compute_total(items: &[CartItemView]) -> crate::Result<Money> {
        Money::checked_sum(items.iter().map(|item| item.total_price))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
