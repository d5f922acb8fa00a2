//! Core domain types for the storefront.
//!
//! Read models (`*View`, [`ProductSummary`], ...) are what the API returns;
//! `New*` and `*Patch` types are the accepted inputs. Money is always a
//! [`Money`](crate::money::Money) value and timestamps are UTC.

mod account;
mod catalog;
mod order;
mod review;
mod shopping;

pub use account::{display_name, NewUser, Profile, ProfilePatch, User, UserPatch};
pub use catalog::{
    Brand, BrandPatch, Category, CategoryPatch, CategoryStats, FeaturedProduct, NewBrand,
    NewCategory, NewProduct, NewProductFile, NewProductImage, NewTag, ProductDetail, ProductFile,
    ProductFilter, ProductImage, ProductImagePatch, ProductOrdering, ProductPatch, ProductSummary,
    ProductTag, ProductTagInput, StockLevel, Tag, TagPatch,
};
pub use order::{
    generate_order_number, NewOrder, OrderFilter, OrderItemView, OrderStatus, OrderView,
};
pub use review::{NewReview, RatingFilter, ReviewFilter, ReviewPatch, ReviewView};
pub use shopping::{CartItemView, CartView, WishlistItemView, WishlistView};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Deserialize a field that distinguishes "absent" from "explicit null".
///
/// Used with `#[serde(default, deserialize_with = "nullable")]` on
/// `Option<Option<T>>` patch fields.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Parse a stored RFC 3339 timestamp, falling back to now on bad data.
pub(crate) fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
