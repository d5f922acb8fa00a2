//! Catalog: categories, brands, tags, products and their attachments.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::money::Money;

/// A product category, optionally nested under a parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub parent: Option<i64>,
    pub parent_name: Option<String>,
    pub children_count: i64,
}

/// A category with the number of products filed under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub products_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    /// Derived from `name` when omitted.
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub parent: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub parent: Option<Option<i64>>,
}

/// A manufacturer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Brand {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub official_website: Option<String>,
    pub description: Option<String>,
    pub products_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBrand {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub official_website: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrandPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub official_website: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub description: Option<Option<String>>,
}

/// A free-form label attached to products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    /// `#RRGGBB`.
    pub color: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTag {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub description: Option<Option<String>>,
}

/// A product image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductImage {
    pub id: i64,
    pub product: i64,
    /// Path relative to the media root.
    pub image: String,
    pub image_url: String,
    pub is_primary: bool,
    pub order: i64,
}

/// Metadata for an uploaded image; the bytes are stored separately.
#[derive(Debug, Clone)]
pub struct NewProductImage {
    pub product: i64,
    pub image: String,
    pub is_primary: bool,
    pub order: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductImagePatch {
    pub is_primary: Option<bool>,
    pub order: Option<i64>,
}

/// A downloadable file (manual, certificate, ...) attached to a product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductFile {
    pub id: i64,
    pub product: i64,
    pub file: String,
    pub file_url: String,
    pub file_type: String,
    pub name: String,
    pub description: Option<String>,
    /// Size in bytes.
    pub size: i64,
    pub file_size_mb: f64,
    pub downloads_count: i64,
    pub created_at: DateTime<Utc>,
}

impl ProductFile {
    /// Size in megabytes rounded to two decimals.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn size_mb(size: i64) -> f64 {
        if size <= 0 {
            return 0.0;
        }
        (size as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
    }
}

#[derive(Debug, Clone)]
pub struct NewProductFile {
    pub product: i64,
    pub file: String,
    pub file_type: String,
    pub name: String,
    pub description: Option<String>,
    pub size: i64,
}

/// A tag attached to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductTag {
    pub id: i64,
    pub product: i64,
    pub tag: i64,
    pub tag_name: String,
    pub tag_color: String,
    pub added_by: Option<i64>,
    /// 1..=10, higher sorts first.
    pub weight: i64,
    pub is_auto_generated: bool,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductTagInput {
    pub tag: i64,
    #[serde(default = "default_weight")]
    pub weight: i64,
    #[serde(default)]
    pub is_auto_generated: bool,
}

const fn default_weight() -> i64 {
    1
}

/// List view of a product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSummary {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub brand: i64,
    pub brand_name: String,
    pub brand_slug: String,
    pub category: i64,
    pub category_name: String,
    pub category_slug: String,
    pub price: Money,
    pub stock: i64,
    pub is_available: bool,
    pub is_featured: bool,
    /// Mean review rating, 0 without reviews.
    pub average_rating: f64,
    pub review_count: i64,
    pub primary_image: Option<ProductImage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full product view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub summary: ProductSummary,
    pub description: Option<String>,
    pub warranty_months: i64,
    pub images: Vec<ProductImage>,
    pub files: Vec<ProductFile>,
    pub tags: Vec<ProductTag>,
}

/// The compact shape cached for the featured products list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturedProduct {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub price: Money,
    pub category_name: String,
    pub brand_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub category: i64,
    pub brand: i64,
    pub price: Money,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub warranty_months: i64,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default)]
    pub is_featured: bool,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub description: Option<Option<String>>,
    pub category: Option<i64>,
    pub brand: Option<i64>,
    pub price: Option<Money>,
    pub stock: Option<i64>,
    pub warranty_months: Option<i64>,
    pub is_available: Option<bool>,
    pub is_featured: Option<bool>,
}

/// Stock bands used by the product list filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    /// At or above the low-stock threshold.
    InStock,
    /// Between 1 and the threshold.
    LowStock,
    /// Zero.
    OutOfStock,
}

impl StockLevel {
    /// Classify a stock count against `threshold`.
    #[must_use]
    pub const fn classify(stock: i64, threshold: i64) -> Self {
        if stock <= 0 {
            Self::OutOfStock
        } else if stock < threshold {
            Self::LowStock
        } else {
            Self::InStock
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::InStock => "In stock",
            Self::LowStock => "Low stock",
            Self::OutOfStock => "Out of stock",
        }
    }
}

impl FromStr for StockLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "in_stock" => Ok(Self::InStock),
            "low_stock" => Ok(Self::LowStock),
            "out_of_stock" => Ok(Self::OutOfStock),
            _ => Err(Error::field("stock", format!("unknown stock level: {s}"))),
        }
    }
}

/// Sort keys for product lists; `Desc*` variants are the `-field` forms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProductOrdering {
    /// Newest first.
    #[default]
    Newest,
    Oldest,
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
    RatingAsc,
    RatingDesc,
}

impl ProductOrdering {
    pub(crate) const fn sql(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::Oldest => "p.created_at ASC, p.id ASC",
            Self::PriceAsc => "p.price ASC, p.id ASC",
            Self::PriceDesc => "p.price DESC, p.id DESC",
            Self::NameAsc => "p.name ASC, p.id ASC",
            Self::NameDesc => "p.name DESC, p.id DESC",
            Self::RatingAsc => "average_rating ASC, p.id ASC",
            Self::RatingDesc => "average_rating DESC, p.id DESC",
        }
    }
}

impl FromStr for ProductOrdering {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "created_at" => Self::Oldest,
            "-created_at" => Self::Newest,
            "price" => Self::PriceAsc,
            "-price" => Self::PriceDesc,
            "name" => Self::NameAsc,
            "-name" => Self::NameDesc,
            "rating" => Self::RatingAsc,
            "-rating" => Self::RatingDesc,
            other => {
                return Err(Error::field(
                    "ordering",
                    format!("unknown ordering: {other}"),
                ))
            }
        })
    }
}

impl fmt::Display for ProductOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Newest => "-created_at",
            Self::Oldest => "created_at",
            Self::PriceAsc => "price",
            Self::PriceDesc => "-price",
            Self::NameAsc => "name",
            Self::NameDesc => "-name",
            Self::RatingAsc => "rating",
            Self::RatingDesc => "-rating",
        })
    }
}

/// Product list filter. Empty fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_slug: Option<String>,
    pub brand_slug: Option<String>,
    /// Case-insensitive match on name, description, brand and category.
    pub search: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub featured: Option<bool>,
    pub available: Option<bool>,
    pub min_rating: Option<f64>,
    pub stock: Option<StockLevel>,
    /// Threshold for [`StockLevel`] bands; 10 when unset.
    pub low_stock_threshold: Option<i64>,
    pub ordering: ProductOrdering,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_level_classify() {
        assert_eq!(StockLevel::classify(0, 10), StockLevel::OutOfStock);
        assert_eq!(StockLevel::classify(1, 10), StockLevel::LowStock);
        assert_eq!(StockLevel::classify(9, 10), StockLevel::LowStock);
        assert_eq!(StockLevel::classify(10, 10), StockLevel::InStock);
    }

    #[test]
    fn test_stock_level_parse_accepts_both_separators() {
        assert_eq!(
            "low-stock".parse::<StockLevel>().unwrap(),
            StockLevel::LowStock
        );
        assert_eq!(
            "out_of_stock".parse::<StockLevel>().unwrap(),
            StockLevel::OutOfStock
        );
        assert!("plenty".parse::<StockLevel>().is_err());
    }

    #[test]
    fn test_ordering_round_trip_strings() {
        for s in ["price", "-price", "name", "-name", "rating", "-rating"] {
            let ordering: ProductOrdering = s.parse().unwrap();
            assert_eq!(ordering.to_string(), s);
        }
        assert!("weight".parse::<ProductOrdering>().is_err());
    }

    #[test]
    fn test_file_size_mb() {
        assert!((ProductFile::size_mb(0) - 0.0).abs() < f64::EPSILON);
        assert!((ProductFile::size_mb(1_048_576) - 1.0).abs() < f64::EPSILON);
        assert!((ProductFile::size_mb(1_572_864) - 1.5).abs() < f64::EPSILON);
        assert!((ProductFile::size_mb(10_000) - 0.01).abs() < f64::EPSILON);
    }

    #[test]
    fn test_new_product_defaults() {
        let json = r#"{"name":"Phone","category":1,"brand":2,"price":"199.90"}"#;
        let p: NewProduct = serde_json::from_str(json).unwrap();
        assert!(p.is_available);
        assert!(!p.is_featured);
        assert_eq!(p.stock, 0);
        assert_eq!(p.price, Money::from_minor(19_990));
    }

    #[test]
    fn test_product_detail_flattens_summary() {
        let now = Utc::now();
        let detail = ProductDetail {
            summary: ProductSummary {
                id: 1,
                name: "Phone".to_string(),
                slug: "phone".to_string(),
                brand: 1,
                brand_name: "Acme".to_string(),
                brand_slug: "acme".to_string(),
                category: 1,
                category_name: "Phones".to_string(),
                category_slug: "phones".to_string(),
                price: Money::from_major(10),
                stock: 3,
                is_available: true,
                is_featured: false,
                average_rating: 0.0,
                review_count: 0,
                primary_image: None,
                created_at: now,
                updated_at: now,
            },
            description: None,
            warranty_months: 12,
            images: Vec::new(),
            files: Vec::new(),
            tags: Vec::new(),
        };
        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["name"], "Phone");
        assert_eq!(value["price"], "10.00");
        assert_eq!(value["warranty_months"], 12);
    }
}
