//! Products, their images, files and tags.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tracing::{debug, info};

use super::catalog::non_blank;
use super::{now, search_pattern, sql_limit, Storage};
use crate::error::{ConstraintExt, Error, FoundExt, Result};
use crate::model::{
    parse_timestamp, FeaturedProduct, NewProduct, NewProductFile, NewProductImage, ProductDetail,
    ProductFile, ProductFilter, ProductImage, ProductImagePatch, ProductPatch, ProductSummary,
    ProductTag, ProductTagInput, StockLevel,
};
use crate::money::Money;
use crate::validate;

const NAME_MAX: usize = 255;

/// Default band boundary between low stock and in stock.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

/// Default minimum average rating for [`Storage::products_with_high_rating`].
pub const DEFAULT_HIGH_RATING: f64 = 4.0;

const SUMMARY_SELECT: &str = r"
SELECT p.id, p.name, p.slug, p.brand_id, b.name, b.slug, p.category_id, c.name, c.slug,
       p.price, p.stock, p.is_available, p.is_featured,
       COALESCE(r.avg_rating, 0.0) AS average_rating, COALESCE(r.review_count, 0),
       p.created_at, p.updated_at,
       pi.id, pi.image, pi.position
FROM products p
JOIN brands b ON b.id = p.brand_id
JOIN categories c ON c.id = p.category_id
LEFT JOIN (
    SELECT product_id, AVG(rating) AS avg_rating, COUNT(*) AS review_count
    FROM reviews GROUP BY product_id
) r ON r.product_id = p.id
LEFT JOIN product_images pi ON pi.product_id = p.id AND pi.is_primary = 1
";

const IMAGE_COLUMNS: &str = "id, product_id, image, is_primary, position";

const FILE_COLUMNS: &str =
    "id, product_id, file, file_type, name, description, size, downloads_count, created_at";

/// WHERE clauses with their bound values.
#[derive(Debug, Default)]
struct Conditions {
    clauses: Vec<String>,
    values: Vec<Value>,
}

impl Conditions {
    fn push(&mut self, clause: impl Into<String>, values: impl IntoIterator<Item = Value>) {
        self.clauses.push(clause.into());
        self.values.extend(values);
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    fn from_filter(filter: &ProductFilter) -> Self {
        let mut cond = Self::default();

        if let Some(slug) = &filter.category_slug {
            cond.push("c.slug = ?", [Value::Text(slug.clone())]);
        }
        if let Some(slug) = &filter.brand_slug {
            cond.push("b.slug = ?", [Value::Text(slug.clone())]);
        }
        if let Some(query) = filter.search.as_deref().filter(|q| !q.trim().is_empty()) {
            let pattern = Value::Text(search_pattern(query));
            cond.push(
                "(casefold(p.name) LIKE ? OR casefold(COALESCE(p.description, '')) LIKE ? \
                 OR casefold(b.name) LIKE ? OR casefold(c.name) LIKE ?)",
                std::iter::repeat(pattern).take(4),
            );
        }
        if let Some(min) = filter.min_price {
            cond.push("p.price >= ?", [Value::Integer(min.minor())]);
        }
        if let Some(max) = filter.max_price {
            cond.push("p.price <= ?", [Value::Integer(max.minor())]);
        }
        if let Some(featured) = filter.featured {
            cond.push("p.is_featured = ?", [Value::Integer(featured.into())]);
        }
        if let Some(available) = filter.available {
            cond.push("p.is_available = ?", [Value::Integer(available.into())]);
        }
        if let Some(min_rating) = filter.min_rating {
            cond.push("COALESCE(r.avg_rating, 0.0) >= ?", [Value::Real(min_rating)]);
        }
        if let Some(level) = filter.stock {
            let threshold = filter
                .low_stock_threshold
                .unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
            match level {
                StockLevel::InStock => cond.push("p.stock >= ?", [Value::Integer(threshold)]),
                StockLevel::LowStock => {
                    cond.push("p.stock > 0 AND p.stock < ?", [Value::Integer(threshold)]);
                }
                StockLevel::OutOfStock => cond.push("p.stock = 0", std::iter::empty()),
            }
        }

        cond
    }
}

impl Storage {
    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input or unknown category/brand,
    /// and a conflict for a duplicate slug.
    pub fn create_product(&self, input: &NewProduct) -> Result<ProductDetail> {
        validate::required("name", &input.name, NAME_MAX)?;
        check_amounts(input.price, input.stock, input.warranty_months)?;
        self.check_product_refs(input.category, input.brand)?;
        let slug = self.resolve_slug("products", input.slug.as_deref(), &input.name, None)?;

        let ts = now();
        self.conn
            .execute(
                r"
                INSERT INTO products (name, slug, description, category_id, brand_id, price, stock,
                                      warranty_months, is_available, is_featured, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
                ",
                params![
                    input.name.trim(),
                    slug,
                    non_blank(input.description.as_deref()),
                    input.category,
                    input.brand,
                    input.price.minor(),
                    input.stock,
                    input.warranty_months,
                    input.is_available,
                    input.is_featured,
                    ts,
                ],
            )
            .on_constraint("product")?;

        let id = self.conn.last_insert_rowid();
        info!(product_id = id, %slug, "Created product");
        self.get_product(id).found("product")
    }

    /// Full product view by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_product(&self, id: i64) -> Result<Option<ProductDetail>> {
        let summary = self
            .conn
            .query_row(&format!("{SUMMARY_SELECT} WHERE p.id = ?1"), [id], |row| {
                self.summary_from_row(row)
            })
            .optional()?;
        summary.map(|s| self.detail(s)).transpose()
    }

    /// Full product view by slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn product_by_slug(&self, slug: &str) -> Result<Option<ProductDetail>> {
        let summary = self
            .conn
            .query_row(
                &format!("{SUMMARY_SELECT} WHERE p.slug = ?1"),
                [slug],
                |row| self.summary_from_row(row),
            )
            .optional()?;
        summary.map(|s| self.detail(s)).transpose()
    }

    /// List products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_products(&self, filter: &ProductFilter) -> Result<Vec<ProductSummary>> {
        let mut cond = Conditions::from_filter(filter);
        let sql = format!(
            "{SUMMARY_SELECT}{} ORDER BY {} LIMIT ? OFFSET ?",
            cond.where_sql(),
            filter.ordering.sql()
        );
        cond.values.push(Value::Integer(sql_limit(filter.limit)));
        cond.values.push(Value::Integer(
            filter
                .offset
                .map_or(0, |o| i64::try_from(o).unwrap_or(i64::MAX)),
        ));

        let mut stmt = self.conn.prepare(&sql)?;
        let products = stmt
            .query_map(params_from_iter(cond.values.iter()), |row| {
                self.summary_from_row(row)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(products)
    }

    /// Number of products matching `filter`, ignoring limit and offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_products(&self, filter: &ProductFilter) -> Result<i64> {
        let cond = Conditions::from_filter(filter);
        let sql = format!(
            "SELECT COUNT(*) FROM ({SUMMARY_SELECT}{})",
            cond.where_sql()
        );
        let count = self
            .conn
            .query_row(&sql, params_from_iter(cond.values.iter()), |row| row.get(0))?;
        Ok(count)
    }

    /// Available products, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn available_products(&self) -> Result<Vec<ProductSummary>> {
        self.list_products(&ProductFilter {
            available: Some(true),
            ..ProductFilter::default()
        })
    }

    /// Available products marked as featured.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn featured_products(&self) -> Result<Vec<ProductSummary>> {
        self.list_products(&ProductFilter {
            available: Some(true),
            featured: Some(true),
            ..ProductFilter::default()
        })
    }

    /// Available products in the category with `slug`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn products_by_category(&self, slug: &str) -> Result<Vec<ProductSummary>> {
        self.list_products(&ProductFilter {
            available: Some(true),
            category_slug: Some(slug.to_string()),
            ..ProductFilter::default()
        })
    }

    /// Available products with an average rating of at least `min_rating`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn products_with_high_rating(&self, min_rating: f64) -> Result<Vec<ProductSummary>> {
        self.list_products(&ProductFilter {
            available: Some(true),
            min_rating: Some(min_rating),
            ordering: crate::model::ProductOrdering::RatingDesc,
            ..ProductFilter::default()
        })
    }

    /// Case-insensitive search over name, description, brand and category
    /// of available products.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn search_products(&self, query: &str) -> Result<Vec<ProductSummary>> {
        self.list_products(&ProductFilter {
            available: Some(true),
            search: Some(query.to_string()),
            ..ProductFilter::default()
        })
    }

    /// The compact featured list served from the catalog cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn featured_summary(&self) -> Result<Vec<FeaturedProduct>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT p.id, p.name, p.slug, p.price, c.name, b.name
            FROM products p
            JOIN categories c ON c.id = p.category_id
            JOIN brands b ON b.id = p.brand_id
            WHERE p.is_featured = 1 AND p.is_available = 1
            ORDER BY p.created_at DESC, p.id DESC
            ",
        )?;
        let featured = stmt
            .query_map([], |row| {
                Ok(FeaturedProduct {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    slug: row.get(2)?,
                    price: Money::from_minor(row.get(3)?),
                    category_name: row.get(4)?,
                    brand_name: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(featured)
    }

    /// Update a product.
    ///
    /// # Errors
    ///
    /// Returns not found, a validation error, or a conflict for a taken slug.
    pub fn update_product(&self, id: i64, patch: &ProductPatch) -> Result<ProductDetail> {
        let current = self.get_product(id).found("product")?;
        let summary = &current.summary;

        let name = patch.name.as_deref().unwrap_or(&summary.name);
        validate::required("name", name, NAME_MAX)?;
        let slug = match patch.slug.as_deref() {
            Some(slug) => self.resolve_slug("products", Some(slug), name, Some(id))?,
            None => summary.slug.clone(),
        };
        let description = patch
            .description
            .clone()
            .unwrap_or_else(|| current.description.clone());
        let category = patch.category.unwrap_or(summary.category);
        let brand = patch.brand.unwrap_or(summary.brand);
        let price = patch.price.unwrap_or(summary.price);
        let stock = patch.stock.unwrap_or(summary.stock);
        let warranty = patch.warranty_months.unwrap_or(current.warranty_months);
        check_amounts(price, stock, warranty)?;
        self.check_product_refs(category, brand)?;

        self.conn
            .execute(
                r"
                UPDATE products SET name = ?1, slug = ?2, description = ?3, category_id = ?4,
                    brand_id = ?5, price = ?6, stock = ?7, warranty_months = ?8,
                    is_available = ?9, is_featured = ?10, updated_at = ?11
                WHERE id = ?12
                ",
                params![
                    name.trim(),
                    slug,
                    non_blank(description.as_deref()),
                    category,
                    brand,
                    price.minor(),
                    stock,
                    warranty,
                    patch.is_available.unwrap_or(summary.is_available),
                    patch.is_featured.unwrap_or(summary.is_featured),
                    now(),
                    id,
                ],
            )
            .on_constraint("product")?;
        debug!(product_id = id, "Updated product");
        self.get_product(id).found("product")
    }

    /// Delete a product with its images, files, tags and reviews.
    ///
    /// # Errors
    ///
    /// Returns not found, or a conflict when the product has been ordered.
    pub fn delete_product(&self, id: i64) -> Result<()> {
        let affected = self
            .conn
            .execute("DELETE FROM products WHERE id = ?1", [id])
            .map_err(|e| match Error::from_constraint(e, "product") {
                Error::Validation { .. } => {
                    Error::conflict("product appears in orders and cannot be deleted")
                }
                other => other,
            })?;
        if affected == 0 {
            return Err(Error::not_found("product"));
        }
        info!(product_id = id, "Deleted product");
        Ok(())
    }

    /// Attach an image. A primary image replaces the previous primary.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown product.
    pub fn add_image(&self, input: &NewProductImage) -> Result<ProductImage> {
        self.require_product(input.product)?;

        let id = self.atomic(|| {
            if input.is_primary {
                self.conn.execute(
                    "UPDATE product_images SET is_primary = 0 WHERE product_id = ?1",
                    [input.product],
                )?;
            }
            self.conn.execute(
                "INSERT INTO product_images (product_id, image, is_primary, position) VALUES (?1, ?2, ?3, ?4)",
                params![input.product, input.image, input.is_primary, input.order],
            )?;
            Ok(self.conn.last_insert_rowid())
        })?;

        debug!(image_id = id, product_id = input.product, "Added product image");
        self.get_image(id).found("image")
    }

    /// Get an image by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_image(&self, id: i64) -> Result<Option<ProductImage>> {
        let image = self
            .conn
            .query_row(
                &format!("SELECT {IMAGE_COLUMNS} FROM product_images WHERE id = ?1"),
                [id],
                |row| self.image_from_row(row),
            )
            .optional()?;
        Ok(image)
    }

    /// Images, optionally of one product, by (order, id).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_images(&self, product: Option<i64>) -> Result<Vec<ProductImage>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {IMAGE_COLUMNS} FROM product_images \
             WHERE (?1 IS NULL OR product_id = ?1) ORDER BY product_id, position, id"
        ))?;
        let images = stmt
            .query_map([product], |row| self.image_from_row(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(images)
    }

    /// Change an image's primary flag or position.
    ///
    /// # Errors
    ///
    /// Returns not found for unknown images.
    pub fn update_image(&self, id: i64, patch: &ProductImagePatch) -> Result<ProductImage> {
        let current = self.get_image(id).found("image")?;

        self.atomic(|| {
            if patch.is_primary == Some(true) {
                self.conn.execute(
                    "UPDATE product_images SET is_primary = 0 WHERE product_id = ?1 AND id != ?2",
                    params![current.product, id],
                )?;
            }
            self.conn.execute(
                "UPDATE product_images SET is_primary = ?1, position = ?2 WHERE id = ?3",
                params![
                    patch.is_primary.unwrap_or(current.is_primary),
                    patch.order.unwrap_or(current.order),
                    id
                ],
            )?;
            Ok(())
        })?;

        self.get_image(id).found("image")
    }

    /// Delete an image record, returning it so the file can be removed.
    ///
    /// # Errors
    ///
    /// Returns not found for unknown images.
    pub fn delete_image(&self, id: i64) -> Result<ProductImage> {
        let image = self.get_image(id).found("image")?;
        self.conn
            .execute("DELETE FROM product_images WHERE id = ?1", [id])?;
        Ok(image)
    }

    /// Attach a downloadable file.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown product or missing name.
    pub fn add_file(&self, input: &NewProductFile) -> Result<ProductFile> {
        self.require_product(input.product)?;
        validate::required("name", &input.name, NAME_MAX)?;
        validate::required("file_type", &input.file_type, 50)?;

        self.conn.execute(
            r"
            INSERT INTO product_files (product_id, file, file_type, name, description, size, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                input.product,
                input.file,
                input.file_type.trim(),
                input.name.trim(),
                non_blank(input.description.as_deref()),
                input.size,
                now(),
            ],
        )?;
        self.get_file(self.conn.last_insert_rowid()).found("file")
    }

    /// Get a file by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_file(&self, id: i64) -> Result<Option<ProductFile>> {
        let file = self
            .conn
            .query_row(
                &format!("SELECT {FILE_COLUMNS} FROM product_files WHERE id = ?1"),
                [id],
                |row| self.file_from_row(row),
            )
            .optional()?;
        Ok(file)
    }

    /// Files, optionally of one product, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_files(&self, product: Option<i64>) -> Result<Vec<ProductFile>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FILE_COLUMNS} FROM product_files \
             WHERE (?1 IS NULL OR product_id = ?1) ORDER BY created_at DESC, id DESC"
        ))?;
        let files = stmt
            .query_map([product], |row| self.file_from_row(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(files)
    }

    /// Count a download and return the updated file record.
    ///
    /// # Errors
    ///
    /// Returns not found for unknown files.
    pub fn record_download(&self, id: i64) -> Result<ProductFile> {
        let affected = self.conn.execute(
            "UPDATE product_files SET downloads_count = downloads_count + 1 WHERE id = ?1",
            [id],
        )?;
        if affected == 0 {
            return Err(Error::not_found("file"));
        }
        self.get_file(id).found("file")
    }

    /// Delete a file record, returning it so the file can be removed.
    ///
    /// # Errors
    ///
    /// Returns not found for unknown files.
    pub fn delete_file(&self, id: i64) -> Result<ProductFile> {
        let file = self.get_file(id).found("file")?;
        self.conn
            .execute("DELETE FROM product_files WHERE id = ?1", [id])?;
        Ok(file)
    }

    /// Tag a product.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown product/tag or a weight
    /// outside 1..=10, and a conflict when the tag is already attached.
    pub fn tag_product(
        &self,
        product: i64,
        input: &ProductTagInput,
        added_by: Option<i64>,
    ) -> Result<ProductTag> {
        self.require_product(product)?;
        validate::range("weight", input.weight, 1, 10)?;
        if self.get_tag(input.tag)?.is_none() {
            return Err(Error::field("tag", "tag does not exist"));
        }

        self.conn
            .execute(
                r"
                INSERT INTO product_tags (product_id, tag_id, added_by, weight, is_auto_generated, added_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
                params![
                    product,
                    input.tag,
                    added_by,
                    input.weight,
                    input.is_auto_generated,
                    now()
                ],
            )
            .on_constraint("product tag")?;

        self.product_tags(product)?
            .into_iter()
            .find(|t| t.tag == input.tag)
            .ok_or(Error::not_found("product tag"))
    }

    /// Detach a tag from a product.
    ///
    /// # Errors
    ///
    /// Returns not found when the tag was not attached.
    pub fn untag_product(&self, product: i64, tag: i64) -> Result<()> {
        let affected = self.conn.execute(
            "DELETE FROM product_tags WHERE product_id = ?1 AND tag_id = ?2",
            [product, tag],
        )?;
        if affected == 0 {
            return Err(Error::not_found("product tag"));
        }
        Ok(())
    }

    /// A product's tags, heaviest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn product_tags(&self, product: i64) -> Result<Vec<ProductTag>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT pt.id, pt.product_id, pt.tag_id, t.name, t.color, pt.added_by, pt.weight,
                   pt.is_auto_generated, pt.added_at
            FROM product_tags pt JOIN tags t ON t.id = pt.tag_id
            WHERE pt.product_id = ?1
            ORDER BY pt.weight DESC, pt.added_at, pt.id
            ",
        )?;
        let tags = stmt
            .query_map([product], |row| {
                let added_at: String = row.get(8)?;
                Ok(ProductTag {
                    id: row.get(0)?,
                    product: row.get(1)?,
                    tag: row.get(2)?,
                    tag_name: row.get(3)?,
                    tag_color: row.get(4)?,
                    added_by: row.get(5)?,
                    weight: row.get(6)?,
                    is_auto_generated: row.get(7)?,
                    added_at: parse_timestamp(&added_at),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    /// Fail with a `product` field error unless the product exists.
    pub(super) fn require_product(&self, id: i64) -> Result<()> {
        let exists: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM products WHERE id = ?1",
            [id],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(Error::field("product", "product does not exist"));
        }
        Ok(())
    }

    /// Fail with a `product` field error unless the product exists and is
    /// for sale.
    pub(super) fn require_available_product(&self, id: i64) -> Result<()> {
        let available: Option<bool> = self
            .conn
            .query_row(
                "SELECT is_available FROM products WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        match available {
            None => Err(Error::field("product", "product does not exist")),
            Some(false) => Err(Error::field("product", "product is not available")),
            Some(true) => Ok(()),
        }
    }

    fn check_product_refs(&self, category: i64, brand: i64) -> Result<()> {
        if self.get_category(category)?.is_none() {
            return Err(Error::field("category", "category does not exist"));
        }
        if self.get_brand(brand)?.is_none() {
            return Err(Error::field("brand", "brand does not exist"));
        }
        Ok(())
    }

    fn detail(&self, summary: ProductSummary) -> Result<ProductDetail> {
        let (description, warranty_months) = self.conn.query_row(
            "SELECT description, warranty_months FROM products WHERE id = ?1",
            [summary.id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(ProductDetail {
            images: self.list_images(Some(summary.id))?,
            files: self.list_files(Some(summary.id))?,
            tags: self.product_tags(summary.id)?,
            description,
            warranty_months,
            summary,
        })
    }

    fn summary_from_row(&self, row: &Row) -> rusqlite::Result<ProductSummary> {
        let created_at: String = row.get(15)?;
        let updated_at: String = row.get(16)?;
        let image_id: Option<i64> = row.get(17)?;
        let primary_image = match image_id {
            Some(image_id) => {
                let image: String = row.get(18)?;
                Some(ProductImage {
                    id: image_id,
                    product: row.get(0)?,
                    image_url: self.media_url(&image),
                    image,
                    is_primary: true,
                    order: row.get(19)?,
                })
            }
            None => None,
        };

        Ok(ProductSummary {
            id: row.get(0)?,
            name: row.get(1)?,
            slug: row.get(2)?,
            brand: row.get(3)?,
            brand_name: row.get(4)?,
            brand_slug: row.get(5)?,
            category: row.get(6)?,
            category_name: row.get(7)?,
            category_slug: row.get(8)?,
            price: Money::from_minor(row.get(9)?),
            stock: row.get(10)?,
            is_available: row.get(11)?,
            is_featured: row.get(12)?,
            average_rating: row.get(13)?,
            review_count: row.get(14)?,
            primary_image,
            created_at: parse_timestamp(&created_at),
            updated_at: parse_timestamp(&updated_at),
        })
    }

    fn image_from_row(&self, row: &Row) -> rusqlite::Result<ProductImage> {
        let image: String = row.get(2)?;
        Ok(ProductImage {
            id: row.get(0)?,
            product: row.get(1)?,
            image_url: self.media_url(&image),
            image,
            is_primary: row.get(3)?,
            order: row.get(4)?,
        })
    }

    fn file_from_row(&self, row: &Row) -> rusqlite::Result<ProductFile> {
        let file: String = row.get(2)?;
        let size: i64 = row.get(6)?;
        let created_at: String = row.get(8)?;
        Ok(ProductFile {
            id: row.get(0)?,
            product: row.get(1)?,
            file_url: self.media_url(&file),
            file,
            file_type: row.get(3)?,
            name: row.get(4)?,
            description: row.get(5)?,
            size,
            file_size_mb: ProductFile::size_mb(size),
            downloads_count: row.get(7)?,
            created_at: parse_timestamp(&created_at),
        })
    }
}

fn check_amounts(price: Money, stock: i64, warranty_months: i64) -> Result<()> {
    if price.is_negative() {
        return Err(Error::field("price", "price cannot be negative"));
    }
    if price > Money::MAX {
        return Err(Error::field("price", format!("price cannot exceed {}", Money::MAX)));
    }
    validate::range("stock", stock, 0, i64::from(i32::MAX))?;
    validate::range("warranty_months", warranty_months, 0, i64::from(i32::MAX))
}
