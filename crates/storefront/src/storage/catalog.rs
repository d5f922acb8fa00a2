//! Categories, brands and tags.

use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

use super::{search_pattern, Storage};
use crate::error::{ConstraintExt, Error, FoundExt, Result};
use crate::model::{
    Brand, BrandPatch, Category, CategoryPatch, CategoryStats, NewBrand, NewCategory, NewTag, Tag,
    TagPatch,
};
use crate::validate::{self, slugify};

const NAME_MAX: usize = 80;
const TAG_NAME_MAX: usize = 50;
const DEFAULT_TAG_COLOR: &str = "#000000";

const CATEGORY_SELECT: &str = r"
SELECT c.id, c.name, c.slug, c.parent_id, p.name,
       (SELECT COUNT(*) FROM categories ch WHERE ch.parent_id = c.id)
FROM categories c
LEFT JOIN categories p ON p.id = c.parent_id
";

const BRAND_SELECT: &str = r"
SELECT b.id, b.name, b.slug, b.official_website, b.description,
       (SELECT COUNT(*) FROM products pr WHERE pr.brand_id = b.id)
FROM brands b
";

/// Category list filter.
#[derive(Debug, Clone, Default)]
pub struct CategoryQuery {
    pub search: Option<String>,
    pub parent: Option<i64>,
    /// Only categories without a parent.
    pub roots_only: bool,
}

impl Storage {
    /// Create a category, deriving a unique slug from the name if needed.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input or an unknown parent, and a
    /// conflict for a duplicate name or slug.
    pub fn create_category(&self, input: &NewCategory) -> Result<Category> {
        validate::required("name", &input.name, NAME_MAX)?;
        let slug = self.resolve_slug("categories", input.slug.as_deref(), &input.name, None)?;
        if let Some(parent) = input.parent {
            self.get_category(parent)?
                .ok_or_else(|| Error::field("parent", "parent category does not exist"))?;
        }

        self.conn
            .execute(
                "INSERT INTO categories (name, slug, parent_id) VALUES (?1, ?2, ?3)",
                params![input.name.trim(), slug, input.parent],
            )
            .on_constraint("category")?;
        let id = self.conn.last_insert_rowid();
        info!(category_id = id, %slug, "Created category");
        self.get_category(id).found("category")
    }

    /// Get a category by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let category = self
            .conn
            .query_row(
                &format!("{CATEGORY_SELECT} WHERE c.id = ?1"),
                [id],
                row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    /// Get a category by slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let category = self
            .conn
            .query_row(
                &format!("{CATEGORY_SELECT} WHERE c.slug = ?1"),
                [slug],
                row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    /// List categories by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_categories(&self, query: &CategoryQuery) -> Result<Vec<Category>> {
        let pattern = query.search.as_deref().map(search_pattern);
        let mut stmt = self.conn.prepare(&format!(
            r"{CATEGORY_SELECT}
            WHERE (?1 IS NULL OR casefold(c.name) LIKE ?1)
              AND (?2 IS NULL OR c.parent_id = ?2)
              AND (?3 = 0 OR c.parent_id IS NULL)
            ORDER BY c.name"
        ))?;
        let categories = stmt
            .query_map(
                params![pattern, query.parent, query.roots_only],
                row_to_category,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    /// Update a category.
    ///
    /// # Errors
    ///
    /// Returns not found, a validation error for a parent cycle or bad input,
    /// or a conflict for a duplicate name or slug.
    pub fn update_category(&self, id: i64, patch: &CategoryPatch) -> Result<Category> {
        let current = self.get_category(id).found("category")?;

        let name = patch.name.as_deref().unwrap_or(&current.name);
        validate::required("name", name, NAME_MAX)?;
        let slug = match patch.slug.as_deref() {
            Some(slug) => self.resolve_slug("categories", Some(slug), name, Some(id))?,
            None => current.slug,
        };
        let parent = patch.parent.unwrap_or(current.parent);
        if let Some(parent) = parent {
            self.check_category_parent(id, parent)?;
        }

        self.conn
            .execute(
                "UPDATE categories SET name = ?1, slug = ?2, parent_id = ?3 WHERE id = ?4",
                params![name.trim(), slug, parent, id],
            )
            .on_constraint("category")?;
        self.get_category(id).found("category")
    }

    /// Delete a category and its subcategories.
    ///
    /// # Errors
    ///
    /// Returns not found, or a conflict while products still reference the
    /// category or one of its subcategories.
    pub fn delete_category(&self, id: i64) -> Result<()> {
        let affected = self
            .conn
            .execute("DELETE FROM categories WHERE id = ?1", [id])
            .map_err(|e| in_use(e, "category"))?;
        if affected == 0 {
            return Err(Error::not_found("category"));
        }
        info!(category_id = id, "Deleted category");
        Ok(())
    }

    /// Every category with the number of products filed directly under it,
    /// by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn category_stats(&self) -> Result<Vec<CategoryStats>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT c.id, c.name, c.slug, COUNT(p.id)
            FROM categories c
            LEFT JOIN products p ON p.category_id = c.id
            GROUP BY c.id
            ORDER BY c.name
            ",
        )?;
        let stats = stmt
            .query_map([], |row| {
                Ok(CategoryStats {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    slug: row.get(2)?,
                    products_count: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stats)
    }

    fn check_category_parent(&self, id: i64, parent: i64) -> Result<()> {
        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == id {
                return Err(Error::field(
                    "parent",
                    "a category cannot be nested under itself",
                ));
            }
            cursor = self
                .get_category(current)?
                .ok_or_else(|| Error::field("parent", "parent category does not exist"))?
                .parent;
        }
        Ok(())
    }

    /// Create a brand.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input or a conflict for a duplicate
    /// name or slug.
    pub fn create_brand(&self, input: &NewBrand) -> Result<Brand> {
        validate::required("name", &input.name, NAME_MAX)?;
        if let Some(url) = non_blank(input.official_website.as_deref()) {
            validate::url(url)?;
        }
        let slug = self.resolve_slug("brands", input.slug.as_deref(), &input.name, None)?;

        self.conn
            .execute(
                r"
                INSERT INTO brands (name, slug, official_website, description)
                VALUES (?1, ?2, ?3, ?4)
                ",
                params![
                    input.name.trim(),
                    slug,
                    non_blank(input.official_website.as_deref()),
                    non_blank(input.description.as_deref()),
                ],
            )
            .on_constraint("brand")?;
        let id = self.conn.last_insert_rowid();
        info!(brand_id = id, %slug, "Created brand");
        self.get_brand(id).found("brand")
    }

    /// Get a brand by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_brand(&self, id: i64) -> Result<Option<Brand>> {
        let brand = self
            .conn
            .query_row(&format!("{BRAND_SELECT} WHERE b.id = ?1"), [id], row_to_brand)
            .optional()?;
        Ok(brand)
    }

    /// Get a brand by slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn brand_by_slug(&self, slug: &str) -> Result<Option<Brand>> {
        let brand = self
            .conn
            .query_row(
                &format!("{BRAND_SELECT} WHERE b.slug = ?1"),
                [slug],
                row_to_brand,
            )
            .optional()?;
        Ok(brand)
    }

    /// List brands by name, optionally filtered by a name search.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_brands(&self, search: Option<&str>) -> Result<Vec<Brand>> {
        let pattern = search.map(search_pattern);
        let mut stmt = self.conn.prepare(&format!(
            "{BRAND_SELECT} WHERE (?1 IS NULL OR casefold(b.name) LIKE ?1) ORDER BY b.name"
        ))?;
        let brands = stmt
            .query_map([pattern], row_to_brand)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(brands)
    }

    /// Update a brand.
    ///
    /// # Errors
    ///
    /// Returns not found, a validation error, or a conflict.
    pub fn update_brand(&self, id: i64, patch: &BrandPatch) -> Result<Brand> {
        let current = self.get_brand(id).found("brand")?;

        let name = patch.name.as_deref().unwrap_or(&current.name);
        validate::required("name", name, NAME_MAX)?;
        let slug = match patch.slug.as_deref() {
            Some(slug) => self.resolve_slug("brands", Some(slug), name, Some(id))?,
            None => current.slug,
        };
        let website = patch
            .official_website
            .clone()
            .unwrap_or(current.official_website);
        if let Some(url) = non_blank(website.as_deref()) {
            validate::url(url)?;
        }
        let description = patch.description.clone().unwrap_or(current.description);

        self.conn
            .execute(
                r"
                UPDATE brands SET name = ?1, slug = ?2, official_website = ?3, description = ?4
                WHERE id = ?5
                ",
                params![
                    name.trim(),
                    slug,
                    non_blank(website.as_deref()),
                    non_blank(description.as_deref()),
                    id
                ],
            )
            .on_constraint("brand")?;
        self.get_brand(id).found("brand")
    }

    /// Delete a brand.
    ///
    /// # Errors
    ///
    /// Returns not found, or a conflict while products reference the brand.
    pub fn delete_brand(&self, id: i64) -> Result<()> {
        let affected = self
            .conn
            .execute("DELETE FROM brands WHERE id = ?1", [id])
            .map_err(|e| in_use(e, "brand"))?;
        if affected == 0 {
            return Err(Error::not_found("brand"));
        }
        info!(brand_id = id, "Deleted brand");
        Ok(())
    }

    /// Create a tag; the colour defaults to black.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input or a conflict for a duplicate
    /// name.
    pub fn create_tag(&self, input: &NewTag) -> Result<Tag> {
        validate::required("name", &input.name, TAG_NAME_MAX)?;
        let color = input.color.as_deref().unwrap_or(DEFAULT_TAG_COLOR);
        validate::color(color)?;

        self.conn
            .execute(
                "INSERT INTO tags (name, color, description) VALUES (?1, ?2, ?3)",
                params![
                    input.name.trim(),
                    color,
                    non_blank(input.description.as_deref())
                ],
            )
            .on_constraint("tag")?;
        self.get_tag(self.conn.last_insert_rowid()).found("tag")
    }

    /// Get a tag by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_tag(&self, id: i64) -> Result<Option<Tag>> {
        let tag = self
            .conn
            .query_row(
                "SELECT id, name, color, description FROM tags WHERE id = ?1",
                [id],
                row_to_tag,
            )
            .optional()?;
        Ok(tag)
    }

    /// List tags by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_tags(&self, search: Option<&str>) -> Result<Vec<Tag>> {
        let pattern = search.map(search_pattern);
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, name, color, description FROM tags
            WHERE (?1 IS NULL OR casefold(name) LIKE ?1)
            ORDER BY name
            ",
        )?;
        let tags = stmt
            .query_map([pattern], row_to_tag)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    /// Update a tag.
    ///
    /// # Errors
    ///
    /// Returns not found, a validation error, or a conflict.
    pub fn update_tag(&self, id: i64, patch: &TagPatch) -> Result<Tag> {
        let current = self.get_tag(id).found("tag")?;
        let name = patch.name.as_deref().unwrap_or(&current.name);
        validate::required("name", name, TAG_NAME_MAX)?;
        let color = patch.color.as_deref().unwrap_or(&current.color);
        validate::color(color)?;
        let description = patch.description.clone().unwrap_or(current.description);

        self.conn
            .execute(
                "UPDATE tags SET name = ?1, color = ?2, description = ?3 WHERE id = ?4",
                params![name.trim(), color, non_blank(description.as_deref()), id],
            )
            .on_constraint("tag")?;
        self.get_tag(id).found("tag")
    }

    /// Delete a tag, detaching it from every product.
    ///
    /// # Errors
    ///
    /// Returns not found for unknown tags.
    pub fn delete_tag(&self, id: i64) -> Result<()> {
        let affected = self.conn.execute("DELETE FROM tags WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(Error::not_found("tag"));
        }
        Ok(())
    }

    /// Validate an explicit slug, or derive a unique one from `name`.
    pub(super) fn resolve_slug(
        &self,
        table: &'static str,
        explicit: Option<&str>,
        name: &str,
        exclude_id: Option<i64>,
    ) -> Result<String> {
        match explicit.map(str::trim).filter(|s| !s.is_empty()) {
            Some(slug) => {
                validate::slug(slug)?;
                Ok(slug.to_string())
            }
            None => self.unique_slug(table, &slugify(name), exclude_id),
        }
    }
}

/// Map a restricted delete to a conflict.
fn in_use(err: rusqlite::Error, what: &'static str) -> Error {
    match Error::from_constraint(err, what) {
        Error::Validation { .. } => Error::conflict(format!("{what} is still used by products")),
        other => other,
    }
}

pub(super) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn row_to_category(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        parent: row.get(3)?,
        parent_name: row.get(4)?,
        children_count: row.get(5)?,
    })
}

fn row_to_brand(row: &Row) -> rusqlite::Result<Brand> {
    Ok(Brand {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        official_website: row.get(3)?,
        description: row.get(4)?,
        products_count: row.get(5)?,
    })
}

fn row_to_tag(row: &Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        description: row.get(3)?,
    })
}
