//! Product reviews.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tracing::info;

use super::catalog::non_blank;
use super::{now, sql_limit, Storage};
use crate::error::{ConstraintExt, Error, FoundExt, Result};
use crate::model::{display_name, parse_timestamp, NewReview, ReviewFilter, ReviewPatch, ReviewView};
use crate::validate;

const REVIEW_SELECT: &str = r"
SELECT r.id, r.user_id, u.email, u.first_name, u.last_name, u.username,
       r.product_id, p.name, r.rating, r.comment, r.admin_response, r.created_at, r.updated_at
FROM reviews r
JOIN users u ON u.id = r.user_id
JOIN products p ON p.id = r.product_id
";

/// What the caller may change on a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewRights {
    /// Rating and comment (the author).
    pub edit_content: bool,
    /// Admin response (staff).
    pub respond: bool,
}

impl Storage {
    /// Post a review as `user_id`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad rating or unknown product, and a
    /// conflict if the user already reviewed the product.
    pub fn create_review(&self, user_id: i64, input: &NewReview) -> Result<ReviewView> {
        validate::range("rating", input.rating, 1, 5)?;
        self.require_product(input.product)?;

        let ts = now();
        self.conn
            .execute(
                r"
                INSERT INTO reviews (user_id, product_id, rating, comment, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                ",
                params![
                    user_id,
                    input.product,
                    input.rating,
                    non_blank(input.comment.as_deref()),
                    ts
                ],
            )
            .on_constraint("review")?;

        let id = self.conn.last_insert_rowid();
        info!(review_id = id, product_id = input.product, "Created review");
        self.get_review(id).found("review")
    }

    /// Get a review by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_review(&self, id: i64) -> Result<Option<ReviewView>> {
        let review = self
            .conn
            .query_row(
                &format!("{REVIEW_SELECT} WHERE r.id = ?1"),
                [id],
                row_to_review,
            )
            .optional()?;
        Ok(review)
    }

    /// Reviews matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_reviews(&self, filter: &ReviewFilter) -> Result<Vec<ReviewView>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(product) = filter.product {
            clauses.push("r.product_id = ?");
            values.push(Value::Integer(product));
        }
        if let Some(user) = filter.user {
            clauses.push("r.user_id = ?");
            values.push(Value::Integer(user));
        }
        if let Some(min) = filter.min_rating {
            clauses.push("r.rating >= ?");
            values.push(Value::Integer(min));
        }
        if let Some(rating) = filter.rating {
            clauses.push("r.rating = ?");
            values.push(Value::Integer(rating));
        }
        if let Some(band) = filter.rating_band {
            let (clause, value) = band.sql();
            clauses.push(clause);
            values.push(Value::Integer(value));
        }
        match filter.with_response {
            Some(true) => clauses.push("COALESCE(r.admin_response, '') != ''"),
            Some(false) => clauses.push("COALESCE(r.admin_response, '') = ''"),
            None => {}
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        values.push(Value::Integer(sql_limit(filter.limit)));

        let mut stmt = self.conn.prepare(&format!(
            "{REVIEW_SELECT}{where_sql} ORDER BY r.created_at DESC, r.id DESC LIMIT ?"
        ))?;
        let reviews = stmt
            .query_map(params_from_iter(values.iter()), row_to_review)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(reviews)
    }

    /// Reviews of one product, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn reviews_for_product(&self, product: i64) -> Result<Vec<ReviewView>> {
        self.list_reviews(&ReviewFilter {
            product: Some(product),
            ..ReviewFilter::default()
        })
    }

    /// Reviews that have a non-empty admin response.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn reviews_with_response(&self) -> Result<Vec<ReviewView>> {
        self.list_reviews(&ReviewFilter {
            with_response: Some(true),
            ..ReviewFilter::default()
        })
    }

    /// Edit a review within `rights`.
    ///
    /// The author and product of a review never change.
    ///
    /// # Errors
    ///
    /// Returns not found, a validation error for a moved review or bad
    /// rating, and permission denied for fields outside `rights`.
    pub fn update_review(
        &self,
        id: i64,
        patch: &ReviewPatch,
        rights: ReviewRights,
    ) -> Result<ReviewView> {
        let current = self.get_review(id).found("review")?;

        if patch.user.is_some_and(|u| u != current.user) {
            return Err(Error::field("user", "the author of a review cannot be changed"));
        }
        if patch.product.is_some_and(|p| p != current.product) {
            return Err(Error::field(
                "product",
                "the product of a review cannot be changed",
            ));
        }
        if (patch.rating.is_some() || patch.comment.is_some()) && !rights.edit_content {
            return Err(Error::permission_denied(
                "only the author can edit a review",
            ));
        }
        if patch.admin_response.is_some() && !rights.respond {
            return Err(Error::permission_denied(
                "only staff can respond to reviews",
            ));
        }

        let rating = patch.rating.unwrap_or(current.rating);
        validate::range("rating", rating, 1, 5)?;
        let comment = patch.comment.clone().unwrap_or(current.comment);
        let response = patch
            .admin_response
            .clone()
            .unwrap_or(current.admin_response);

        self.conn.execute(
            r"
            UPDATE reviews SET rating = ?1, comment = ?2, admin_response = ?3, updated_at = ?4
            WHERE id = ?5
            ",
            params![
                rating,
                non_blank(comment.as_deref()),
                non_blank(response.as_deref()),
                now(),
                id
            ],
        )?;
        self.get_review(id).found("review")
    }

    /// Set the admin response on a review.
    ///
    /// # Errors
    ///
    /// Returns not found for unknown reviews.
    pub fn respond_to_review(&self, id: i64, response: &str) -> Result<ReviewView> {
        self.update_review(
            id,
            &ReviewPatch {
                admin_response: Some(Some(response.to_string())),
                ..ReviewPatch::default()
            },
            ReviewRights {
                edit_content: false,
                respond: true,
            },
        )
    }

    /// Delete a review.
    ///
    /// # Errors
    ///
    /// Returns not found for unknown reviews.
    pub fn delete_review(&self, id: i64) -> Result<()> {
        let affected = self.conn.execute("DELETE FROM reviews WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(Error::not_found("review"));
        }
        Ok(())
    }
}

fn row_to_review(row: &Row) -> rusqlite::Result<ReviewView> {
    let first: String = row.get(3)?;
    let last: String = row.get(4)?;
    let username: String = row.get(5)?;
    let created_at: String = row.get(11)?;
    let updated_at: String = row.get(12)?;
    Ok(ReviewView {
        id: row.get(0)?,
        user: row.get(1)?,
        user_email: row.get(2)?,
        user_name: display_name(&first, &last, &username),
        product: row.get(6)?,
        product_name: row.get(7)?,
        rating: row.get(8)?,
        comment: row.get(9)?,
        admin_response: row.get(10)?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{product, storage, user};
    use super::*;
    use crate::model::RatingFilter;

    const AUTHOR: ReviewRights = ReviewRights {
        edit_content: true,
        respond: false,
    };

    fn new_review(product: i64, rating: i64) -> NewReview {
        NewReview {
            product,
            rating,
            comment: Some("Good".to_string()),
        }
    }

    #[test]
    fn test_create_review() {
        let storage = storage();
        let p = product(&storage, "Phone", 100, 1);
        let u = user(&storage, "ivan");

        let review = storage.create_review(u, &new_review(p, 4)).unwrap();
        assert_eq!(review.user_name, "ivan");
        assert_eq!(review.product_name, "Phone");
        assert_eq!(review.rating, 4);
    }

    #[test]
    fn test_one_review_per_user_and_product() {
        let storage = storage();
        let p = product(&storage, "Phone", 100, 1);
        let u = user(&storage, "ivan");
        storage.create_review(u, &new_review(p, 4)).unwrap();

        let err = storage.create_review(u, &new_review(p, 5)).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_rating_bounds() {
        let storage = storage();
        let p = product(&storage, "Phone", 100, 1);
        let u = user(&storage, "ivan");
        assert!(storage
            .create_review(u, &new_review(p, 6))
            .unwrap_err()
            .is_validation());
        assert!(storage
            .create_review(u, &new_review(p, 0))
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_cannot_move_review() {
        let storage = storage();
        let p = product(&storage, "Phone", 100, 1);
        let other = product(&storage, "Other", 100, 1);
        let u = user(&storage, "ivan");
        let review = storage.create_review(u, &new_review(p, 4)).unwrap();

        let err = storage
            .update_review(
                review.id,
                &ReviewPatch {
                    product: Some(other),
                    ..ReviewPatch::default()
                },
                AUTHOR,
            )
            .unwrap_err();
        assert!(err.is_validation());

        let same = storage
            .update_review(
                review.id,
                &ReviewPatch {
                    product: Some(p),
                    rating: Some(2),
                    ..ReviewPatch::default()
                },
                AUTHOR,
            )
            .unwrap();
        assert_eq!(same.rating, 2);
    }

    #[test]
    fn test_response_requires_staff() {
        let storage = storage();
        let p = product(&storage, "Phone", 100, 1);
        let u = user(&storage, "ivan");
        let review = storage.create_review(u, &new_review(p, 4)).unwrap();

        let err = storage
            .update_review(
                review.id,
                &ReviewPatch {
                    admin_response: Some(Some("Thanks".to_string())),
                    ..ReviewPatch::default()
                },
                AUTHOR,
            )
            .unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));

        let review = storage.respond_to_review(review.id, "Thanks").unwrap();
        assert_eq!(review.admin_response.as_deref(), Some("Thanks"));
        assert_eq!(storage.reviews_with_response().unwrap().len(), 1);
    }

    #[test]
    fn test_filters() {
        let storage = storage();
        let p = product(&storage, "Phone", 100, 1);
        for (name, rating) in [("a", 1), ("b", 3), ("c", 4), ("d", 5)] {
            let u = user(&storage, name);
            storage.create_review(u, &new_review(p, rating)).unwrap();
        }

        let ratings = |filter: ReviewFilter| -> Vec<i64> {
            let mut r: Vec<i64> = storage
                .list_reviews(&filter)
                .unwrap()
                .into_iter()
                .map(|r| r.rating)
                .collect();
            r.sort_unstable();
            r
        };

        assert_eq!(
            ratings(ReviewFilter {
                rating_band: Some(RatingFilter::new(5).unwrap()),
                ..ReviewFilter::default()
            }),
            vec![5]
        );
        assert_eq!(
            ratings(ReviewFilter {
                rating_band: Some(RatingFilter::new(3).unwrap()),
                ..ReviewFilter::default()
            }),
            vec![3, 4, 5]
        );
        assert_eq!(
            ratings(ReviewFilter {
                min_rating: Some(4),
                ..ReviewFilter::default()
            }),
            vec![4, 5]
        );
        assert_eq!(
            ratings(ReviewFilter {
                with_response: Some(false),
                ..ReviewFilter::default()
            }),
            vec![1, 3, 4, 5]
        );
        assert_eq!(storage.reviews_for_product(p).unwrap().len(), 4);
    }

    #[test]
    fn test_delete_review() {
        let storage = storage();
        let p = product(&storage, "Phone", 100, 1);
        let u = user(&storage, "ivan");
        let review = storage.create_review(u, &new_review(p, 4)).unwrap();

        storage.delete_review(review.id).unwrap();
        assert!(storage.delete_review(review.id).unwrap_err().is_not_found());
    }
}
