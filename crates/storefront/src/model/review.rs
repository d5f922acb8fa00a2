//! Product reviews.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A review as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewView {
    pub id: i64,
    pub user: i64,
    pub user_email: String,
    pub user_name: String,
    pub product: i64,
    pub product_name: String,
    /// 1..=5.
    pub rating: i64,
    pub comment: Option<String>,
    pub admin_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Review input. The author is always the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub product: i64,
    pub rating: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Review changes.
///
/// `user` and `product` are accepted only so that attempts to move a review
/// can be rejected explicitly.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewPatch {
    pub rating: Option<i64>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub comment: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub admin_response: Option<Option<String>>,
    pub user: Option<i64>,
    pub product: Option<i64>,
}

/// Console rating filter: 5 and 1 match exactly, 2 to 4 mean "or more".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingFilter(u8);

impl RatingFilter {
    /// Create a filter for `rating` (1..=5).
    ///
    /// # Errors
    ///
    /// Returns a validation error for ratings outside 1..=5.
    pub fn new(rating: u8) -> crate::Result<Self> {
        if (1..=5).contains(&rating) {
            Ok(Self(rating))
        } else {
            Err(Error::field("rating", "rating must be between 1 and 5"))
        }
    }

    /// Whether `rating` passes this filter.
    #[must_use]
    pub fn matches(self, rating: i64) -> bool {
        let wanted = i64::from(self.0);
        match self.0 {
            1 | 5 => rating == wanted,
            _ => rating >= wanted,
        }
    }

    /// SQL predicate on `r.rating` and its bound value.
    pub(crate) fn sql(self) -> (&'static str, i64) {
        let op = match self.0 {
            1 | 5 => "r.rating = ?",
            _ => "r.rating >= ?",
        };
        (op, i64::from(self.0))
    }
}

impl FromStr for RatingFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rating: u8 = s
            .trim()
            .parse()
            .map_err(|_| Error::field("rating", format!("invalid rating: {s}")))?;
        Self::new(rating)
    }
}

/// Review list filter.
#[derive(Debug, Clone, Default)]
pub struct ReviewFilter {
    pub product: Option<i64>,
    pub user: Option<i64>,
    pub min_rating: Option<i64>,
    /// Exact rating match.
    pub rating: Option<i64>,
    /// Console-style banded rating.
    pub rating_band: Option<RatingFilter>,
    /// Only reviews with (`true`) or without (`false`) an admin response.
    pub with_response: Option<bool>,
    pub limit: Option<usize>,
}
