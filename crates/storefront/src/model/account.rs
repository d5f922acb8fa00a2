//! Users and profiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// Identifier.
    pub id: i64,
    /// Unique login name.
    pub username: String,
    /// Unique e-mail address.
    pub email: String,
    /// Given name, may be empty.
    pub first_name: String,
    /// Family name, may be empty.
    pub last_name: String,
    /// Staff users administer the shop.
    pub is_staff: bool,
    /// Inactive users cannot log in.
    pub is_active: bool,
    /// Registration time.
    pub date_joined: DateTime<Utc>,
    /// Encoded password hash.
    #[serde(skip)]
    pub password_hash: String,
}

impl User {
    /// Full name, falling back to the username when both names are empty.
    #[must_use]
    pub fn display_name(&self) -> String {
        display_name(&self.first_name, &self.last_name, &self.username)
    }
}

/// `"first last"` trimmed, or `username` if that is empty.
#[must_use]
pub fn display_name(first: &str, last: &str, username: &str) -> String {
    let full = format!("{first} {last}");
    let full = full.trim();
    if full.is_empty() {
        username.to_string()
    } else {
        full.to_string()
    }
}

/// Registration input.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    /// Login name.
    pub username: String,
    /// E-mail address.
    pub email: String,
    /// Password.
    pub password: String,
    /// Password confirmation.
    pub password2: String,
    /// Optional given name.
    #[serde(default)]
    pub first_name: String,
    /// Optional family name.
    #[serde(default)]
    pub last_name: String,
}

/// Changes a user may make to their own account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    /// New e-mail address.
    pub email: Option<String>,
    /// New given name.
    pub first_name: Option<String>,
    /// New family name.
    pub last_name: Option<String>,
}

/// Delivery details attached to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    /// Identifier.
    pub id: i64,
    /// Owning user.
    pub user: i64,
    /// Owner's e-mail.
    pub user_email: String,
    /// Owner's display name.
    pub user_name: String,
    /// Default delivery address.
    pub delivery_address: Option<String>,
    /// Contact phone.
    pub phone_number: Option<String>,
    /// Stored path of the avatar under the media root.
    pub profile_picture: Option<String>,
    /// Public URL of the avatar.
    pub profile_picture_url: Option<String>,
}

/// Profile changes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    /// New delivery address (`null` clears).
    #[serde(default, deserialize_with = "super::nullable")]
    pub delivery_address: Option<Option<String>>,
    /// New phone number (`null` clears).
    #[serde(default, deserialize_with = "super::nullable")]
    pub phone_number: Option<Option<String>>,
}
