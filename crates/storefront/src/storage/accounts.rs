//! Users, auth tokens and profiles.

use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, info};

use super::{now, sql_limit, Storage};
use crate::error::{ConstraintExt, Error, FoundExt, Result};
use crate::model::{display_name, parse_timestamp, Profile, ProfilePatch, User, UserPatch};
use crate::validate;

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, is_staff, is_active, date_joined, password_hash";

/// A user row ready to insert; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
}

impl Storage {
    /// Insert a user.
    ///
    /// # Errors
    ///
    /// Returns a conflict if the username or e-mail is taken.
    pub fn create_user(&self, account: &NewAccount) -> Result<User> {
        self.conn
            .execute(
                r"
                INSERT INTO users (username, email, password_hash, first_name, last_name, is_staff, date_joined)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
                params![
                    account.username,
                    account.email,
                    account.password_hash,
                    account.first_name,
                    account.last_name,
                    account.is_staff,
                    now(),
                ],
            )
            .on_constraint("user")?;

        let id = self.conn.last_insert_rowid();
        info!(user_id = id, username = %account.username, "Created user");
        self.get_user(id).found("user")
    }

    /// Get a user by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                [id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Get a user by username.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                [username],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// List users ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_users(&self, limit: Option<usize>) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id LIMIT ?1"))?;
        let users = stmt
            .query_map([sql_limit(limit)], row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Whether another user already uses `email`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn email_taken(&self, email: &str, exclude_user: Option<i64>) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE lower(email) = lower(?1) AND id != ?2",
            params![email, exclude_user.unwrap_or(-1)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Apply a self-service account change.
    ///
    /// # Errors
    ///
    /// Returns not found for unknown users or a conflict for a taken e-mail.
    pub fn update_user(&self, id: i64, patch: &UserPatch) -> Result<User> {
        let mut user = self.get_user(id).found("user")?;
        if let Some(email) = &patch.email {
            validate::email(email)?;
            user.email.clone_from(email);
        }
        if let Some(first) = &patch.first_name {
            user.first_name.clone_from(first);
        }
        if let Some(last) = &patch.last_name {
            user.last_name.clone_from(last);
        }

        self.conn
            .execute(
                "UPDATE users SET email = ?1, first_name = ?2, last_name = ?3 WHERE id = ?4",
                params![user.email, user.first_name, user.last_name, id],
            )
            .on_constraint("user")?;
        Ok(user)
    }

    /// Grant or revoke staff rights.
    ///
    /// # Errors
    ///
    /// Returns not found for unknown users.
    pub fn set_staff(&self, id: i64, is_staff: bool) -> Result<User> {
        let affected = self.conn.execute(
            "UPDATE users SET is_staff = ?1 WHERE id = ?2",
            params![is_staff, id],
        )?;
        if affected == 0 {
            return Err(Error::not_found("user"));
        }
        info!(user_id = id, is_staff, "Changed staff flag");
        self.get_user(id).found("user")
    }

    /// Activate or deactivate a user. Deactivation revokes the token.
    ///
    /// # Errors
    ///
    /// Returns not found for unknown users.
    pub fn set_active(&self, id: i64, is_active: bool) -> Result<User> {
        let affected = self.conn.execute(
            "UPDATE users SET is_active = ?1 WHERE id = ?2",
            params![is_active, id],
        )?;
        if affected == 0 {
            return Err(Error::not_found("user"));
        }
        if !is_active {
            self.delete_token(id)?;
        }
        info!(user_id = id, is_active, "Changed active flag");
        self.get_user(id).found("user")
    }

    /// The user's current token key, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn token_for_user(&self, user_id: i64) -> Result<Option<String>> {
        let key = self
            .conn
            .query_row(
                "SELECT key FROM auth_tokens WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(key)
    }

    /// Store a new token for the user.
    ///
    /// # Errors
    ///
    /// Returns a conflict if the user already has a token.
    pub fn insert_token(&self, user_id: i64, key: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO auth_tokens (key, user_id, created_at) VALUES (?1, ?2, ?3)",
                params![key, user_id, now()],
            )
            .on_constraint("token")?;
        debug!(user_id, "Issued auth token");
        Ok(())
    }

    /// Resolve a token key to its active user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn user_for_token(&self, key: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM auth_tokens t JOIN users u ON u.id = t.user_id \
                     WHERE t.key = ?1 AND u.is_active = 1",
                    prefixed_user_columns()
                ),
                [key],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Revoke the user's token. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_token(&self, user_id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM auth_tokens WHERE user_id = ?1", [user_id])?;
        Ok(affected > 0)
    }

    /// The user's profile, created on first access.
    ///
    /// # Errors
    ///
    /// Returns not found for unknown users.
    pub fn profile(&self, user_id: i64) -> Result<Profile> {
        if self.get_user(user_id)?.is_none() {
            return Err(Error::not_found("user"));
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO profiles (user_id) VALUES (?1)",
            [user_id],
        )?;

        let profile = self
            .conn
            .query_row(
                r"
                SELECT p.id, p.user_id, u.email, u.first_name, u.last_name, u.username,
                       p.delivery_address, p.phone_number, p.profile_picture
                FROM profiles p JOIN users u ON u.id = p.user_id
                WHERE p.user_id = ?1
                ",
                [user_id],
                |row| {
                    let first: String = row.get(3)?;
                    let last: String = row.get(4)?;
                    let username: String = row.get(5)?;
                    let picture: Option<String> = row.get(8)?;
                    Ok(Profile {
                        id: row.get(0)?,
                        user: row.get(1)?,
                        user_email: row.get(2)?,
                        user_name: display_name(&first, &last, &username),
                        delivery_address: row.get(6)?,
                        phone_number: row.get(7)?,
                        profile_picture_url: picture.as_deref().map(|p| self.media_url(p)),
                        profile_picture: picture,
                    })
                },
            )
            .optional()?;
        profile.ok_or(Error::not_found("user"))
    }

    /// Update delivery details.
    ///
    /// # Errors
    ///
    /// Returns not found for unknown users.
    pub fn update_profile(&self, user_id: i64, patch: &ProfilePatch) -> Result<Profile> {
        let mut profile = self.profile(user_id)?;
        if let Some(address) = &patch.delivery_address {
            profile.delivery_address.clone_from(address);
        }
        if let Some(phone) = &patch.phone_number {
            if let Some(phone) = phone {
                validate::max_len("phone_number", phone, 20)?;
                validate::phone(phone)?;
            }
            profile.phone_number.clone_from(phone);
        }

        self.conn.execute(
            "UPDATE profiles SET delivery_address = ?1, phone_number = ?2 WHERE user_id = ?3",
            params![profile.delivery_address, profile.phone_number, user_id],
        )?;
        self.profile(user_id)
    }

    /// Record a new profile picture, returning the path it replaced.
    ///
    /// # Errors
    ///
    /// Returns not found for unknown users.
    pub fn set_profile_picture(&self, user_id: i64, path: &str) -> Result<Option<String>> {
        let previous = self.profile(user_id)?.profile_picture;
        self.conn.execute(
            "UPDATE profiles SET profile_picture = ?1 WHERE user_id = ?2",
            params![path, user_id],
        )?;
        Ok(previous)
    }
}

fn prefixed_user_columns() -> String {
    USER_COLUMNS
        .split(", ")
        .map(|c| format!("u.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    let date_joined: String = row.get(7)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        is_staff: row.get(5)?,
        is_active: row.get(6)?,
        date_joined: parse_timestamp(&date_joined),
        password_hash: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{storage, user};
    use super::*;

    fn account(username: &str, email: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            first_name: "Ivan".to_string(),
            last_name: String::new(),
            is_staff: false,
        }
    }

    #[test]
    fn test_create_and_get_user() {
        let storage = storage();
        let created = storage.create_user(&account("ivan", "ivan@x.io")).unwrap();
        assert!(created.is_active);
        assert!(!created.is_staff);

        let found = storage.get_user_by_username("ivan").unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.password_hash, "hash");
        assert!(storage.get_user(999).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_username_conflicts() {
        let storage = storage();
        storage.create_user(&account("ivan", "a@x.io")).unwrap();
        let err = storage.create_user(&account("ivan", "b@x.io")).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_email_taken_is_case_insensitive() {
        let storage = storage();
        let id = storage.create_user(&account("ivan", "Ivan@x.io")).unwrap().id;
        assert!(storage.email_taken("ivan@X.io", None).unwrap());
        assert!(!storage.email_taken("ivan@x.io", Some(id)).unwrap());
    }

    #[test]
    fn test_update_user() {
        let storage = storage();
        let id = user(&storage, "ivan");
        let updated = storage
            .update_user(
                id,
                &UserPatch {
                    last_name: Some("Petrov".to_string()),
                    ..UserPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.last_name, "Petrov");
        assert_eq!(updated.email, "ivan@example.com");
    }

    #[test]
    fn test_tokens() {
        let storage = storage();
        let id = user(&storage, "ivan");
        assert!(storage.token_for_user(id).unwrap().is_none());

        storage.insert_token(id, "abc").unwrap();
        assert_eq!(storage.token_for_user(id).unwrap().as_deref(), Some("abc"));
        assert_eq!(storage.user_for_token("abc").unwrap().unwrap().id, id);
        assert!(storage.user_for_token("nope").unwrap().is_none());

        assert!(storage.delete_token(id).unwrap());
        assert!(storage.user_for_token("abc").unwrap().is_none());
    }

    #[test]
    fn test_deactivate_revokes_token() {
        let storage = storage();
        let id = user(&storage, "ivan");
        storage.insert_token(id, "abc").unwrap();

        let user = storage.set_active(id, false).unwrap();
        assert!(!user.is_active);
        assert!(storage.token_for_user(id).unwrap().is_none());
    }

    #[test]
    fn test_set_staff_unknown_user() {
        let storage = storage();
        assert!(storage.set_staff(42, true).unwrap_err().is_not_found());
    }

    #[test]
    fn test_profile_created_lazily() {
        let storage = storage();
        let id = user(&storage, "ivan");

        let first = storage.profile(id).unwrap();
        let second = storage.profile(id).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.user_name, "ivan");
        assert!(first.delivery_address.is_none());
    }

    #[test]
    fn test_profile_unknown_user() {
        let storage = storage();
        assert!(storage.profile(7).unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_profile_and_picture() {
        let storage = storage();
        let id = user(&storage, "ivan");

        let profile = storage
            .update_profile(
                id,
                &ProfilePatch {
                    delivery_address: Some(Some("Moscow".to_string())),
                    phone_number: None,
                },
            )
            .unwrap();
        assert_eq!(profile.delivery_address.as_deref(), Some("Moscow"));

        assert!(storage
            .set_profile_picture(id, "profiles/a.png")
            .unwrap()
            .is_none());
        let previous = storage.set_profile_picture(id, "profiles/b.png").unwrap();
        assert_eq!(previous.as_deref(), Some("profiles/a.png"));
        assert_eq!(
            storage.profile(id).unwrap().profile_picture_url.as_deref(),
            Some("/media/profiles/b.png")
        );
    }
}
