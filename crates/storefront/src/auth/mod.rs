//! Accounts: registration, login and API tokens.
//!
//! Passwords are stored as PBKDF2 hashes (see [`password`]). A user holds at
//! most one API token; logging in again hands back the existing one.

pub mod password;
pub mod policy;

use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::model::{NewUser, User};
use crate::storage::{NewAccount, Storage};
use crate::validate;

pub use password::{hash_password, verify_password, DEFAULT_ITERATIONS};
pub use policy::{PasswordPolicy, PolicyViolation, DEFAULT_MIN_PASSWORD_LENGTH};

/// Length of a generated token, in bytes (hex doubles it).
const TOKEN_BYTES: usize = 20;

/// Generate a new random API token: 40 hex characters.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    hex::encode(bytes)
}

/// Extract the key from an `Authorization` header value.
///
/// Accepts `Token <key>` and `Bearer <key>`.
#[must_use]
pub fn parse_authorization(value: &str) -> Option<&str> {
    let (scheme, key) = value.trim().split_once(' ')?;
    let key = key.trim();
    let known = scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer");
    (known && !key.is_empty()).then_some(key)
}

/// Verify `password` against the user's stored hash.
///
/// # Errors
///
/// Returns an authentication error on mismatch.
pub fn check_password(user: &User, password: &str) -> Result<()> {
    if verify_password(password, &user.password_hash) {
        Ok(())
    } else {
        Err(rejected(&user.username))
    }
}

/// Fail with an `email` field error when another account uses `email`.
///
/// # Errors
///
/// Returns a validation error for a taken address.
pub fn ensure_email_free(storage: &Storage, email: &str) -> Result<()> {
    if storage.email_taken(email.trim(), None)? {
        return Err(Error::field("email", "A user with this email already exists."));
    }
    Ok(())
}

fn rejected(username: &str) -> Error {
    warn!(username = %username.trim(), "Failed login");
    Error::authentication("invalid credentials")
}

/// Registration and login against a [`Storage`].
#[derive(Debug, Clone)]
pub struct Authenticator {
    iterations: u32,
    policy: PasswordPolicy,
}

impl Default for Authenticator {
    fn default() -> Self {
        Self::from_config(&AuthConfig::default())
    }
}

impl Authenticator {
    /// Build from the `[auth]` configuration section.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            iterations: config.pbkdf2_iterations,
            policy: PasswordPolicy::new(config.min_password_length),
        }
    }

    /// Hash a password with the configured iteration count.
    ///
    /// # Errors
    ///
    /// Returns an internal error if hashing fails.
    pub fn hash(&self, password: &str) -> Result<String> {
        hash_password(password, self.iterations)
    }

    /// Create a regular user account.
    ///
    /// Runs [`Authenticator::check_registration`], hashes the password and
    /// finishes with [`Authenticator::complete_registration`]. Callers that
    /// share the storage between threads run the three steps separately so
    /// that hashing happens without holding it.
    ///
    /// # Errors
    ///
    /// Returns a validation error for missing fields, mismatched or weak
    /// passwords and a taken e-mail, and a conflict for a taken username.
    pub fn register(&self, storage: &Storage, input: &NewUser) -> Result<User> {
        self.check_registration(input)?;
        ensure_email_free(storage, &input.email)?;
        let password_hash = self.hash(&input.password)?;
        self.complete_registration(storage, input, password_hash)
    }

    /// Validate a registration form without touching storage.
    ///
    /// # Errors
    ///
    /// Returns a validation error for missing fields and mismatched or weak
    /// passwords.
    pub fn check_registration(&self, input: &NewUser) -> Result<()> {
        validate::required("username", &input.username, 150)?;
        validate::required("email", &input.email, 254)?;
        validate::email(input.email.trim())?;
        validate::required("password", &input.password, 128)?;
        validate::max_len("first_name", &input.first_name, 150)?;
        validate::max_len("last_name", &input.last_name, 150)?;

        if input.password != input.password2 {
            return Err(Error::field("password2", "Password fields didn't match."));
        }

        let violations = self
            .policy
            .check(&input.password, input.username.trim(), input.email.trim());
        if !violations.is_empty() {
            let message = violations
                .iter()
                .map(PolicyViolation::message)
                .collect::<Vec<_>>()
                .join(" ");
            return Err(Error::field("password", message));
        }
        Ok(())
    }

    /// Store a checked registration with its precomputed password hash.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a taken e-mail and a conflict for a
    /// taken username.
    pub fn complete_registration(
        &self,
        storage: &Storage,
        input: &NewUser,
        password_hash: String,
    ) -> Result<User> {
        ensure_email_free(storage, &input.email)?;
        let user = storage.create_user(&NewAccount {
            username: input.username.trim().to_string(),
            email: input.email.trim().to_string(),
            password_hash,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            is_staff: false,
        })?;
        info!(user_id = user.id, username = %user.username, "Registered user");
        Ok(user)
    }

    /// Check credentials and return the user with their API token.
    ///
    /// The steps are [`Authenticator::find_user`], [`check_password`] and
    /// [`Authenticator::issue_token`]; only the middle one is expensive.
    ///
    /// # Errors
    ///
    /// Returns a validation error when either credential is missing and an
    /// authentication error for unknown users, wrong passwords and inactive
    /// accounts.
    pub fn login(&self, storage: &Storage, username: &str, password: &str) -> Result<(User, String)> {
        let user = self.find_user(storage, username, password)?;
        check_password(&user, password)?;
        self.issue_token(storage, user)
    }

    /// Look up the account a login attempt names.
    ///
    /// # Errors
    ///
    /// Returns a validation error when either credential is missing and an
    /// authentication error for unknown users.
    pub fn find_user(&self, storage: &Storage, username: &str, password: &str) -> Result<User> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(Error::validation("Username and password are required."));
        }
        storage
            .get_user_by_username(username.trim())?
            .ok_or_else(|| rejected(username))
    }

    /// Hand out the user's API token, creating it on first login.
    ///
    /// # Errors
    ///
    /// Returns an authentication error for inactive accounts.
    pub fn issue_token(&self, storage: &Storage, user: User) -> Result<(User, String)> {
        if !user.is_active {
            return Err(Error::authentication("account disabled"));
        }

        let token = match storage.token_for_user(user.id)? {
            Some(token) => token,
            None => {
                let token = generate_token();
                storage.insert_token(user.id, &token)?;
                token
            }
        };
        info!(user_id = user.id, "Logged in");
        Ok((user, token))
    }

    /// Revoke the user's token.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn logout(&self, storage: &Storage, user_id: i64) -> Result<bool> {
        storage.delete_token(user_id)
    }

    /// Resolve an `Authorization` header value to an active user.
    ///
    /// # Errors
    ///
    /// Returns an authentication error for malformed headers and unknown
    /// tokens.
    pub fn authenticate(&self, storage: &Storage, header: &str) -> Result<User> {
        let key = parse_authorization(header)
            .ok_or_else(|| Error::authentication("malformed authorization header"))?;
        storage
            .user_for_token(key)?
            .ok_or_else(|| Error::authentication("invalid token"))
    }
}
