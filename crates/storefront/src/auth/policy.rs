//! Password strength rules applied at registration.

/// Default minimum password length.
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 8;

/// Passwords whose similarity to a user attribute reaches this ratio are
/// rejected.
const MAX_SIMILARITY: f64 = 0.7;

/// Frequently used passwords, lowercase.
const COMMON_PASSWORDS: &[&str] = &[
    "123456", "123456789", "12345678", "1234567890", "password", "password1",
    "qwerty", "qwerty123", "qwertyuiop", "111111", "123123", "abc123",
    "1q2w3e4r", "1q2w3e4r5t", "iloveyou", "admin", "admin123", "welcome",
    "monkey", "dragon", "letmein", "football", "baseball", "sunshine",
    "princess", "master", "shadow", "superman", "trustno1", "passw0rd",
    "zaq12wsx", "asdfghjkl", "starwars", "whatever", "michael", "charlie",
    "jennifer", "computer", "internet", "changeme", "secret", "p@ssw0rd",
];

/// Which rule a password broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    /// Shorter than the minimum.
    TooShort {
        /// Required length.
        min: usize,
    },
    /// Only digits.
    EntirelyNumeric,
    /// In the common password list.
    Common,
    /// Too close to the named user attribute.
    TooSimilar {
        /// Attribute name (`username`, `email`).
        attribute: &'static str,
    },
}

impl PolicyViolation {
    /// Message shown to the user.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::TooShort { min } => {
                format!("This password is too short. It must contain at least {min} characters.")
            }
            Self::EntirelyNumeric => "This password is entirely numeric.".to_string(),
            Self::Common => "This password is too common.".to_string(),
            Self::TooSimilar { attribute } => {
                format!("The password is too similar to the {attribute}.")
            }
        }
    }
}

/// Password strength rules.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    min_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_PASSWORD_LENGTH)
    }
}

impl PasswordPolicy {
    /// Policy with the given minimum length.
    #[must_use]
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    /// Every rule `password` breaks for a user with this username and email.
    #[must_use]
    pub fn check(&self, password: &str, username: &str, email: &str) -> Vec<PolicyViolation> {
        let mut violations = Vec::new();

        if let Some(violation) = similarity_violation(password, username, email) {
            violations.push(violation);
        }
        if password.chars().count() < self.min_length {
            violations.push(PolicyViolation::TooShort {
                min: self.min_length,
            });
        }
        if COMMON_PASSWORDS.contains(&password.trim().to_lowercase().as_str()) {
            violations.push(PolicyViolation::Common);
        }
        if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
            violations.push(PolicyViolation::EntirelyNumeric);
        }

        violations
    }
}

fn similarity_violation(password: &str, username: &str, email: &str) -> Option<PolicyViolation> {
    let password = password.to_lowercase();
    let local_part = email.split('@').next().unwrap_or_default();

    [("username", username), ("email", local_part)]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .find(|(_, value)| similarity(&password, &value.to_lowercase()) >= MAX_SIMILARITY)
        .map(|(attribute, _)| PolicyViolation::TooSimilar { attribute })
}

/// `2 * LCS / (len a + len b)`, in `0.0..=1.0`.
fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            row[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                row[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }

    #[allow(clippy::cast_precision_loss)]
    let ratio = (2 * prev[b.len()]) as f64 / total as f64;
    ratio
}
