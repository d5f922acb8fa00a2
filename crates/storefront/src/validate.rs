//! Input validation and slug generation.
//!
//! Field formats are checked with compiled regex patterns; every check
//! returns a field-tagged [`Error::Validation`] so the API can report which
//! input was rejected.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// A compiled pattern for one input format.
#[derive(Debug)]
pub struct FieldPattern {
    /// Field the pattern validates.
    pub field: &'static str,

    /// What a valid value looks like, used in error messages.
    pub description: &'static str,

    regex: Regex,
}

impl FieldPattern {
    /// Create a new field pattern.
    ///
    /// # Panics
    ///
    /// Panics if the regex pattern is invalid.
    #[must_use]
    pub fn new(field: &'static str, description: &'static str, pattern: &str) -> Self {
        Self {
            field,
            description,
            regex: Regex::new(pattern).expect("Invalid regex pattern"),
        }
    }

    /// Check if `value` matches this pattern.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    /// Validate `value`, returning a field error on mismatch.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming [`Self::field`].
    pub fn check(&self, value: &str) -> Result<()> {
        if self.matches(value) {
            Ok(())
        } else {
            Err(Error::field(
                self.field,
                format!("{} must be {}", self.field, self.description),
            ))
        }
    }
}

struct Patterns {
    slug: FieldPattern,
    color: FieldPattern,
    email: FieldPattern,
    phone: FieldPattern,
    url: FieldPattern,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        slug: FieldPattern::new(
            "slug",
            "letters, digits, hyphens or underscores",
            r"^[-a-zA-Z0-9_]+$",
        ),
        color: FieldPattern::new("color", "a #RRGGBB colour", r"^#[0-9A-Fa-f]{6}$"),
        email: FieldPattern::new(
            "email",
            "a valid e-mail address",
            r"^[^@\s]+@[^@\s]+\.[^@\s]+$",
        ),
        phone: FieldPattern::new(
            "phone_number",
            "digits with optional +, spaces, dashes or parentheses",
            r"^\+?[0-9 ()\-]{3,20}$",
        ),
        url: FieldPattern::new(
            "official_website",
            "an http(s) URL",
            r"^https?://[^\s/$.?#].[^\s]*$",
        ),
    })
}

/// Validate a slug.
///
/// # Errors
///
/// Returns a validation error when the slug is empty or has invalid characters.
pub fn slug(value: &str) -> Result<()> {
    patterns().slug.check(value)
}

/// Validate a `#RRGGBB` colour.
///
/// # Errors
///
/// Returns a validation error on malformed colours.
pub fn color(value: &str) -> Result<()> {
    patterns().color.check(value)
}

/// Validate an e-mail address.
///
/// # Errors
///
/// Returns a validation error on malformed addresses.
pub fn email(value: &str) -> Result<()> {
    patterns().email.check(value)
}

/// Validate a phone number (at most 20 characters).
///
/// # Errors
///
/// Returns a validation error on malformed numbers.
pub fn phone(value: &str) -> Result<()> {
    patterns().phone.check(value)
}

/// Validate a website URL.
///
/// # Errors
///
/// Returns a validation error on malformed URLs.
pub fn url(value: &str) -> Result<()> {
    patterns().url.check(value)
}

/// Require a non-blank value of at most `max` characters.
///
/// # Errors
///
/// Returns a validation error for blank or over-long values.
pub fn required(field: &'static str, value: &str, max: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::field(field, format!("{field} is required")));
    }
    max_len(field, value, max)
}

/// Require at most `max` characters.
///
/// # Errors
///
/// Returns a validation error for over-long values.
pub fn max_len(field: &'static str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(Error::field(
            field,
            format!("{field} must be at most {max} characters"),
        ));
    }
    Ok(())
}

/// Require a value in `min..=max`.
///
/// # Errors
///
/// Returns a validation error when out of range.
pub fn range(field: &'static str, value: i64, min: i64, max: i64) -> Result<()> {
    if value < min || value > max {
        return Err(Error::field(
            field,
            format!("{field} must be between {min} and {max}"),
        ));
    }
    Ok(())
}

/// Turn a display name into a URL slug.
///
/// Lowercases, transliterates Cyrillic, and collapses every run of other
/// characters into a single hyphen. Returns an empty string when nothing
/// usable remains.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.chars().flat_map(char::to_lowercase) {
        let piece: Option<&str> = if ch.is_ascii_alphanumeric() {
            None
        } else {
            transliterate(ch)
        };

        if ch.is_ascii_alphanumeric() || piece.is_some_and(|p| !p.is_empty()) {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            match piece {
                Some(p) => out.push_str(p),
                None => out.push(ch),
            }
        } else if piece.is_none() {
            pending_dash = true;
        }
    }

    out
}

/// `base`, `base-2`, `base-3`, ... for the n-th attempt (1-based).
#[must_use]
pub fn slug_candidate(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        base.to_string()
    } else {
        format!("{base}-{attempt}")
    }
}

fn transliterate(ch: char) -> Option<&'static str> {
    Some(match ch {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' => "e",
        'ё' => "e",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "sch",
        'ы' => "y",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        'ъ' | 'ь' => "",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_ascii() {
        assert_eq!(slugify("Smart Phones"), "smart-phones");
        assert_eq!(slugify("  USB-C / Lightning  "), "usb-c-lightning");
        assert_eq!(slugify("A__B"), "a-b");
    }

    #[test]
    fn test_slugify_cyrillic() {
        assert_eq!(slugify("Смартфоны"), "smartfony");
        assert_eq!(slugify("Ноутбук Pro 14"), "noutbuk-pro-14");
        assert_eq!(slugify("Объектив"), "obektiv");
    }

    #[test]
    fn test_slugify_empty() {
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_slug_candidate() {
        assert_eq!(slug_candidate("phones", 1), "phones");
        assert_eq!(slug_candidate("phones", 2), "phones-2");
        assert_eq!(slug_candidate("phones", 3), "phones-3");
    }

    #[test]
    fn test_color() {
        assert!(color("#00ff7A").is_ok());
        assert!(color("00ff7a").is_err());
        assert!(color("#00ff7").is_err());
    }

    #[test]
    fn test_email() {
        assert!(email("user@example.com").is_ok());
        assert!(email("user@localhost").is_err());
        assert!(email("no at sign").is_err());
    }

    #[test]
    fn test_phone() {
        assert!(phone("+7 (900) 123-45-67").is_ok());
        assert!(phone("call me").is_err());
        assert!(phone("+123456789012345678901").is_err());
    }

    #[test]
    fn test_url() {
        assert!(url("https://acme.example").is_ok());
        assert!(url("ftp://acme.example").is_err());
    }

    #[test]
    fn test_slug() {
        assert!(slug("phones_2024-new").is_ok());
        assert!(slug("with space").is_err());
        assert!(slug("").is_err());
    }

    #[test]
    fn test_required_and_max_len() {
        assert!(required("name", "Phone", 80).is_ok());
        let err = required("name", "   ", 80).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation {
                field: Some("name"),
                ..
            }
        ));
        assert!(max_len("name", &"x".repeat(81), 80).is_err());
        assert!(max_len("name", &"я".repeat(80), 80).is_ok());
    }

    #[test]
    fn test_range() {
        assert!(range("rating", 5, 1, 5).is_ok());
        assert!(range("rating", 0, 1, 5).is_err());
        assert!(range("stock", 0, 0, i64::from(i32::MAX)).is_ok());
        assert!(range("stock", -1, 0, i64::from(i32::MAX)).is_err());
        let err = range("stock", i64::from(i32::MAX) + 1, 0, i64::from(i32::MAX)).unwrap_err();
        assert_eq!(err.to_string(), "stock must be between 0 and 2147483647");
    }
}
