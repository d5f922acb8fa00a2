//! Monetary amounts.
//!
//! Amounts are kept as integer minor units (hundredths) so that sums and
//! products are exact. JSON carries them as decimal strings with two
//! fractional digits; input also accepts plain JSON numbers.
//!
//! Every amount stays within ten digits, `±99999999.99`. Arithmetic is
//! checked against that bound and reports a validation error instead of
//! overflowing.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// An amount of money in minor units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Largest representable amount, `99999999.99`.
    pub const MAX: Self = Self(9_999_999_999);

    /// Create an amount from minor units.
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Create an amount from whole major units.
    #[must_use]
    pub const fn from_major(major: i64) -> Self {
        Self(major * 100)
    }

    /// The amount in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Whether the amount is below zero.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// `self * quantity`, or a validation error past [`Money::MAX`].
    ///
    /// # Errors
    ///
    /// Returns a validation error on `quantity` when the product is out of
    /// range.
    pub fn checked_mul(self, quantity: u32) -> crate::Result<Self> {
        self.0
            .checked_mul(i64::from(quantity))
            .and_then(Self::bounded)
            .ok_or_else(|| Error::field("quantity", format!("amount exceeds {}", Self::MAX)))
    }

    /// `self + other`, or a validation error past [`Money::MAX`].
    ///
    /// # Errors
    ///
    /// Returns a validation error when the sum is out of range.
    pub fn checked_add(self, other: Self) -> crate::Result<Self> {
        self.0
            .checked_add(other.0)
            .and_then(Self::bounded)
            .ok_or_else(|| Error::validation(format!("amount exceeds {}", Self::MAX)))
    }

    /// Sum of `amounts`, checked like [`Money::checked_add`].
    ///
    /// # Errors
    ///
    /// Returns a validation error when the sum is out of range.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Self>) -> crate::Result<Self> {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, Self::checked_add)
    }

    fn bounded(minor: i64) -> Option<Self> {
        (minor.abs() <= Self::MAX.0).then_some(Self(minor))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&storefront_invoice::format_minor_units(self.0))
    }
}

impl FromStr for Money {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::field("price", format!("invalid amount: {s:?}"));
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty()
            || frac.len() > 2
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let frac: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };

        let minor = whole
            .checked_mul(100)
            .and_then(|v| v.checked_add(frac))
            .and_then(Self::bounded)
            .ok_or_else(|| Error::field("price", format!("amount exceeds {}", Self::MAX)))?;
        Ok(Self(if negative { -minor.0 } else { minor.0 }))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

struct MoneyVisitor;

impl Visitor<'_> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal amount with at most two fractional digits")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        v.checked_mul(100)
            .and_then(Money::bounded)
            .ok_or_else(|| E::custom("amount out of range"))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        i64::try_from(v)
            .map_err(|_| E::custom("amount out of range"))
            .and_then(|v| self.visit_i64(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        format!("{v:.2}").parse().map_err(E::custom)
    }
}
