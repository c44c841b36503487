//! Amount type for handling monetary values written by hand in a config file or a sheet.
//!
//! This module provides the `Amount` type which wraps `Decimal` and handles parsing values that
//! may or may not include a euro sign, thousands separators, or a French decimal comma.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// Represents how euro amounts were (or should be) formatted.
///
/// # Examples
///  - `AmountFormat{ euro: true, grouping: true }` -> `-60 000.00 €`
///  - `AmountFormat{ euro: false, grouping: true }` -> `-60 000.00`
///  - `AmountFormat{ euro: false, grouping: false }` -> `-60000.00`
///  - `AmountFormat{ euro: true, grouping: false }` -> `-60000.00 €`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AmountFormat {
    /// Whether a euro sign is present in the formatting.
    euro: bool,
    /// Whether spaces are present as thousands separators in the formatting.
    grouping: bool,
}

/// The plain format, `-60000.00`, is what gets injected into the dashboard.
const PLAIN_FORMAT: AmountFormat = AmountFormat {
    euro: false,
    grouping: false,
};

/// The format used for messages shown to a person, `-60 000.00 €`.
const DISPLAY_FORMAT: AmountFormat = AmountFormat {
    euro: true,
    grouping: true,
};

/// Represents a euro amount, always rendered with two decimals.
///
/// Formatting is considered significant for the purposes of equality, so for numeric comparisons,
/// you should access the `Decimal` value and use that.
///
/// # Examples
///
/// ```
/// # use suivi_dashboard::model::Amount;
/// # use std::str::FromStr;
/// let a = Amount::from_str("1 234,5 €").unwrap();
/// assert_eq!(a.to_string(), "1 234.50 €");
/// let b = Amount::from_str("1234.5").unwrap();
/// assert_eq!(b.to_string(), "1234.50");
/// assert_eq!(a.value(), b.value());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount {
    /// The parsed numerical value.
    value: Decimal,
    /// The way the numerical value was parsed from, or should be written to, a `String`.
    format: AmountFormat,
}

impl Amount {
    /// Creates a new Amount in the plain format.
    pub const fn new(value: Decimal) -> Self {
        Self {
            value,
            format: PLAIN_FORMAT,
        }
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.value().is_zero()
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.value().is_sign_negative()
    }

    /// The same value, formatted for a person to read (`1 234.50 €`).
    pub fn for_display(&self) -> Self {
        Self {
            value: self.value,
            format: DISPLAY_FORMAT,
        }
    }

    /// The same value in the plain format (`1234.50`).
    pub fn plain(&self) -> Self {
        Self::new(self.value)
    }
}

/// An error that can occur when parsing strings into `Decimal` values.
pub struct AmountError(rust_decimal::Error);

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

fn is_group_space(c: char) -> bool {
    c == ' ' || c == '\u{a0}' || c == '\u{202f}'
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Amount::default());
        }

        // The euro sign may lead or trail, and "EUR" is common in exports.
        let mut euro = false;
        let mut body = trimmed;
        for marker in ["€", "EUR"] {
            if let Some(rest) = body.strip_suffix(marker) {
                euro = true;
                body = rest.trim_end();
            }
            if let Some(rest) = body.strip_prefix(marker) {
                euro = true;
                body = rest.trim_start();
            }
        }
        // "-€50" is written as often as "€-50".
        let (negative, body) = match body.strip_prefix('-') {
            Some(rest) => match rest.strip_prefix('€') {
                Some(after) => {
                    euro = true;
                    (true, after)
                }
                None => (true, rest),
            },
            None => (false, body),
        };

        let without_spaces: String = body.chars().filter(|&c| !is_group_space(c)).collect();
        let mut grouping = without_spaces.len() < body.len();

        // With both separators present the comma groups thousands (1,234.50); a lone comma is a
        // French decimal separator (1234,50).
        let normalized = if without_spaces.contains('.') && without_spaces.contains(',') {
            grouping = true;
            without_spaces.replace(',', "")
        } else {
            without_spaces.replace(',', ".")
        };

        let value = Decimal::from_str(&normalized).map_err(AmountError)?;
        let value = if negative { -value } else { value };
        Ok(Amount {
            value,
            format: AmountFormat { euro, grouping },
        })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sign, num) = if self.is_negative() {
            ("-", self.value().abs())
        } else {
            ("", self.value().abs())
        };
        let num = num.round_dp(2);

        let digits = if self.format.grouping {
            format_num::format_num!(",.2", num.to_f64().unwrap_or_default()).replace(',', " ")
        } else {
            format!("{num:.2}")
        };

        if self.format.euro {
            write!(f, "{sign}{digits} €")
        } else {
            write!(f, "{sign}{digits}")
        }
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Prices are usually written as strings in `config.json`, but plain JSON numbers are accepted.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Text(String),
    Number(f64),
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawAmount::deserialize(deserializer)? {
            RawAmount::Text(s) => Amount::from_str(&s).map_err(serde::de::Error::custom),
            RawAmount::Number(n) => Decimal::try_from(n)
                .map(Amount::new)
                .map_err(serde::de::Error::custom),
        }
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}
