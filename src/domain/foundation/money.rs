//! Money and currency value objects.
//!
//! Amounts are held as integer minor units (paise, cents) so that split
//! shares can be summed exactly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Currencies the assistant can recognise in free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Inr,
    Usd,
    Eur,
    Gbp,
    Jpy,
    Aed,
}

impl Currency {
    pub const ALL: [Currency; 6] = [
        Currency::Inr,
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Jpy,
        Currency::Aed,
    ];

    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Inr => "INR",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
            Currency::Aed => "AED",
        }
    }

    /// Prefix used when rendering amounts.
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Inr => "₹",
            Currency::Usd => "$",
            Currency::Eur => "€",
            Currency::Gbp => "£",
            Currency::Jpy => "¥",
            Currency::Aed => "AED ",
        }
    }

    /// Number of minor-unit digits.
    pub fn exponent(&self) -> u32 {
        match self {
            Currency::Jpy => 0,
            _ => 2,
        }
    }

    /// Minor units per major unit.
    pub fn minor_per_major(&self) -> i64 {
        10_i64.pow(self.exponent())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Currency::ALL
            .into_iter()
            .find(|c| c.code() == code)
            .ok_or_else(|| ValidationError::invalid_format("currency", format!("unknown code {}", s)))
    }
}

/// An amount of money in a single currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    minor: i64,
    currency: Currency,
}

impl Money {
    pub fn new(minor: i64, currency: Currency) -> Self {
        Self { minor, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    /// Whole major units, e.g. `from_major(500, Inr)` is ₹500.00.
    pub fn from_major(major: i64, currency: Currency) -> Self {
        Self::new(major * currency.minor_per_major(), currency)
    }

    /// Parses a decimal amount such as `1,200.50` into minor units.
    ///
    /// Grouping commas are ignored. Fraction digits beyond the currency's
    /// exponent are rejected rather than rounded.
    pub fn parse_decimal(text: &str, currency: Currency) -> Result<Self, ValidationError> {
        let cleaned: String = text.chars().filter(|c| *c != ',').collect();
        let (whole, fraction) = match cleaned.split_once('.') {
            Some((w, f)) => (w, f),
            None => (cleaned.as_str(), ""),
        };
        if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::invalid_format("amount", format!("'{}' is not a number", text)));
        }
        if !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::invalid_format("amount", format!("'{}' is not a number", text)));
        }
        let exponent = currency.exponent() as usize;
        let significant = fraction.trim_end_matches('0');
        if significant.len() > exponent {
            return Err(ValidationError::invalid_format(
                "amount",
                format!("{} allows {} decimal places", currency, exponent),
            ));
        }

        let whole: i64 = whole
            .parse()
            .map_err(|_| ValidationError::invalid_format("amount", "amount too large"))?;
        let mut padded = significant.to_string();
        while padded.len() < exponent {
            padded.push('0');
        }
        let fraction: i64 = if padded.is_empty() {
            0
        } else {
            padded
                .parse()
                .map_err(|_| ValidationError::invalid_format("amount", "bad fraction"))?
        };

        whole
            .checked_mul(currency.minor_per_major())
            .and_then(|m| m.checked_add(fraction))
            .map(|minor| Self::new(minor, currency))
            .ok_or_else(|| ValidationError::invalid_format("amount", "amount too large"))
    }

    pub fn minor(&self) -> i64 {
        self.minor
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_positive(&self) -> bool {
        self.minor > 0
    }

    /// Whole major units and the remaining minor units.
    pub fn major_parts(&self) -> (i64, i64) {
        let per = self.currency.minor_per_major();
        (self.minor / per, self.minor % per)
    }

    /// Adds two amounts of the same currency.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        if self.currency != other.currency {
            return None;
        }
        self.minor
            .checked_add(other.minor)
            .map(|minor| Money::new(minor, self.currency))
    }

    pub fn checked_sub(&self, other: Money) -> Option<Money> {
        if self.currency != other.currency {
            return None;
        }
        self.minor
            .checked_sub(other.minor)
            .map(|minor| Money::new(minor, self.currency))
    }
}
