//! Reply locale and the formatting rules that depend on it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::foundation::{Currency, Money, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "en-IN")]
    EnIn,
    #[serde(rename = "en-US")]
    EnUs,
}

impl Locale {
    /// Short date: "18 Oct" for en-IN, "Oct 18" for en-US.
    pub fn format_date(&self, date: NaiveDate) -> String {
        match self {
            Locale::EnIn => date.format("%-d %b").to_string(),
            Locale::EnUs => date.format("%b %-d").to_string(),
        }
    }
}

impl FromStr for Locale {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "en-in" => Ok(Locale::EnIn),
            "en-us" => Ok(Locale::EnUs),
            other => Err(ValidationError::invalid_format("locale", format!("unsupported locale {}", other))),
        }
    }
}

/// Renders an amount with its currency symbol.
///
/// INR uses Indian digit grouping (`₹1,00,000`) and shows paise only when
/// there are any. JPY has no minor unit. Other currencies always show two
/// decimals with thousands separators.
pub fn format_amount(amount: Money) -> String {
    let currency = amount.currency();
    let sign = if amount.minor() < 0 { "-" } else { "" };
    let per = currency.minor_per_major();
    let abs = amount.minor().unsigned_abs();
    let major = abs / per as u64;
    let minor = abs % per as u64;

    let digits = major.to_string();
    let grouped = match currency {
        Currency::Inr => group_indian(&digits),
        _ => group_thousands(&digits),
    };

    let fraction = match currency {
        Currency::Jpy => String::new(),
        Currency::Inr if minor == 0 => String::new(),
        _ => format!(".{:02}", minor),
    };

    format!("{}{}{}{}", sign, currency.symbol(), grouped, fraction)
}

fn group_thousands(digits: &str) -> String {
    let bytes = digits.as_bytes();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 && (bytes.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(*b as char);
    }
    out
}

/// Last three digits, then groups of two: 12,34,567.
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, last_three) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (front, pair) = rest.split_at(rest.len() - 2);
        groups.push(pair);
        rest = front;
    }
    if !rest.is_empty() {
        groups.push(rest);
    }
    groups.reverse();
    format!("{},{}", groups.join(","), last_three)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inr(minor: i64) -> Money {
        Money::new(minor, Currency::Inr)
    }

    #[test]
    fn inr_uses_indian_grouping() {
        assert_eq!(format_amount(inr(50_000)), "₹500");
        assert_eq!(format_amount(inr(10_000_000)), "₹1,00,000");
        assert_eq!(format_amount(inr(123_456_789_00)), "₹12,34,56,789");
        assert_eq!(format_amount(inr(120_050)), "₹1,200.50");
    }

    #[test]
    fn other_currencies_use_thousands_and_two_decimals() {
        assert_eq!(format_amount(Money::new(123_456_7, Currency::Usd)), "$12,345.67");
        assert_eq!(format_amount(Money::from_major(20, Currency::Eur)), "€20.00");
        assert_eq!(format_amount(Money::from_major(1_500, Currency::Jpy)), "¥1,500");
        assert_eq!(format_amount(Money::from_major(75, Currency::Aed)), "AED 75.00");
    }

    #[test]
    fn negative_amounts_keep_sign_in_front() {
        assert_eq!(format_amount(Money::new(-2_000, Currency::Gbp)), "-£20.00");
    }

    #[test]
    fn dates_follow_locale() {
        let date = NaiveDate::from_ymd_opt(2024, 10, 8).unwrap();
        assert_eq!(Locale::EnIn.format_date(date), "8 Oct");
        assert_eq!(Locale::EnUs.format_date(date), "Oct 8");
    }

    #[test]
    fn locale_parses_common_spellings() {
        assert_eq!("en-IN".parse::<Locale>().unwrap(), Locale::EnIn);
        assert_eq!("en_us".parse::<Locale>().unwrap(), Locale::EnUs);
        assert!("fr-FR".parse::<Locale>().is_err());
    }
}
