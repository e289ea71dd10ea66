//! Currency and amount detection in free text.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::foundation::Currency;

const NUMBER: &str = r"\d+(?:,\d{2,3})*(?:\.\d{1,2})?";

static SYMBOL_BEFORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"[₹$€£¥]\s*({NUMBER})")).expect("valid regex"));

static SYMBOL_AFTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"({NUMBER})\s*[₹$€£¥]")).expect("valid regex"));

static CODE_BEFORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:rs\.?|inr|usd|eur|gbp|aed|jpy)\s*({NUMBER})"))
        .expect("valid regex")
});

static WORD_AFTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)({NUMBER})\s*(?:rs\b\.?|rupees?\b|bucks\b|dollars?\b|euros?\b|pounds?\b|dirhams?\b|yen\b)"
    ))
    .expect("valid regex")
});

static BARE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\b({NUMBER})\b")).expect("valid regex"));

static NOT_AN_AMOUNT_AFTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:st|nd|rd|th)?\s*(?:of\s+)?(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\b|^\s*(?:people|persons|ways|friends)\b",
    )
    .expect("valid regex")
});

static MONTH_BEFORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\s*$")
        .expect("valid regex")
});

static CURRENCY_WORDS: Lazy<Vec<(Regex, Currency)>> = Lazy::new(|| {
    [
        (r"(?i)\b(?:rs\.?|inr|rupees?)(?:\b|\d)", Currency::Inr),
        (r"(?i)\b(?:usd|dollars?|bucks)\b", Currency::Usd),
        (r"(?i)\b(?:eur|euros?)\b", Currency::Eur),
        (r"(?i)\b(?:gbp|pounds?)\b", Currency::Gbp),
        (r"(?i)\b(?:jpy|yen)\b", Currency::Jpy),
        (r"(?i)\b(?:aed|dirhams?)\b", Currency::Aed),
    ]
    .into_iter()
    .map(|(pattern, currency)| (Regex::new(pattern).expect("valid regex"), currency))
    .collect()
});

/// A number found in text that reads as a money amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountMatch {
    /// The digits as written, grouping commas included.
    pub digits: String,
    /// Byte range of the whole match (symbol or currency word included).
    pub start: usize,
    pub end: usize,
}

/// Detects an explicit currency from symbols first, then currency words.
pub fn detect_currency(text: &str) -> Option<Currency> {
    for (symbol, currency) in [
        ('₹', Currency::Inr),
        ('$', Currency::Usd),
        ('€', Currency::Eur),
        ('£', Currency::Gbp),
        ('¥', Currency::Jpy),
    ] {
        if text.contains(symbol) {
            return Some(currency);
        }
    }
    CURRENCY_WORDS
        .iter()
        .find(|(re, _)| re.is_match(text))
        .map(|(_, currency)| *currency)
}

/// Finds the most plausible amount in `text`.
///
/// Numbers tied to a currency marker win; otherwise the first bare number
/// that is not a day of month or a head count.
pub fn find_amount(text: &str) -> Option<AmountMatch> {
    for re in [&*SYMBOL_BEFORE, &*SYMBOL_AFTER, &*CODE_BEFORE, &*WORD_AFTER] {
        if let Some(caps) = re.captures(text) {
            if let (Some(whole), Some(num)) = (caps.get(0), caps.get(1)) {
                return Some(AmountMatch {
                    digits: num.as_str().to_string(),
                    start: whole.start(),
                    end: whole.end(),
                });
            }
        }
    }

    BARE_NUMBER.captures_iter(text).find_map(|caps| {
        let num = caps.get(1)?;
        let after = &text[num.end()..];
        let before = &text[..num.start()];
        if NOT_AN_AMOUNT_AFTER.is_match(after) || MONTH_BEFORE.is_match(before) {
            return None;
        }
        Some(AmountMatch {
            digits: num.as_str().to_string(),
            start: num.start(),
            end: num.end(),
        })
    })
}
