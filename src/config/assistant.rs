//! Assistant behaviour configuration

use chrono::FixedOffset;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::foundation::Currency;
use crate::domain::reply::Locale;

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    /// Currency assumed when a message carries no symbol or currency word
    #[serde(default = "default_currency")]
    pub default_currency: String,

    /// Locale used for date formatting in replies
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Users' offset from UTC in minutes; decides which day "today" is
    #[serde(default = "default_utc_offset")]
    pub utc_offset_minutes: i32,

    /// Number of recent turns loaded with a conversation
    #[serde(default = "default_turn_window")]
    pub recent_turn_window: usize,

    /// Seconds a per-sender worker waits for more messages before exiting
    #[serde(default = "default_worker_idle")]
    pub worker_idle_secs: u64,
}

impl AssistantConfig {
    pub fn currency(&self) -> Result<Currency, ValidationError> {
        self.default_currency
            .parse()
            .map_err(|_| ValidationError::UnsupportedCurrency(self.default_currency.clone()))
    }

    pub fn locale(&self) -> Result<Locale, ValidationError> {
        self.locale
            .parse()
            .map_err(|_| ValidationError::UnsupportedLocale(self.locale.clone()))
    }

    pub fn utc_offset(&self) -> Result<FixedOffset, ValidationError> {
        if !(-720..=840).contains(&self.utc_offset_minutes) {
            return Err(ValidationError::InvalidUtcOffset);
        }
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or(ValidationError::InvalidUtcOffset)
    }

    pub fn worker_idle(&self) -> Duration {
        Duration::from_secs(self.worker_idle_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.currency()?;
        self.locale()?;
        self.utc_offset()?;
        if self.recent_turn_window == 0 || self.recent_turn_window > 100 {
            return Err(ValidationError::InvalidTurnWindow);
        }
        if self.worker_idle_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            default_currency: default_currency(),
            locale: default_locale(),
            utc_offset_minutes: default_utc_offset(),
            recent_turn_window: default_turn_window(),
            worker_idle_secs: default_worker_idle(),
        }
    }
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_locale() -> String {
    "en-IN".to_string()
}

fn default_utc_offset() -> i32 {
    330
}

fn default_turn_window() -> usize {
    10
}

fn default_worker_idle() -> u64 {
    60
}
