//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid bind address")]
    InvalidAddress,

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Invalid OpenAI API key format")]
    InvalidOpenAiKey,

    #[error("Retry count exceeds maximum allowed (3)")]
    TooManyRetries,

    #[error("Invalid Twilio account SID format")]
    InvalidTwilioSid,

    #[error("Twilio sender must use the whatsapp: scheme")]
    InvalidWhatsAppNumber,

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Unsupported locale: {0}")]
    UnsupportedLocale(String),

    #[error("Recent turn window must be between 1 and 100")]
    InvalidTurnWindow,

    #[error("UTC offset must be between -720 and +840 minutes")]
    InvalidUtcOffset,
}
