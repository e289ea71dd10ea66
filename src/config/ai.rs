//! OpenAI configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Configuration for the OpenAI-backed services: chat completions,
/// receipt vision and voice transcription.
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// OpenAI API key
    pub openai_api_key: Option<Secret<String>>,

    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for category detection and fallback replies
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used for receipt extraction
    #[serde(default = "default_model")]
    pub vision_model: String,

    /// Model used for voice note transcription
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Retries after the first attempt on transient failure
    #[serde(default = "default_retries")]
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl AiConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Check if OpenAI is configured
    pub fn has_openai(&self) -> bool {
        self.openai_api_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().is_empty())
    }

    /// Validate AI configuration
    ///
    /// A missing key is allowed: the assistant then runs on keyword parsing
    /// alone and media messages are answered with an extraction failure.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(key) = &self.openai_api_key {
            if !key.expose_secret().starts_with("sk-") {
                return Err(ValidationError::InvalidOpenAiKey);
            }
        }
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.max_retries > 3 {
            return Err(ValidationError::TooManyRetries);
        }
        Ok(())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            vision_model: default_model(),
            transcription_model: default_transcription_model(),
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    1
}

fn default_retry_backoff() -> u64 {
    500
}
