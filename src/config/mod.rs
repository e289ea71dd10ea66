//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `THUK` prefix and
//! nested values are separated by a double underscore.
//!
//! # Example
//!
//! ```no_run
//! use thuk::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod ai;
mod assistant;
mod database;
mod error;
mod messaging;
mod server;

pub use ai::AiConfig;
pub use assistant::AssistantConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use messaging::MessagingConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, logging)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// OpenAI configuration (completions, vision, transcription)
    #[serde(default)]
    pub ai: AiConfig,

    /// Twilio WhatsApp configuration
    #[serde(default)]
    pub messaging: MessagingConfig,

    /// Assistant behaviour (default currency, locale, queue tuning)
    #[serde(default)]
    pub assistant: AssistantConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with the `THUK` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// - `THUK__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `THUK__DATABASE__URL=...` -> `database.url = ...`
    /// - `THUK__AI__OPENAI_API_KEY=sk-...` -> `ai.openai_api_key = ...`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("THUK")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.ai.validate()?;
        self.messaging.validate(&self.server.environment)?;
        self.assistant.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
