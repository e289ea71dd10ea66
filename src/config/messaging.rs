//! Twilio WhatsApp configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

#[derive(Debug, Clone, Deserialize)]
pub struct MessagingConfig {
    /// Twilio account SID (AC...)
    pub twilio_account_sid: Option<String>,

    /// Twilio auth token, also used for media downloads
    pub twilio_auth_token: Option<Secret<String>>,

    /// Sending number, e.g. `whatsapp:+14155238886`
    pub twilio_whatsapp_number: Option<String>,

    /// Twilio REST API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl MessagingConfig {
    /// True when every credential needed to send replies is present.
    pub fn has_twilio(&self) -> bool {
        self.twilio_account_sid.as_ref().is_some_and(|s| !s.is_empty())
            && self
                .twilio_auth_token
                .as_ref()
                .is_some_and(|t| !t.expose_secret().is_empty())
            && self.twilio_whatsapp_number.is_some()
    }

    /// Validate messaging configuration.
    ///
    /// Credentials are optional outside production, where replies are only logged.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if *environment == Environment::Production && !self.has_twilio() {
            return Err(ValidationError::MissingRequired("TWILIO_ACCOUNT_SID"));
        }
        if let Some(sid) = &self.twilio_account_sid {
            if !sid.starts_with("AC") {
                return Err(ValidationError::InvalidTwilioSid);
            }
        }
        if let Some(number) = &self.twilio_whatsapp_number {
            if !number.starts_with("whatsapp:") {
                return Err(ValidationError::InvalidWhatsAppNumber);
            }
        }
        Ok(())
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_whatsapp_number: None,
            api_base: default_api_base(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.twilio.com".to_string()
}
