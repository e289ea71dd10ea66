//! HTTP DTOs for the webhook endpoints.
//!
//! The Twilio form is decoded here and turned into an [`InboundMessage`];
//! nothing past this module sees provider field names.

use serde::{Deserialize, Serialize};

use crate::application::{InboundMessage, MediaRef};
use crate::domain::foundation::{ProviderMessageId, UserId, ValidationError};

/// Acknowledgement body for Twilio. Replies are sent separately.
pub const EMPTY_TWIML: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response></Response>"#;

// ════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Fields Twilio posts for an inbound WhatsApp message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TwilioWebhookForm {
    #[serde(rename = "MessageSid", default)]
    pub message_sid: Option<String>,
    #[serde(rename = "From", default)]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "NumMedia", default)]
    pub num_media: Option<String>,
    #[serde(rename = "MediaUrl0", default)]
    pub media_url: Option<String>,
    #[serde(rename = "MediaContentType0", default)]
    pub media_content_type: Option<String>,
}

impl TwilioWebhookForm {
    fn media_count(&self) -> u32 {
        self.num_media
            .as_deref()
            .and_then(|n| n.trim().parse().ok())
            .unwrap_or(0)
    }

    fn media(&self) -> Option<MediaRef> {
        if self.media_count() == 0 {
            return None;
        }
        let url = self.media_url.clone().filter(|u| !u.trim().is_empty())?;
        Some(MediaRef {
            url,
            content_type: self.media_content_type.clone().unwrap_or_default(),
        })
    }

    /// Builds the inbound message. Only the first attachment is used.
    ///
    /// A missing `MessageSid` gets a locally generated id, which disables
    /// replay detection for that message.
    pub fn into_inbound(self) -> Result<InboundMessage, ValidationError> {
        let sender = UserId::new(self.from.as_str())?;
        let id = match self.message_sid.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(sid) => ProviderMessageId::new(sid)?,
            None => ProviderMessageId::generate(),
        };

        Ok(match self.media() {
            Some(media) => InboundMessage::with_media(id, sender, self.body, media),
            None => InboundMessage::text(id, sender, self.body),
        })
    }
}

/// Form accepted by `POST /api/test/message`.
#[derive(Debug, Clone, Deserialize)]
pub struct TestMessageForm {
    pub phone_number: String,
    pub message: String,
}

impl TestMessageForm {
    pub fn into_inbound(self) -> Result<InboundMessage, ValidationError> {
        let sender = UserId::new(self.phone_number)?;
        Ok(InboundMessage::text(ProviderMessageId::generate(), sender, self.message))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestMessageResponse {
    pub status: String,
    pub input: String,
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

/// Standard error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
        }
    }
}
