//! Turns - one inbound message and the reply it produced.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{ProviderMessageId, Timestamp, TurnId, ValidationError};
use crate::domain::routing::HandlerKind;

/// Raw input kind of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Audio,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Audio => "audio",
        }
    }

    /// Classifies a media content type (`image/jpeg`, `audio/ogg`).
    pub fn from_content_type(content_type: &str) -> Self {
        let ct = content_type.trim().to_ascii_lowercase();
        if ct.starts_with("image/") {
            MessageKind::Image
        } else if ct.starts_with("audio/") {
            MessageKind::Audio
        } else {
            MessageKind::Text
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageKind::Text),
            "image" => Ok(MessageKind::Image),
            "audio" => Ok(MessageKind::Audio),
            other => Err(ValidationError::invalid_format("kind", format!("unknown kind {}", other))),
        }
    }
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// A handler ran and its mutation (if any) was applied.
    Handled,
    /// The user was asked a question; routing waits for the answer.
    ClarificationRequested,
    /// Help text was sent.
    HelpShown,
    /// The user cancelled a pending question.
    Dismissed,
    /// Media could not be turned into text. No handler ran.
    ExtractionFailed,
    /// A handler rejected the input as incomplete or invalid.
    Rejected,
    /// A downstream service or the store failed; nothing was applied.
    Failed,
}

impl TurnOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnOutcome::Handled => "handled",
            TurnOutcome::ClarificationRequested => "clarification_requested",
            TurnOutcome::HelpShown => "help_shown",
            TurnOutcome::Dismissed => "dismissed",
            TurnOutcome::ExtractionFailed => "extraction_failed",
            TurnOutcome::Rejected => "rejected",
            TurnOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for TurnOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TurnOutcome {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            TurnOutcome::Handled,
            TurnOutcome::ClarificationRequested,
            TurnOutcome::HelpShown,
            TurnOutcome::Dismissed,
            TurnOutcome::ExtractionFailed,
            TurnOutcome::Rejected,
            TurnOutcome::Failed,
        ]
        .into_iter()
        .find(|o| o.as_str() == s)
        .ok_or_else(|| ValidationError::invalid_format("outcome", format!("unknown outcome {}", s)))
    }
}

/// One inbound/outbound exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub id: TurnId,
    pub provider_message_id: ProviderMessageId,
    pub kind: MessageKind,
    /// Normalized text. Empty when extraction failed.
    pub text: String,
    pub handler: Option<HandlerKind>,
    pub outcome: TurnOutcome,
    pub reply: String,
    pub at: Timestamp,
}

impl Turn {
    pub fn new(
        provider_message_id: ProviderMessageId,
        kind: MessageKind,
        text: impl Into<String>,
        handler: Option<HandlerKind>,
        outcome: TurnOutcome,
        reply: impl Into<String>,
    ) -> Self {
        Self {
            id: TurnId::new(),
            provider_message_id,
            kind,
            text: text.into(),
            handler,
            outcome,
            reply: reply.into(),
            at: Timestamp::now(),
        }
    }
}
