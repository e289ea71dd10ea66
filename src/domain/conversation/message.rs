//! Normalized inbound message.

use chrono::{FixedOffset, NaiveDate, Offset, Utc};

use super::turn::MessageKind;
use crate::domain::foundation::{ProviderMessageId, Timestamp, UserId};

/// An inbound message after media has been turned into text.
///
/// Everything downstream of the normalizer sees only this shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMessage {
    pub provider_message_id: ProviderMessageId,
    pub sender: UserId,
    /// Original kind, kept for the expense source and the turn log.
    pub kind: MessageKind,
    pub text: String,
    pub received_at: Timestamp,
    /// Calendar day of `received_at` where the user is; anchors "today".
    pub local_date: NaiveDate,
}

impl NormalizedMessage {
    pub fn text(
        provider_message_id: ProviderMessageId,
        sender: UserId,
        text: impl Into<String>,
        received_at: Timestamp,
    ) -> Self {
        Self {
            provider_message_id,
            sender,
            kind: MessageKind::Text,
            text: text.into(),
            received_at,
            local_date: received_at.date_at(Utc.fix()),
        }
    }

    /// Re-dates the message for a user at `offset` from UTC.
    pub fn at_offset(mut self, offset: FixedOffset) -> Self {
        self.local_date = self.received_at.date_at(offset);
        self
    }
}
