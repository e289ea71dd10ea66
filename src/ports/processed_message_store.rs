//! ProcessedMessageStore port - idempotency for inbound provider messages.
//!
//! Twilio retries a webhook when our acknowledgement is slow or lost, so the
//! same `MessageSid` can arrive more than once. The pipeline claims each id
//! before doing any work and drops messages it has already claimed.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ProviderMessageId, UserId};

/// Result of attempting to record something keyed by a unique id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// First time this key was seen.
    Inserted,
    /// The key was already present.
    AlreadyExists,
}

/// Implementations should use a primary key on the message id so that two
/// concurrent claims cannot both see `Inserted`.
#[async_trait]
pub trait ProcessedMessageStore: Send + Sync {
    /// Claims a provider message id for processing.
    async fn claim(&self, message_id: &ProviderMessageId, sender: &UserId) -> Result<SaveResult, DomainError>;

    /// Checks whether a message id has been claimed.
    async fn is_processed(&self, message_id: &ProviderMessageId) -> Result<bool, DomainError>;
}
