//! Outbound messaging port.

use async_trait::async_trait;

use super::ExternalServiceError;
use crate::domain::foundation::UserId;

#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Delivers a reply to the sender's chat.
    async fn send(&self, to: &UserId, body: &str) -> Result<(), ExternalServiceError>;
}
