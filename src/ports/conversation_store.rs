//! Conversation state store port.
//!
//! # Design
//!
//! - **One conversation per sender**: keyed by `UserId`
//! - **Optimistic versioning**: `save` succeeds only if the stored version
//!   still equals `conversation.version()`; otherwise `VersionConflict`
//! - **Turn log**: every turn is kept; `load` returns the most recent window

use async_trait::async_trait;

use crate::domain::conversation::Conversation;
use crate::domain::foundation::{DomainError, UserId};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Loads the conversation for a sender with its recent turns.
    ///
    /// Returns `None` for a sender never seen before.
    async fn load(&self, user_id: &UserId) -> Result<Option<Conversation>, DomainError>;

    /// Persists routing state and any turns not yet stored.
    ///
    /// # Errors
    ///
    /// - `VersionConflict` if another writer saved first
    /// - `DatabaseError` on persistence failure
    async fn save(&self, conversation: &Conversation) -> Result<(), DomainError>;
}
