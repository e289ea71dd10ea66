use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::conversation::{Conversation, Turn};
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::ConversationStore;

#[derive(Debug, Clone)]
struct Stored {
    conversation: Conversation,
    /// Full turn log, oldest first.
    log: Vec<Turn>,
}

/// Conversation store with the same version check as the Postgres one.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConversationStore {
    conversations: Arc<RwLock<HashMap<UserId, Stored>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every turn ever recorded for the sender, oldest first.
    pub async fn turn_log(&self, user_id: &UserId) -> Vec<Turn> {
        self.conversations
            .read()
            .await
            .get(user_id)
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn load(&self, user_id: &UserId) -> Result<Option<Conversation>, DomainError> {
        Ok(self
            .conversations
            .read()
            .await
            .get(user_id)
            .map(|s| s.conversation.clone()))
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), DomainError> {
        let mut conversations = self.conversations.write().await;
        let stored_version = conversations
            .get(conversation.user_id())
            .map(|s| s.conversation.version())
            .unwrap_or(0);

        if stored_version != conversation.version() {
            return Err(DomainError::new(
                ErrorCode::VersionConflict,
                "conversation was modified by another writer",
            )
            .with_detail("expected", conversation.version().to_string())
            .with_detail("actual", stored_version.to_string()));
        }

        let mut saved = conversation.clone();
        saved.mark_saved();

        let entry = conversations
            .entry(conversation.user_id().clone())
            .or_insert_with(|| Stored {
                conversation: saved.clone(),
                log: Vec::new(),
            });
        for turn in conversation.turns() {
            if !entry.log.iter().any(|t| t.id == turn.id) {
                entry.log.push(turn.clone());
            }
        }
        entry.conversation = saved;
        Ok(())
    }
}
