use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ProviderMessageId, Timestamp, UserId};
use crate::ports::{ProcessedMessageStore, SaveResult};

#[derive(Debug, Clone, Default)]
pub struct InMemoryProcessedMessageStore {
    claimed: Arc<RwLock<HashMap<ProviderMessageId, (UserId, Timestamp)>>>,
}

impl InMemoryProcessedMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn claimed_count(&self) -> usize {
        self.claimed.read().await.len()
    }
}

#[async_trait]
impl ProcessedMessageStore for InMemoryProcessedMessageStore {
    async fn claim(&self, message_id: &ProviderMessageId, sender: &UserId) -> Result<SaveResult, DomainError> {
        let mut claimed = self.claimed.write().await;
        if claimed.contains_key(message_id) {
            return Ok(SaveResult::AlreadyExists);
        }
        claimed.insert(message_id.clone(), (sender.clone(), Timestamp::now()));
        Ok(SaveResult::Inserted)
    }

    async fn is_processed(&self, message_id: &ProviderMessageId) -> Result<bool, DomainError> {
        Ok(self.claimed.read().await.contains_key(message_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_claim_reports_existing() {
        let store = InMemoryProcessedMessageStore::new();
        let id = ProviderMessageId::new("SM1").unwrap();
        let sender = UserId::new("+1").unwrap();

        assert_eq!(store.claim(&id, &sender).await.unwrap(), SaveResult::Inserted);
        assert_eq!(store.claim(&id, &sender).await.unwrap(), SaveResult::AlreadyExists);
        assert!(store.is_processed(&id).await.unwrap());
        assert_eq!(store.claimed_count().await, 1);
    }
}
