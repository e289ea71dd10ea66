//! PostgreSQL implementation of ProcessedMessageStore.
//!
//! The primary key on `message_id` makes the claim atomic: of two
//! concurrent claims only one inserts a row.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::foundation::{DomainError, ProviderMessageId, Timestamp, UserId};
use crate::ports::{ProcessedMessageStore, SaveResult};

#[derive(Clone)]
pub struct PostgresProcessedMessageStore {
    pool: PgPool,
}

impl PostgresProcessedMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProcessedMessageStore for PostgresProcessedMessageStore {
    async fn claim(&self, message_id: &ProviderMessageId, sender: &UserId) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_messages (message_id, sender, processed_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (message_id) DO NOTHING
            "#,
        )
        .bind(message_id.as_str())
        .bind(sender.as_str())
        .bind(Timestamp::now().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to claim message: {}", e)))?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyExists)
        } else {
            Ok(SaveResult::Inserted)
        }
    }

    async fn is_processed(&self, message_id: &ProviderMessageId) -> Result<bool, DomainError> {
        let processed: bool = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM processed_messages WHERE message_id = $1) AS processed",
        )
        .bind(message_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to check message: {}", e)))?
        .get("processed");

        Ok(processed)
    }
}
