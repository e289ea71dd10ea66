//! PostgreSQL implementation of ConversationStore.
//!
//! Routing state is stored as JSONB next to an optimistic `version`; turns
//! go to their own table and are only ever appended.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::domain::conversation::{Conversation, RoutingState, Turn, RECENT_TURN_WINDOW};
use crate::domain::foundation::{
    ConversationId, DomainError, ErrorCode, ProviderMessageId, Timestamp, TurnId, UserId,
};
use crate::ports::ConversationStore;

/// PostgreSQL implementation of ConversationStore.
#[derive(Clone)]
pub struct PostgresConversationStore {
    pool: PgPool,
    turn_window: usize,
}

impl PostgresConversationStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            turn_window: RECENT_TURN_WINDOW,
        }
    }

    /// Number of recent turns loaded with each conversation.
    pub fn with_turn_window(mut self, window: usize) -> Self {
        self.turn_window = window.max(1);
        self
    }
}

fn version_conflict(conversation: &Conversation) -> DomainError {
    DomainError::new(
        ErrorCode::VersionConflict,
        "conversation was modified by another writer",
    )
    .with_detail("expected", conversation.version().to_string())
}

#[async_trait]
impl ConversationStore for PostgresConversationStore {
    async fn load(&self, user_id: &UserId) -> Result<Option<Conversation>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, routing, version, created_at, updated_at
            FROM conversations
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch conversation: {}", e)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: uuid::Uuid = row.get("id");
        let routing: serde_json::Value = row.get("routing");
        let routing: RoutingState = serde_json::from_value(routing)
            .map_err(|e| DomainError::database(format!("Invalid routing state: {}", e)))?;
        let version: i64 = row.get("version");
        let created_at: chrono::DateTime<chrono::Utc> = row.get("created_at");
        let updated_at: chrono::DateTime<chrono::Utc> = row.get("updated_at");

        let turn_rows = sqlx::query(
            r#"
            SELECT id, provider_message_id, kind, text, handler, outcome, reply, created_at
            FROM turns
            WHERE conversation_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(id)
        .bind(self.turn_window as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch turns: {}", e)))?;

        let mut turns = turn_rows
            .iter()
            .map(turn_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        turns.reverse();

        let conversation = Conversation::reconstitute(
            ConversationId::from_uuid(id),
            user_id.clone(),
            routing,
            turns,
            version,
            Timestamp::from_datetime(created_at),
            Timestamp::from_datetime(updated_at),
        )
        .with_turn_window(self.turn_window);

        Ok(Some(conversation))
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), DomainError> {
        let routing = serde_json::to_value(conversation.routing())
            .map_err(|e| DomainError::database(format!("Failed to encode routing state: {}", e)))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database(format!("Failed to start transaction: {}", e)))?;

        let result = if conversation.is_new() {
            sqlx::query(
                r#"
                INSERT INTO conversations (id, user_id, routing, version, created_at, updated_at)
                VALUES ($1, $2, $3, 1, $4, $5)
                ON CONFLICT (user_id) DO NOTHING
                "#,
            )
            .bind(conversation.id().as_uuid())
            .bind(conversation.user_id().as_str())
            .bind(&routing)
            .bind(conversation.created_at().as_datetime())
            .bind(conversation.updated_at().as_datetime())
            .execute(&mut *tx)
            .await
        } else {
            sqlx::query(
                r#"
                UPDATE conversations SET
                    routing = $2,
                    version = version + 1,
                    updated_at = $3
                WHERE id = $1 AND version = $4
                "#,
            )
            .bind(conversation.id().as_uuid())
            .bind(&routing)
            .bind(conversation.updated_at().as_datetime())
            .bind(conversation.version())
            .execute(&mut *tx)
            .await
        }
        .map_err(|e| DomainError::database(format!("Failed to save conversation: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(version_conflict(conversation));
        }

        for turn in conversation.turns() {
            sqlx::query(
                r#"
                INSERT INTO turns (
                    id, conversation_id, provider_message_id, kind, text,
                    handler, outcome, reply, created_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(turn.id.as_uuid())
            .bind(conversation.id().as_uuid())
            .bind(turn.provider_message_id.as_str())
            .bind(turn.kind.as_str())
            .bind(&turn.text)
            .bind(turn.handler.map(|h| h.as_str()))
            .bind(turn.outcome.as_str())
            .bind(&turn.reply)
            .bind(turn.at.as_datetime())
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::database(format!("Failed to insert turn: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::database(format!("Failed to commit transaction: {}", e)))?;

        Ok(())
    }
}

fn turn_from_row(row: &PgRow) -> Result<Turn, DomainError> {
    let id: uuid::Uuid = row.get("id");
    let provider_message_id: String = row.get("provider_message_id");
    let kind: &str = row.get("kind");
    let text: String = row.get("text");
    let handler: Option<&str> = row.get("handler");
    let outcome: &str = row.get("outcome");
    let reply: String = row.get("reply");
    let created_at: chrono::DateTime<chrono::Utc> = row.get("created_at");

    let invalid = |e: crate::domain::foundation::ValidationError| {
        DomainError::database(format!("Invalid turn row: {}", e))
    };

    Ok(Turn {
        id: TurnId::from_uuid(id),
        provider_message_id: ProviderMessageId::new(provider_message_id).map_err(invalid)?,
        kind: kind.parse().map_err(invalid)?,
        text,
        handler: handler.map(str::parse).transpose().map_err(invalid)?,
        outcome: outcome.parse().map_err(invalid)?,
        reply,
        at: Timestamp::from_datetime(created_at),
    })
}
