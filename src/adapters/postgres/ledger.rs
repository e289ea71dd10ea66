//! PostgreSQL expense ledger: expense records and the debts created by splits.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::domain::expense::{Debt, ExpenseRecord, SplitInfo, SplitPlan};
use crate::domain::foundation::{
    Currency, DebtId, DomainError, ErrorCode, ExpenseId, Money, ProviderMessageId, Timestamp,
    UserId, ValidationError,
};
use crate::ports::{CreateOutcome, DebtRepository, ExpenseQuery, ExpenseRepository};

const EXPENSE_COLUMNS: &str = r#"
    id, owner, amount_minor, currency, category, description, source, expense_date,
    created_at, source_message_id, split_head_count, split_participants, owner_share_minor
"#;

/// Implements both [`ExpenseRepository`] and [`DebtRepository`] over one pool.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, DomainError> {
        self.pool
            .begin()
            .await
            .map_err(|e| DomainError::database(format!("Failed to start transaction: {}", e)))
    }

    /// Inserts the record unless the dedupe key exists. Returns false on a
    /// duplicate.
    async fn insert_record(
        tx: &mut Transaction<'_, Postgres>,
        record: &ExpenseRecord,
    ) -> Result<bool, DomainError> {
        let participants = record
            .split
            .as_ref()
            .map(|s| serde_json::to_value(&s.participants))
            .transpose()
            .map_err(|e| DomainError::database(format!("Failed to encode participants: {}", e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO expenses (
                id, owner, amount_minor, currency, category, description, source,
                expense_date, created_at, source_message_id,
                split_head_count, split_participants, owner_share_minor
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (owner, source_message_id) DO NOTHING
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.owner.as_str())
        .bind(record.amount.minor())
        .bind(record.amount.currency().code())
        .bind(&record.category)
        .bind(&record.description)
        .bind(record.source.as_str())
        .bind(record.expense_date)
        .bind(record.created_at.as_datetime())
        .bind(record.source_message_id.as_str())
        .bind(record.split.as_ref().map(|s| s.head_count as i32))
        .bind(participants)
        .bind(record.split.as_ref().map(|s| s.owner_share.minor()))
        .execute(&mut **tx)
        .await
        .map_err(|e| DomainError::database(format!("Failed to insert expense: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }

    async fn existing_or_conflict(
        &self,
        record: &ExpenseRecord,
    ) -> Result<CreateOutcome, DomainError> {
        self.find_by_source(&record.owner, &record.source_message_id)
            .await?
            .map(CreateOutcome::Duplicate)
            .ok_or_else(|| DomainError::database("Expense insert conflicted but no row was found"))
    }
}

#[async_trait]
impl ExpenseRepository for PostgresLedger {
    async fn create(&self, record: &ExpenseRecord) -> Result<CreateOutcome, DomainError> {
        let mut tx = self.begin().await?;
        let inserted = Self::insert_record(&mut tx, record).await?;
        tx.commit()
            .await
            .map_err(|e| DomainError::database(format!("Failed to commit transaction: {}", e)))?;

        if inserted {
            Ok(CreateOutcome::Created(record.clone()))
        } else {
            self.existing_or_conflict(record).await
        }
    }

    async fn find_by_source(
        &self,
        owner: &UserId,
        source_message_id: &ProviderMessageId,
    ) -> Result<Option<ExpenseRecord>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM expenses WHERE owner = $1 AND source_message_id = $2",
            EXPENSE_COLUMNS
        ))
        .bind(owner.as_str())
        .bind(source_message_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch expense: {}", e)))?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn delete_last(&self, owner: &UserId) -> Result<Option<(ExpenseRecord, usize)>, DomainError> {
        let mut tx = self.begin().await?;

        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM expenses
            WHERE owner = $1
            ORDER BY created_at DESC
            LIMIT 1
            FOR UPDATE
            "#,
            EXPENSE_COLUMNS
        ))
        .bind(owner.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch last expense: {}", e)))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let record = record_from_row(&row)?;

        let debts = sqlx::query("DELETE FROM debts WHERE expense_id = $1")
            .bind(record.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::database(format!("Failed to delete debts: {}", e)))?;

        sqlx::query("DELETE FROM expenses WHERE id = $1")
            .bind(record.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::database(format!("Failed to delete expense: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::database(format!("Failed to commit transaction: {}", e)))?;

        Ok(Some((record, debts.rows_affected() as usize)))
    }

    async fn list(&self, owner: &UserId, query: &ExpenseQuery) -> Result<Vec<ExpenseRecord>, DomainError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM expenses
            WHERE owner = $1
              AND expense_date BETWEEN $2 AND $3
              AND ($4::TEXT IS NULL OR currency = $4)
              AND ($5::TEXT IS NULL OR LOWER(COALESCE(category, 'Other')) = LOWER($5))
            ORDER BY expense_date DESC, created_at DESC
            LIMIT $6
            "#,
            EXPENSE_COLUMNS
        ))
        .bind(owner.as_str())
        .bind(query.start)
        .bind(query.end)
        .bind(query.currency.map(|c| c.code()))
        .bind(&query.category)
        .bind(query.limit.map(|l| l as i64))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to list expenses: {}", e)))?;

        rows.iter().map(record_from_row).collect()
    }
}

#[async_trait]
impl DebtRepository for PostgresLedger {
    async fn commit_split(&self, record: &ExpenseRecord, plan: &SplitPlan) -> Result<CreateOutcome, DomainError> {
        let mut tx = self.begin().await?;

        // Dropping `tx` on any early return rolls everything back.
        plan.verify()?;
        if plan.total() != record.amount {
            return Err(DomainError::new(
                ErrorCode::SplitMismatch,
                "split total differs from the expense amount",
            ));
        }

        if !Self::insert_record(&mut tx, record).await? {
            drop(tx);
            return self.existing_or_conflict(record).await;
        }

        let debts = plan.debts_for(record);
        for debt in &debts {
            sqlx::query(
                r#"
                INSERT INTO debts (
                    id, owner, person, amount_minor, currency, direction,
                    settled, expense_id, created_at, settled_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(debt.id.as_uuid())
            .bind(debt.owner.as_str())
            .bind(&debt.person)
            .bind(debt.amount.minor())
            .bind(debt.amount.currency().code())
            .bind(debt.direction.as_str())
            .bind(debt.settled)
            .bind(debt.expense_id.map(|id| *id.as_uuid()))
            .bind(debt.created_at.as_datetime())
            .bind(debt.settled_at.map(|t| *t.as_datetime()))
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::database(format!("Failed to insert debt: {}", e)))?;
        }

        // Re-read what was written before committing.
        let written: i64 = sqlx::query(
            "SELECT COALESCE(SUM(amount_minor), 0)::BIGINT AS total FROM debts WHERE expense_id = $1",
        )
        .bind(record.id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DomainError::database(format!("Failed to check debts: {}", e)))?
        .get("total");

        let expected: i64 = debts.iter().map(|d| d.amount.minor()).sum();
        if written != expected {
            return Err(DomainError::new(
                ErrorCode::SplitMismatch,
                "stored debts do not match the split",
            )
            .with_detail("expected", expected.to_string())
            .with_detail("written", written.to_string()));
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::database(format!("Failed to commit transaction: {}", e)))?;

        Ok(CreateOutcome::Created(record.clone()))
    }

    async fn open_debts(&self, owner: &UserId) -> Result<Vec<Debt>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner, person, amount_minor, currency, direction,
                   settled, expense_id, created_at, settled_at
            FROM debts
            WHERE owner = $1 AND NOT settled
            ORDER BY created_at ASC
            "#,
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch debts: {}", e)))?;

        rows.iter().map(debt_from_row).collect()
    }

    async fn settle_with(&self, owner: &UserId, person: &str) -> Result<usize, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE debts SET settled = TRUE, settled_at = $3
            WHERE owner = $1 AND LOWER(person) = LOWER($2) AND NOT settled
            "#,
        )
        .bind(owner.as_str())
        .bind(person.trim())
        .bind(Timestamp::now().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to settle debts: {}", e)))?;

        Ok(result.rows_affected() as usize)
    }
}

// =============================================================================
// Row Conversions
// =============================================================================

fn invalid_row(e: ValidationError) -> DomainError {
    DomainError::database(format!("Invalid row: {}", e))
}

fn record_from_row(row: &PgRow) -> Result<ExpenseRecord, DomainError> {
    let id: uuid::Uuid = row.get("id");
    let owner: String = row.get("owner");
    let amount_minor: i64 = row.get("amount_minor");
    let currency: &str = row.get("currency");
    let source: &str = row.get("source");
    let created_at: chrono::DateTime<chrono::Utc> = row.get("created_at");
    let source_message_id: String = row.get("source_message_id");
    let head_count: Option<i32> = row.get("split_head_count");
    let participants: Option<serde_json::Value> = row.get("split_participants");
    let owner_share_minor: Option<i64> = row.get("owner_share_minor");

    let currency: Currency = currency.parse().map_err(invalid_row)?;

    let split = match (head_count, owner_share_minor) {
        (Some(head_count), Some(owner_share)) => {
            let participants: Vec<String> = participants
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| DomainError::database(format!("Invalid participants: {}", e)))?
                .unwrap_or_default();
            Some(SplitInfo {
                head_count: head_count.max(0) as u32,
                participants,
                owner_share: Money::new(owner_share, currency),
            })
        }
        _ => None,
    };

    Ok(ExpenseRecord {
        id: ExpenseId::from_uuid(id),
        owner: UserId::new(owner).map_err(invalid_row)?,
        amount: Money::new(amount_minor, currency),
        category: row.get("category"),
        description: row.get("description"),
        source: source.parse().map_err(invalid_row)?,
        expense_date: row.get("expense_date"),
        created_at: Timestamp::from_datetime(created_at),
        source_message_id: ProviderMessageId::new(source_message_id).map_err(invalid_row)?,
        split,
    })
}

fn debt_from_row(row: &PgRow) -> Result<Debt, DomainError> {
    let id: uuid::Uuid = row.get("id");
    let owner: String = row.get("owner");
    let amount_minor: i64 = row.get("amount_minor");
    let currency: &str = row.get("currency");
    let direction: &str = row.get("direction");
    let expense_id: Option<uuid::Uuid> = row.get("expense_id");
    let created_at: chrono::DateTime<chrono::Utc> = row.get("created_at");
    let settled_at: Option<chrono::DateTime<chrono::Utc>> = row.get("settled_at");

    Ok(Debt {
        id: DebtId::from_uuid(id),
        owner: UserId::new(owner).map_err(invalid_row)?,
        person: row.get("person"),
        amount: Money::new(amount_minor, currency.parse().map_err(invalid_row)?),
        direction: direction.parse().map_err(invalid_row)?,
        settled: row.get("settled"),
        expense_id: expense_id.map(ExpenseId::from_uuid),
        created_at: Timestamp::from_datetime(created_at),
        settled_at: settled_at.map(Timestamp::from_datetime),
    })
}
