//! In-memory expense ledger.
//!
//! Records and debts share one lock so a split commit is all-or-nothing the
//! same way the Postgres transaction is.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::expense::{Debt, ExpenseRecord, SplitPlan};
use crate::domain::foundation::{DomainError, ErrorCode, ProviderMessageId, Timestamp, UserId};
use crate::ports::{CreateOutcome, DebtRepository, ExpenseQuery, ExpenseRepository};

#[derive(Debug, Default)]
struct Ledger {
    /// Insertion order doubles as creation order.
    records: Vec<ExpenseRecord>,
    debts: Vec<Debt>,
}

impl Ledger {
    fn existing(&self, owner: &UserId, source: &ProviderMessageId) -> Option<&ExpenseRecord> {
        self.records
            .iter()
            .find(|r| &r.owner == owner && &r.source_message_id == source)
    }
}

/// Implements both [`ExpenseRepository`] and [`DebtRepository`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    inner: Arc<RwLock<Ledger>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored expense records.
    pub async fn record_count(&self) -> usize {
        self.inner.read().await.records.len()
    }

    /// Every debt for the owner, settled or not.
    pub async fn all_debts(&self, owner: &UserId) -> Vec<Debt> {
        self.inner
            .read()
            .await
            .debts
            .iter()
            .filter(|d| &d.owner == owner)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ExpenseRepository for InMemoryLedger {
    async fn create(&self, record: &ExpenseRecord) -> Result<CreateOutcome, DomainError> {
        let mut ledger = self.inner.write().await;
        if let Some(existing) = ledger.existing(&record.owner, &record.source_message_id) {
            return Ok(CreateOutcome::Duplicate(existing.clone()));
        }
        ledger.records.push(record.clone());
        Ok(CreateOutcome::Created(record.clone()))
    }

    async fn find_by_source(
        &self,
        owner: &UserId,
        source_message_id: &ProviderMessageId,
    ) -> Result<Option<ExpenseRecord>, DomainError> {
        Ok(self.inner.read().await.existing(owner, source_message_id).cloned())
    }

    async fn delete_last(&self, owner: &UserId) -> Result<Option<(ExpenseRecord, usize)>, DomainError> {
        let mut ledger = self.inner.write().await;
        let Some(position) = ledger.records.iter().rposition(|r| &r.owner == owner) else {
            return Ok(None);
        };
        let record = ledger.records.remove(position);
        let before = ledger.debts.len();
        ledger.debts.retain(|d| d.expense_id != Some(record.id));
        let removed = before - ledger.debts.len();
        Ok(Some((record, removed)))
    }

    async fn list(&self, owner: &UserId, query: &ExpenseQuery) -> Result<Vec<ExpenseRecord>, DomainError> {
        let ledger = self.inner.read().await;
        let mut records: Vec<ExpenseRecord> = ledger
            .records
            .iter()
            .filter(|r| &r.owner == owner && query.matches(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.expense_date
                .cmp(&a.expense_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        if let Some(limit) = query.limit {
            records.truncate(limit);
        }
        Ok(records)
    }
}

#[async_trait]
impl DebtRepository for InMemoryLedger {
    async fn commit_split(&self, record: &ExpenseRecord, plan: &SplitPlan) -> Result<CreateOutcome, DomainError> {
        let mut ledger = self.inner.write().await;
        if let Some(existing) = ledger.existing(&record.owner, &record.source_message_id) {
            return Ok(CreateOutcome::Duplicate(existing.clone()));
        }

        plan.verify()?;
        if plan.total() != record.amount {
            return Err(DomainError::new(
                ErrorCode::SplitMismatch,
                "split total differs from the expense amount",
            ));
        }

        ledger.records.push(record.clone());
        ledger.debts.extend(plan.debts_for(record));
        Ok(CreateOutcome::Created(record.clone()))
    }

    async fn open_debts(&self, owner: &UserId) -> Result<Vec<Debt>, DomainError> {
        Ok(self
            .inner
            .read()
            .await
            .debts
            .iter()
            .filter(|d| &d.owner == owner && !d.settled)
            .cloned()
            .collect())
    }

    async fn settle_with(&self, owner: &UserId, person: &str) -> Result<usize, DomainError> {
        let mut ledger = self.inner.write().await;
        let now = Timestamp::now();
        let mut settled = 0;
        for debt in ledger
            .debts
            .iter_mut()
            .filter(|d| &d.owner == owner && !d.settled && d.person.eq_ignore_ascii_case(person.trim()))
        {
            debt.settle(now);
            settled += 1;
        }
        Ok(settled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::MessageKind;
    use crate::domain::expense::{NewExpense, Share};
    use crate::domain::foundation::{Currency, Money};
    use crate::domain::parsing::SplitTarget;
    use chrono::NaiveDate;

    fn owner() -> UserId {
        UserId::new("+919876543210").unwrap()
    }

    fn inr(major: i64) -> Money {
        Money::from_major(major, Currency::Inr)
    }

    fn record(amount: i64, sid: &str, date: NaiveDate) -> ExpenseRecord {
        ExpenseRecord::new(NewExpense {
            owner: owner(),
            amount: inr(amount),
            category: Some("Food".to_string()),
            description: Some("dinner".to_string()),
            source: MessageKind::Text,
            expense_date: date,
            source_message_id: ProviderMessageId::new(sid).unwrap(),
        })
        .unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, d).unwrap()
    }

    #[tokio::test]
    async fn create_is_idempotent_per_source_message() {
        let ledger = InMemoryLedger::new();
        let first = ledger.create(&record(500, "SM1", day(1))).await.unwrap();
        let replay = ledger.create(&record(500, "SM1", day(1))).await.unwrap();

        assert!(!first.is_duplicate());
        assert!(replay.is_duplicate());
        assert_eq!(replay.record().id, first.record().id);
        assert_eq!(ledger.record_count().await, 1);
    }

    #[tokio::test]
    async fn list_filters_and_orders_newest_first() {
        let ledger = InMemoryLedger::new();
        ledger.create(&record(100, "SM1", day(1))).await.unwrap();
        ledger.create(&record(200, "SM2", day(5))).await.unwrap();
        ledger.create(&record(300, "SM3", day(20))).await.unwrap();

        let listed = ledger
            .list(&owner(), &ExpenseQuery::between(day(1), day(10)))
            .await
            .unwrap();

        let amounts: Vec<i64> = listed.iter().map(|r| r.amount.minor()).collect();
        assert_eq!(amounts, vec![20000, 10000]);
    }

    #[tokio::test]
    async fn split_commit_writes_record_and_debts() {
        let ledger = InMemoryLedger::new();
        let target = SplitTarget::People(vec!["Alice".to_string(), "Bob".to_string()]);
        let plan = SplitPlan::equal(inr(1200), &target).unwrap();
        let rec = record(1200, "SM9", day(3)).with_split(plan.split_info());

        ledger.commit_split(&rec, &plan).await.unwrap();

        let debts = ledger.open_debts(&owner()).await.unwrap();
        assert_eq!(debts.len(), 2);
        assert!(debts.iter().all(|d| d.amount == inr(400)));
        assert_eq!(ledger.record_count().await, 1);
    }

    #[tokio::test]
    async fn mismatched_split_writes_nothing() {
        let ledger = InMemoryLedger::new();
        let plan = SplitPlan::from_parts(
            inr(1200),
            inr(400),
            vec![Share {
                person: Some("Alice".to_string()),
                amount: inr(400),
            }],
        );
        let rec = record(1200, "SM10", day(3));

        let err = ledger.commit_split(&rec, &plan).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::SplitMismatch);
        assert_eq!(ledger.record_count().await, 0);
        assert!(ledger.all_debts(&owner()).await.is_empty());
    }

    #[tokio::test]
    async fn delete_last_takes_debts_with_it() {
        let ledger = InMemoryLedger::new();
        ledger.create(&record(100, "SM1", day(1))).await.unwrap();
        let target = SplitTarget::People(vec!["Alice".to_string()]);
        let plan = SplitPlan::equal(inr(600), &target).unwrap();
        let rec = record(600, "SM2", day(1)).with_split(plan.split_info());
        ledger.commit_split(&rec, &plan).await.unwrap();

        let (deleted, debts_removed) = ledger.delete_last(&owner()).await.unwrap().unwrap();

        assert_eq!(deleted.id, rec.id);
        assert_eq!(debts_removed, 1);
        assert_eq!(ledger.record_count().await, 1);
    }

    #[tokio::test]
    async fn settle_matches_person_ignoring_case() {
        let ledger = InMemoryLedger::new();
        let target = SplitTarget::People(vec!["Alice".to_string(), "Bob".to_string()]);
        let plan = SplitPlan::equal(inr(900), &target).unwrap();
        let rec = record(900, "SM3", day(2)).with_split(plan.split_info());
        ledger.commit_split(&rec, &plan).await.unwrap();

        assert_eq!(ledger.settle_with(&owner(), "alice").await.unwrap(), 1);
        assert_eq!(ledger.settle_with(&owner(), "alice").await.unwrap(), 0);

        let open = ledger.open_debts(&owner()).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].person, "Bob");
    }
}
