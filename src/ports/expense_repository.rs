//! Expense record and debt persistence ports.
//!
//! Expense records and debts live in one ledger but are exposed through two
//! ports so each handler only sees the data it is allowed to change. The
//! split commit sits on [`DebtRepository`] because it writes both in one
//! transaction.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::expense::{Debt, ExpenseRecord, SplitPlan};
use crate::domain::foundation::{Currency, DomainError, ProviderMessageId, UserId};

/// Result of an idempotent create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(ExpenseRecord),
    /// A record from the same provider message already existed.
    Duplicate(ExpenseRecord),
}

impl CreateOutcome {
    pub fn record(&self) -> &ExpenseRecord {
        match self {
            CreateOutcome::Created(r) | CreateOutcome::Duplicate(r) => r,
        }
    }

    pub fn into_record(self) -> ExpenseRecord {
        match self {
            CreateOutcome::Created(r) | CreateOutcome::Duplicate(r) => r,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, CreateOutcome::Duplicate(_))
    }
}

/// Filter for listing expense records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub currency: Option<Currency>,
    /// Case-insensitive category name.
    pub category: Option<String>,
    /// Newest first, at most this many.
    pub limit: Option<usize>,
}

impl ExpenseQuery {
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            currency: None,
            category: None,
            limit: None,
        }
    }

    pub fn in_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn in_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &ExpenseRecord) -> bool {
        record.expense_date >= self.start
            && record.expense_date <= self.end
            && self.currency.map_or(true, |c| record.amount.currency() == c)
            && self
                .category
                .as_deref()
                .map_or(true, |c| record.category_label().eq_ignore_ascii_case(c))
    }
}

#[async_trait]
pub trait ExpenseRepository: Send + Sync {
    /// Stores a record unless one with the same owner and
    /// `source_message_id` exists, in which case that one is returned.
    async fn create(&self, record: &ExpenseRecord) -> Result<CreateOutcome, DomainError>;

    async fn find_by_source(
        &self,
        owner: &UserId,
        source_message_id: &ProviderMessageId,
    ) -> Result<Option<ExpenseRecord>, DomainError>;

    /// Deletes the owner's most recently created record and its debts.
    ///
    /// Returns the deleted record and how many debts went with it.
    async fn delete_last(&self, owner: &UserId) -> Result<Option<(ExpenseRecord, usize)>, DomainError>;

    /// Records matching the query, newest expense date first.
    async fn list(&self, owner: &UserId, query: &ExpenseQuery) -> Result<Vec<ExpenseRecord>, DomainError>;
}

#[async_trait]
pub trait DebtRepository: Send + Sync {
    /// Writes a split expense and one debt per named participant atomically.
    ///
    /// The plan is verified inside the transaction; a mismatch fails with
    /// `SplitMismatch` and nothing is written. Replays of the same provider
    /// message return the existing record as `Duplicate`.
    async fn commit_split(&self, record: &ExpenseRecord, plan: &SplitPlan) -> Result<CreateOutcome, DomainError>;

    /// Open debts for the owner.
    async fn open_debts(&self, owner: &UserId) -> Result<Vec<Debt>, DomainError>;

    /// Marks every open debt with `person` (case-insensitive) settled.
    ///
    /// Returns the number of debts settled.
    async fn settle_with(&self, owner: &UserId, person: &str) -> Result<usize, DomainError>;
}
