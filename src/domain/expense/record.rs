//! Expense record entity.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::conversation::MessageKind;
use crate::domain::foundation::{ExpenseId, Money, ProviderMessageId, Timestamp, UserId, ValidationError};

const MAX_DESCRIPTION_LEN: usize = 200;

/// How a split expense was shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitInfo {
    /// Total number of shares, the owner's included.
    pub head_count: u32,
    /// Named participants besides the owner.
    pub participants: Vec<String>,
    /// What the owner actually spent.
    pub owner_share: Money,
}

/// Input for creating an expense record.
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub owner: UserId,
    pub amount: Money,
    pub category: Option<String>,
    pub description: Option<String>,
    pub source: MessageKind,
    pub expense_date: NaiveDate,
    pub source_message_id: ProviderMessageId,
}

/// One structured expense extracted from a conversation turn.
///
/// `amount` is always the full amount paid. For split expenses the owner's
/// own spending is `split.owner_share`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseRecord {
    pub id: ExpenseId,
    pub owner: UserId,
    pub amount: Money,
    pub category: Option<String>,
    pub description: Option<String>,
    pub source: MessageKind,
    pub expense_date: NaiveDate,
    pub created_at: Timestamp,
    /// Provider id of the message that produced this record. Unique per owner.
    pub source_message_id: ProviderMessageId,
    pub split: Option<SplitInfo>,
}

impl ExpenseRecord {
    /// Validates and creates a new record.
    pub fn new(input: NewExpense) -> Result<Self, ValidationError> {
        if !input.amount.is_positive() {
            return Err(ValidationError::not_positive("amount"));
        }
        let description = input
            .description
            .map(|d| d.trim().chars().take(MAX_DESCRIPTION_LEN).collect::<String>())
            .filter(|d| !d.is_empty());
        let category = input
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Ok(Self {
            id: ExpenseId::new(),
            owner: input.owner,
            amount: input.amount,
            category,
            description,
            source: input.source,
            expense_date: input.expense_date,
            created_at: Timestamp::now(),
            source_message_id: input.source_message_id,
            split: None,
        })
    }

    /// Attaches split details.
    pub fn with_split(mut self, split: SplitInfo) -> Self {
        self.split = Some(split);
        self
    }

    /// Amount that counts towards the owner's own spending.
    pub fn owner_amount(&self) -> Money {
        self.split
            .as_ref()
            .map(|s| s.owner_share)
            .unwrap_or(self.amount)
    }

    pub fn is_split(&self) -> bool {
        self.split.is_some()
    }

    /// Category label for display, falling back to "Other".
    pub fn category_label(&self) -> &str {
        self.category.as_deref().unwrap_or("Other")
    }
}
