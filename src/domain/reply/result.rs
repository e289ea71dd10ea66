//! Structured handler results, rendered into text by the composer.

use crate::domain::expense::{DebtSummary, ExpenseRecord, ExpenseSummary, SplitPlan};
use crate::domain::parsing::TimeRange;

#[derive(Debug, Clone, PartialEq)]
pub enum HandlerResult {
    ExpenseAdded {
        record: ExpenseRecord,
        /// Expense date differs from the day the message arrived.
        backdated: bool,
        /// The provider message had already produced this record.
        duplicate: bool,
    },
    ExpenseDeleted {
        record: ExpenseRecord,
        debts_removed: usize,
    },
    NothingToDelete,
    Summary(ExpenseSummary),
    ExpenseList {
        range: TimeRange,
        records: Vec<ExpenseRecord>,
    },
    SplitCreated {
        record: ExpenseRecord,
        plan: SplitPlan,
        duplicate: bool,
    },
    Debts(DebtSummary),
    DebtsSettled {
        person: String,
        count: usize,
    },
    CategoryAdded {
        name: String,
    },
    CategoryExists {
        name: String,
    },
    Categories {
        defaults: Vec<String>,
        custom: Vec<String>,
    },
    CategoryDeleted {
        name: String,
    },
    CategoryNotFound {
        name: String,
    },
    CategoryProtected {
        name: String,
    },
}

impl HandlerResult {
    /// True if this result reflects a change to stored data.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            HandlerResult::ExpenseAdded { duplicate: false, .. }
                | HandlerResult::ExpenseDeleted { .. }
                | HandlerResult::SplitCreated { duplicate: false, .. }
                | HandlerResult::DebtsSettled { count: 1.., .. }
                | HandlerResult::CategoryAdded { .. }
                | HandlerResult::CategoryDeleted { .. }
        )
    }
}
