//! Expense domain - records, categories, splits and debts.

mod category;
mod record;
mod split;
mod summary;

pub use category::{find_category, Category, DEFAULT_CATEGORIES};
pub use record::{ExpenseRecord, NewExpense, SplitInfo};
pub use split::{Debt, DebtDirection, Share, SplitPlan};
pub use summary::{DebtSummary, ExpenseSummary};
