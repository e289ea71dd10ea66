//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, money, errors)
//! - `parsing` - Intent, amount, date and participant extraction from text
//! - `expense` - Expense records, categories, split plans and debts
//! - `conversation` - Per-sender conversation state and turns
//! - `routing` - Intent router that selects a specialized handler
//! - `reply` - Locale-aware rendering of handler results

pub mod conversation;
pub mod expense;
pub mod foundation;
pub mod parsing;
pub mod reply;
pub mod routing;
