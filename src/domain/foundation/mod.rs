//! Foundation module - Shared domain primitives.
//!
//! Value objects, identifiers and error types that form the vocabulary
//! of the expense assistant.

mod errors;
mod ids;
mod money;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{CategoryId, ConversationId, DebtId, ExpenseId, ProviderMessageId, TurnId, UserId};
pub use money::{Currency, Money};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
