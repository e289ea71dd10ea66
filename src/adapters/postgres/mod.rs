//! PostgreSQL adapters - Database implementations for store ports.
//!
//! - `PostgresConversationStore` - Routing state and turn log
//! - `PostgresLedger` - Expense records and debts
//! - `PostgresCategoryRepository` - Per-user categories
//! - `PostgresProcessedMessageStore` - Inbound message idempotency

mod category_repository;
mod conversation_store;
mod ledger;
mod processed_message_store;

pub use category_repository::PostgresCategoryRepository;
pub use conversation_store::PostgresConversationStore;
pub use ledger::PostgresLedger;
pub use processed_message_store::PostgresProcessedMessageStore;
