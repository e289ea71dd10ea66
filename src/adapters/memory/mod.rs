//! In-memory store adapters for tests and database-less development runs.

mod categories;
mod conversations;
mod ledger;
mod processed_messages;

pub use categories::InMemoryCategoryRepository;
pub use conversations::InMemoryConversationStore;
pub use ledger::InMemoryLedger;
pub use processed_messages::InMemoryProcessedMessageStore;
