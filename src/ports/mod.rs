//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Service Ports
//!
//! - `AIProvider` - Language-model completions
//! - `MediaFetcher`, `Transcriber`, `VisionExtractor` - Media to text
//! - `MessageSender` - Outbound WhatsApp replies
//!
//! ## Store Ports
//!
//! - `ConversationStore` - Per-sender routing state and turns
//! - `ExpenseRepository`, `DebtRepository` - The expense ledger
//! - `CategoryRepository` - Per-user category set
//! - `ProcessedMessageStore` - Inbound message idempotency

mod ai_provider;
mod category_repository;
mod conversation_store;
mod expense_repository;
mod external_service;
mod media;
mod message_sender;
mod processed_message_store;

pub use ai_provider::{
    AIError, AIProvider, CompletionRequest, CompletionResponse, FinishReason, Message, MessageRole,
    RequestMetadata, TokenUsage,
};
pub use category_repository::CategoryRepository;
pub use conversation_store::ConversationStore;
pub use expense_repository::{CreateOutcome, DebtRepository, ExpenseQuery, ExpenseRepository};
pub use external_service::ExternalServiceError;
pub use media::{MediaContent, MediaFetcher, Transcriber, VisionExtractor};
pub use message_sender::MessageSender;
pub use processed_message_store::{ProcessedMessageStore, SaveResult};
