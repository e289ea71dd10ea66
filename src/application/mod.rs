//! Application layer - the normalizer, the handlers and the pipeline.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! The domain decides (routing, splitting, formatting); this layer loads
//! state, calls the ports and persists the outcome.

pub mod conversation_queue;
pub mod handlers;
pub mod normalizer;

pub use conversation_queue::{ConversationQueue, QueueError, DEFAULT_WORKER_IDLE};
pub use handlers::{
    AssistantError, CategoryHandler, ExpenseHandler, HandlerError, HandlerOutcome, HandlerRequest,
    HandlerSet, IntentHandler, PipelinePorts, ProcessMessageHandler, ProcessMessageResult, QueryHandler,
    SplitHandler,
};
pub use normalizer::{ExtractionError, InboundMessage, MediaRef, MessageNormalizer, RECEIPT_PREFIX};
