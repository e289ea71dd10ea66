//! Application handlers.
//!
//! The four specialized handlers behind a closed dispatch table, and the
//! pipeline that drives one inbound message through them.

mod category;
mod dispatch;
mod expense;
mod process_message;
mod query;
mod split;

pub use category::CategoryHandler;
pub use dispatch::{HandlerError, HandlerOutcome, HandlerRequest, HandlerSet, IntentHandler};
pub use expense::ExpenseHandler;
pub use process_message::{AssistantError, PipelinePorts, ProcessMessageHandler, ProcessMessageResult};
pub use query::{QueryHandler, LIST_LIMIT};
pub use split::SplitHandler;
