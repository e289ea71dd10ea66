//! Conversation domain module.
//!
//! Per-sender conversational state: recent turns, the active handler marker
//! and any pending clarification.

mod conversation;
mod message;
mod routing_state;
mod turn;

pub use conversation::{Conversation, RECENT_TURN_WINDOW};
pub use message::NormalizedMessage;
pub use routing_state::{MissingField, PendingClarification, RoutingPhase, RoutingState};
pub use turn::{MessageKind, Turn, TurnOutcome};
