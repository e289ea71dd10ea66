//! Routing domain - the supervisor that selects a specialized handler.

mod handler_kind;
mod router;

pub use handler_kind::HandlerKind;
pub use router::{AmbiguousIntentError, ClarificationRequest, IntentRouter, Route, RouteDecision};
