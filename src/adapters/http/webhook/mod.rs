//! HTTP adapter for the WhatsApp webhook and the synchronous test endpoint.

mod dto;
mod handlers;
mod routes;

pub use dto::{ErrorResponse, HealthResponse, TestMessageForm, TestMessageResponse, TwilioWebhookForm, EMPTY_TWIML};
pub use handlers::WebhookState;
pub use routes::webhook_routes;
