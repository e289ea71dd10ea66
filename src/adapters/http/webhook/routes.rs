//! HTTP routes for the webhook endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{health, receive_message, test_message, verify, WebhookState};

/// Creates the webhook router with all endpoints.
pub fn webhook_routes(state: WebhookState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/webhook/whatsapp", post(receive_message).get(verify))
        .route("/api/test/message", post(test_message))
        .with_state(state)
}
