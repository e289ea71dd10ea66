//! HTTP handlers for the webhook endpoints.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};

use crate::application::{ConversationQueue, QueueError};

use super::dto::{
    ErrorResponse, HealthResponse, TestMessageForm, TestMessageResponse, TwilioWebhookForm, EMPTY_TWIML,
};

// ════════════════════════════════════════════════════════════════════════════
// Handler state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct WebhookState {
    queue: ConversationQueue,
}

impl WebhookState {
    pub fn new(queue: ConversationQueue) -> Self {
        Self { queue }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP handlers
// ════════════════════════════════════════════════════════════════════════════

/// POST /webhook/whatsapp - Queue an inbound message and acknowledge
///
/// Twilio retries anything that is not a 2xx, so malformed payloads are
/// logged and acknowledged too.
pub async fn receive_message(State(state): State<WebhookState>, Form(form): Form<TwilioWebhookForm>) -> Response {
    match form.into_inbound() {
        Ok(inbound) => {
            tracing::info!(
                sender = %inbound.sender,
                message_id = %inbound.provider_message_id,
                kind = %inbound.kind,
                "webhook message received"
            );
            state.queue.enqueue(inbound);
        }
        Err(e) => tracing::warn!(error = %e, "ignoring webhook payload"),
    }
    twiml()
}

/// GET /webhook/whatsapp - Verification probe
pub async fn verify() -> &'static str {
    "OK"
}

/// POST /api/test/message - Process a message and return the reply
pub async fn test_message(State(state): State<WebhookState>, Form(form): Form<TestMessageForm>) -> Response {
    let input = form.message.clone();
    let inbound = match form.into_inbound() {
        Ok(inbound) => inbound,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(ErrorResponse::bad_request(e.to_string()))).into_response();
        }
    };

    match state.queue.submit(inbound).await {
        Ok(result) => {
            let response = TestMessageResponse {
                status: "success".to_string(),
                input,
                response: result.reply().unwrap_or_default().to_string(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => handle_queue_error(e),
    }
}

/// GET / and GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

// ════════════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════════════

fn twiml() -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/xml")], EMPTY_TWIML).into_response()
}

fn handle_queue_error(error: QueueError) -> Response {
    tracing::error!(error = %error, "test message failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::internal(error.to_string())),
    )
        .into_response()
}
