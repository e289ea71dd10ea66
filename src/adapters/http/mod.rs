//! HTTP adapters - the WhatsApp webhook surface.

pub mod webhook;

use std::time::Duration;

use axum::Router;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use webhook::{webhook_routes, WebhookState};

/// Builds the application router with request tracing and a request timeout.
pub fn app_router(state: WebhookState, request_timeout: Duration) -> Router {
    webhook_routes(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}
