//! Sender used when Twilio is not configured: replies are logged and kept
//! in memory so tests can inspect them.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::domain::foundation::UserId;
use crate::ports::{ExternalServiceError, MessageSender};

#[derive(Debug, Default)]
pub struct LoggingSender {
    sent: Mutex<Vec<(UserId, String)>>,
}

impl LoggingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every reply sent so far, oldest first.
    pub fn sent(&self) -> Vec<(UserId, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Replies sent to one recipient.
    pub fn sent_to(&self, to: &UserId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(recipient, _)| recipient == to)
            .map(|(_, body)| body)
            .collect()
    }
}

#[async_trait]
impl MessageSender for LoggingSender {
    async fn send(&self, to: &UserId, body: &str) -> Result<(), ExternalServiceError> {
        tracing::info!(to = %to, chars = body.chars().count(), "reply (not delivered, messaging disabled)");
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((to.clone(), body.to_string()));
        }
        Ok(())
    }
}
