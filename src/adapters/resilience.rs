//! Retry policy for calls to external services.
//!
//! Every outbound call (language model, media download, transcription,
//! vision, reply delivery) runs through [`RetryPolicy::run`]: each attempt is
//! bounded by a timeout, and a transient failure gets one more attempt after
//! a backoff. Exhaustion returns the last error.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use crate::config::AiConfig;
use crate::ports::{AIError, ExternalServiceError};

/// Errors the policy knows how to classify.
pub trait Retryable: Sized {
    fn is_retryable(&self) -> bool;

    /// The error reported when an attempt exceeds its timeout.
    fn timed_out(after: Duration) -> Self;
}

impl Retryable for AIError {
    fn is_retryable(&self) -> bool {
        AIError::is_retryable(self)
    }

    fn timed_out(after: Duration) -> Self {
        AIError::Timeout {
            timeout_secs: after.as_secs() as u32,
        }
    }
}

impl Retryable for ExternalServiceError {
    fn is_retryable(&self) -> bool {
        ExternalServiceError::is_retryable(self)
    }

    fn timed_out(after: Duration) -> Self {
        ExternalServiceError::Timeout {
            service: "external service",
            timeout_secs: after.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound for a single attempt.
    pub attempt_timeout: Duration,
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each further retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(30),
            max_retries: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempt_timeout: Duration, max_retries: u32, backoff: Duration) -> Self {
        Self {
            attempt_timeout,
            max_retries,
            backoff,
        }
    }

    pub fn from_config(config: &AiConfig) -> Self {
        Self::new(config.timeout(), config.max_retries, config.retry_backoff())
    }

    /// Runs `operation` until it succeeds, fails permanently, or the retries
    /// are used up.
    pub async fn run<T, E, F, Fut>(&self, operation_name: &str, mut operation: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            let outcome = match timeout(self.attempt_timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(E::timed_out(self.attempt_timeout)),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = self.backoff * 2u32.saturating_pow(attempt);
                    tracing::warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
