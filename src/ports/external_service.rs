//! Failures of downstream services (media download, transcription, vision,
//! outbound messaging).

use thiserror::Error;

use super::AIError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExternalServiceError {
    #[error("{service} timed out after {timeout_secs}s")]
    Timeout { service: &'static str, timeout_secs: u64 },

    #[error("{service} unavailable: {message}")]
    Unavailable { service: &'static str, message: String },

    #[error("{service} rejected the request ({status}): {message}")]
    Rejected {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("{service} returned an unreadable response: {message}")]
    InvalidResponse { service: &'static str, message: String },

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl ExternalServiceError {
    pub fn unavailable(service: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            service,
            message: message.into(),
        }
    }

    pub fn invalid_response(service: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service,
            message: message.into(),
        }
    }

    /// Maps an HTTP status to an error. 429 and 5xx are transient.
    pub fn from_status(service: &'static str, status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 429 || status >= 500 {
            Self::Unavailable { service, message }
        } else {
            Self::Rejected {
                service,
                status,
                message,
            }
        }
    }

    pub fn service(&self) -> &'static str {
        match self {
            Self::Timeout { service, .. }
            | Self::Unavailable { service, .. }
            | Self::Rejected { service, .. }
            | Self::InvalidResponse { service, .. } => service,
            Self::NotConfigured(service) => service,
        }
    }

    /// True for failures worth one more attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable { .. })
    }
}

impl From<AIError> for ExternalServiceError {
    fn from(err: AIError) -> Self {
        match err {
            AIError::Timeout { timeout_secs } => Self::Timeout {
                service: "language model",
                timeout_secs: u64::from(timeout_secs),
            },
            e if e.is_retryable() => Self::unavailable("language model", e.to_string()),
            e => Self::invalid_response("language model", e.to_string()),
        }
    }
}
