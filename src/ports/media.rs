//! Media ports - download attachments and turn them into text.
//!
//! Extraction accuracy is not this crate's concern; these ports only carry
//! bytes in and text out.

use async_trait::async_trait;

use super::ExternalServiceError;

/// Downloaded attachment bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaContent {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Downloads media referenced by an inbound message.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<MediaContent, ExternalServiceError>;
}

/// Speech-to-text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Returns the transcript. An empty string means nothing was heard.
    async fn transcribe(&self, audio: &MediaContent) -> Result<String, ExternalServiceError>;
}

/// Reads a transaction out of a receipt or payment screenshot.
#[async_trait]
pub trait VisionExtractor: Send + Sync {
    /// Returns a one-line description such as "Paid ₹500 to Swiggy on Dec 18",
    /// or `None` when the image shows no transaction.
    async fn extract_transaction(&self, image: &MediaContent) -> Result<Option<String>, ExternalServiceError>;
}
