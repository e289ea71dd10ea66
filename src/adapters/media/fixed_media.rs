//! Media adapters that never leave the process.
//!
//! `UnconfiguredMedia` stands in when Twilio or OpenAI credentials are
//! missing; every call fails with `NotConfigured`, which the pipeline answers
//! with an extraction-failed reply. `FixedMedia` returns canned results for
//! tests.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::ports::{ExternalServiceError, MediaContent, MediaFetcher, Transcriber, VisionExtractor};

#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredMedia;

#[async_trait]
impl MediaFetcher for UnconfiguredMedia {
    async fn fetch(&self, _url: &str) -> Result<MediaContent, ExternalServiceError> {
        Err(ExternalServiceError::NotConfigured("media download"))
    }
}

#[async_trait]
impl Transcriber for UnconfiguredMedia {
    async fn transcribe(&self, _audio: &MediaContent) -> Result<String, ExternalServiceError> {
        Err(ExternalServiceError::NotConfigured("transcription"))
    }
}

#[async_trait]
impl VisionExtractor for UnconfiguredMedia {
    async fn extract_transaction(&self, _image: &MediaContent) -> Result<Option<String>, ExternalServiceError> {
        Err(ExternalServiceError::NotConfigured("vision"))
    }
}

/// Canned media results.
#[derive(Debug, Default)]
pub struct FixedMedia {
    transcript: Option<String>,
    extraction: Option<String>,
    failure: Option<ExternalServiceError>,
    fetched: Mutex<Vec<String>>,
}

impl FixedMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transcript(mut self, text: impl Into<String>) -> Self {
        self.transcript = Some(text.into());
        self
    }

    pub fn with_extraction(mut self, text: impl Into<String>) -> Self {
        self.extraction = Some(text.into());
        self
    }

    /// Every call fails with this error.
    pub fn failing_with(mut self, err: ExternalServiceError) -> Self {
        self.failure = Some(err);
        self
    }

    /// URLs passed to `fetch`, in call order.
    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetched
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }

    fn fail(&self) -> Result<(), ExternalServiceError> {
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MediaFetcher for FixedMedia {
    async fn fetch(&self, url: &str) -> Result<MediaContent, ExternalServiceError> {
        if let Ok(mut urls) = self.fetched.lock() {
            urls.push(url.to_string());
        }
        self.fail()?;
        Ok(MediaContent {
            bytes: vec![0u8; 128],
            content_type: "application/octet-stream".to_string(),
        })
    }
}

#[async_trait]
impl Transcriber for FixedMedia {
    async fn transcribe(&self, _audio: &MediaContent) -> Result<String, ExternalServiceError> {
        self.fail()?;
        Ok(self.transcript.clone().unwrap_or_default())
    }
}

#[async_trait]
impl VisionExtractor for FixedMedia {
    async fn extract_transaction(&self, _image: &MediaContent) -> Result<Option<String>, ExternalServiceError> {
        self.fail()?;
        Ok(self.extraction.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_media_reports_not_configured() {
        let err = UnconfiguredMedia.fetch("https://api.twilio.com/x").await.unwrap_err();
        assert!(matches!(err, ExternalServiceError::NotConfigured(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn fixed_media_returns_canned_text() {
        let media = FixedMedia::new().with_transcript("spent 200 on tea");
        let audio = media.fetch("https://media/1").await.unwrap();

        assert_eq!(media.transcribe(&audio).await.unwrap(), "spent 200 on tea");
        assert_eq!(media.extract_transaction(&audio).await.unwrap(), None);
        assert_eq!(media.fetched_urls(), vec!["https://media/1".to_string()]);
    }
}
