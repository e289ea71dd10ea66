//! Downloads WhatsApp media attachments from Twilio.
//!
//! Twilio media URLs require HTTP basic auth with the account SID and auth
//! token, and answer with a redirect to the actual file.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};

use crate::adapters::resilience::RetryPolicy;
use crate::ports::{ExternalServiceError, MediaContent, MediaFetcher};

const SERVICE: &str = "twilio media";

/// Anything smaller is treated as an empty download.
const MIN_MEDIA_BYTES: usize = 100;

pub struct TwilioMediaFetcher {
    account_sid: String,
    auth_token: Secret<String>,
    client: Client,
    retry: RetryPolicy,
}

impl TwilioMediaFetcher {
    pub fn new(account_sid: impl Into<String>, auth_token: Secret<String>, retry: RetryPolicy) -> Self {
        let client = Client::builder()
            .timeout(retry.attempt_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            account_sid: account_sid.into(),
            auth_token,
            client,
            retry,
        }
    }

    async fn download(&self, url: &str) -> Result<MediaContent, ExternalServiceError> {
        let response = self
            .client
            .get(url)
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .send()
            .await
            .map_err(|e| ExternalServiceError::unavailable(SERVICE, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExternalServiceError::from_status(SERVICE, status.as_u16(), body));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExternalServiceError::invalid_response(SERVICE, e.to_string()))?;

        if bytes.len() < MIN_MEDIA_BYTES {
            return Err(ExternalServiceError::invalid_response(
                SERVICE,
                format!("media is only {} bytes", bytes.len()),
            ));
        }

        Ok(MediaContent {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

#[async_trait]
impl MediaFetcher for TwilioMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<MediaContent, ExternalServiceError> {
        self.retry.run("twilio.media", || self.download(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> TwilioMediaFetcher {
        TwilioMediaFetcher::new(
            "AC123",
            Secret::new("token".to_string()),
            RetryPolicy::new(Duration::from_secs(2), 1, Duration::from_millis(1)),
        )
    }

    #[tokio::test]
    async fn downloads_with_basic_auth() {
        let server = MockServer::start().await;
        // base64("AC123:token")
        Mock::given(method("GET"))
            .and(path("/media/ME1"))
            .and(header("Authorization", "Basic QUMxMjM6dG9rZW4="))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/jpeg")
                    .set_body_bytes(vec![7u8; 512]),
            )
            .mount(&server)
            .await;

        let media = fetcher()
            .fetch(&format!("{}/media/ME1", server.uri()))
            .await
            .unwrap();

        assert_eq!(media.bytes.len(), 512);
        assert_eq!(media.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn tiny_downloads_are_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 10]))
            .mount(&server)
            .await;

        let err = fetcher().fetch(&format!("{}/media/ME2", server.uri())).await.unwrap_err();
        assert!(matches!(err, ExternalServiceError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = fetcher().fetch(&format!("{}/media/ME3", server.uri())).await.unwrap_err();
        assert!(matches!(err, ExternalServiceError::Rejected { status: 404, .. }));
    }
}
