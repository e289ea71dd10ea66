//! Sends WhatsApp replies through the Twilio Messages API.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use crate::adapters::resilience::RetryPolicy;
use crate::config::MessagingConfig;
use crate::domain::foundation::UserId;
use crate::ports::{ExternalServiceError, MessageSender};

const SERVICE: &str = "twilio";

/// Twilio rejects WhatsApp bodies longer than this.
pub const MAX_BODY_CHARS: usize = 1600;

pub struct TwilioSender {
    api_base: String,
    account_sid: String,
    auth_token: Secret<String>,
    from: String,
    client: Client,
    retry: RetryPolicy,
}

impl TwilioSender {
    pub fn new(
        api_base: impl Into<String>,
        account_sid: impl Into<String>,
        auth_token: Secret<String>,
        from: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        let client = Client::builder()
            .timeout(retry.attempt_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            account_sid: account_sid.into(),
            auth_token,
            from: from.into(),
            client,
            retry,
        }
    }

    /// Builds a sender when every Twilio credential is configured.
    pub fn from_settings(settings: &MessagingConfig, retry: RetryPolicy) -> Option<Self> {
        if !settings.has_twilio() {
            return None;
        }
        Some(Self::new(
            settings.api_base.clone(),
            settings.twilio_account_sid.clone()?,
            settings.twilio_auth_token.clone()?,
            settings.twilio_whatsapp_number.clone()?,
            retry,
        ))
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }

    async fn post_message(&self, to: &str, body: &str) -> Result<String, ExternalServiceError> {
        let params = [("To", to), ("From", self.from.as_str()), ("Body", body)];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&params)
            .send()
            .await
            .map_err(|e| ExternalServiceError::unavailable(SERVICE, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ExternalServiceError::from_status(SERVICE, status.as_u16(), text));
        }

        let created: CreatedMessage = response
            .json()
            .await
            .map_err(|e| ExternalServiceError::invalid_response(SERVICE, e.to_string()))?;
        Ok(created.sid)
    }
}

#[async_trait]
impl MessageSender for TwilioSender {
    async fn send(&self, to: &UserId, body: &str) -> Result<(), ExternalServiceError> {
        let to = format!("whatsapp:{}", to.as_str());
        let to = to.as_str();

        for chunk in split_body(body, MAX_BODY_CHARS) {
            let chunk = chunk.as_str();
            let sid = self
                .retry
                .run("twilio.send", || self.post_message(to, chunk))
                .await?;
            tracing::debug!(message_sid = %sid, "reply delivered");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct CreatedMessage {
    sid: String,
}

/// Splits a reply into bodies of at most `limit` characters, preferring
/// line breaks.
pub fn split_body(body: &str, limit: usize) -> Vec<String> {
    if body.chars().count() <= limit {
        return vec![body.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in body.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(current.trim_end().to_string());
            current.clear();
            current_len = 0;
        }
        if line_len > limit {
            // A single oversized line is cut on character boundaries.
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect::<String>().trim_end().to_string());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.trim().is_empty() {
        chunks.push(current.trim_end().to_string());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sender_for(server: &MockServer) -> TwilioSender {
        TwilioSender::new(
            server.uri(),
            "AC123",
            Secret::new("token".to_string()),
            "whatsapp:+14155238886",
            RetryPolicy::new(Duration::from_secs(2), 1, Duration::from_millis(1)),
        )
    }

    #[test]
    fn short_bodies_are_not_split() {
        assert_eq!(split_body("hello", 10), vec!["hello".to_string()]);
    }

    #[test]
    fn long_bodies_split_on_lines() {
        let body = "aaaa\nbbbb\ncccc";
        assert_eq!(split_body(body, 10), vec!["aaaa\nbbbb".to_string(), "cccc".to_string()]);
    }

    #[test]
    fn oversized_lines_are_cut() {
        let chunks = split_body("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[tokio::test]
    async fn posts_form_to_messages_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            .and(header("Authorization", "Basic QUMxMjM6dG9rZW4="))
            .and(body_string_contains("To=whatsapp%3A%2B919876543210"))
            .and(body_string_contains("Body=Added+expense"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"sid": "SM1"})))
            .expect(1)
            .mount(&server)
            .await;

        let to = UserId::new("whatsapp:+919876543210").unwrap();
        sender_for(&server).send(&to, "Added expense").await.unwrap();
    }

    #[tokio::test]
    async fn rejected_send_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid To"))
            .expect(1)
            .mount(&server)
            .await;

        let to = UserId::new("+919876543210").unwrap();
        let err = sender_for(&server).send(&to, "hi").await.unwrap_err();
        assert!(matches!(err, ExternalServiceError::Rejected { status: 400, .. }));
    }
}
