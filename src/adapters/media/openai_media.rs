//! OpenAI-backed media extraction: Whisper transcription for voice notes and
//! a vision chat completion for receipts and payment screenshots.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::adapters::ai::OpenAIConfig;
use crate::ports::{ExternalServiceError, MediaContent, Transcriber, VisionExtractor};

/// Sentinel the vision prompt asks the model to answer with when the image
/// holds no transaction.
pub const NO_TRANSACTION_FOUND: &str = "NO_TRANSACTION_FOUND";

const TRANSCRIPTION_PROMPT: &str = "This is a voice message about expenses, money, and \
transactions. The user might mention amounts in rupees, dollars, or other currencies.";

const VISION_PROMPT: &str = "You are an expert at extracting transaction details from bank SMS \
screenshots and transaction receipts.

Extract the following information if present:
- Amount (with currency symbol if visible)
- Merchant/Description (who the payment was to)
- Date (if visible)
- Transaction type (debit/credit)

Format your response as a natural language description like:
\"Paid ₹500 to Swiggy on Dec 20\"
or
\"Received $100 from John on Dec 19\"

If you cannot extract any transaction details, respond with \"NO_TRANSACTION_FOUND\".
Be concise and include only the extracted information.";

fn client_for(config: &OpenAIConfig) -> Client {
    Client::builder()
        .timeout(config.timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

fn transport_error(service: &'static str, config: &OpenAIConfig, err: reqwest::Error) -> ExternalServiceError {
    if err.is_timeout() {
        ExternalServiceError::Timeout {
            service,
            timeout_secs: config.timeout.as_secs(),
        }
    } else {
        ExternalServiceError::unavailable(service, err.to_string())
    }
}

async fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ExternalServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ExternalServiceError::from_status(service, status.as_u16(), body))
}

// ----- Whisper -----

pub struct WhisperTranscriber {
    config: OpenAIConfig,
    model: String,
    client: Client,
}

impl WhisperTranscriber {
    const SERVICE: &'static str = "transcription";

    pub fn new(config: OpenAIConfig, model: impl Into<String>) -> Self {
        let client = client_for(&config);
        Self {
            config,
            model: model.into(),
            client,
        }
    }

    fn file_name(content_type: &str) -> &'static str {
        match content_type.split(';').next().unwrap_or_default().trim() {
            "audio/mpeg" | "audio/mp3" => "voice.mp3",
            "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "voice.m4a",
            "audio/wav" | "audio/x-wav" => "voice.wav",
            "audio/webm" => "voice.webm",
            // WhatsApp voice notes are OGG/Opus
            _ => "voice.ogg",
        }
    }

    async fn transcribe_once(&self, audio: &MediaContent) -> Result<String, ExternalServiceError> {
        let part = Part::bytes(audio.bytes.clone())
            .file_name(Self::file_name(&audio.content_type))
            .mime_str(&audio.content_type)
            .map_err(|e| ExternalServiceError::invalid_response(Self::SERVICE, e.to_string()))?;

        let form = Form::new()
            .text("model", self.model.clone())
            .text("language", "en")
            .text("prompt", TRANSCRIPTION_PROMPT)
            .part("file", part);

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.config.base_url))
            .bearer_auth(self.config.api_key())
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(Self::SERVICE, &self.config, e))?;

        let response = check_status(Self::SERVICE, response).await?;
        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| ExternalServiceError::invalid_response(Self::SERVICE, e.to_string()))?;

        Ok(body.text.trim().to_string())
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &MediaContent) -> Result<String, ExternalServiceError> {
        self.config
            .retry_policy()
            .run("openai.transcribe", || self.transcribe_once(audio))
            .await
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

// ----- Vision -----

pub struct OpenAIVisionExtractor {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIVisionExtractor {
    const SERVICE: &'static str = "vision";

    /// `config.model` should name a vision-capable model.
    pub fn new(config: OpenAIConfig) -> Self {
        let client = client_for(&config);
        Self { config, client }
    }

    fn data_url(image: &MediaContent) -> String {
        let mime = if image.content_type.starts_with("image/") {
            image.content_type.as_str()
        } else {
            "image/jpeg"
        };
        format!("data:{};base64,{}", mime, STANDARD.encode(&image.bytes))
    }

    fn request_body(&self, image: &MediaContent) -> VisionRequest {
        VisionRequest {
            model: self.config.model.clone(),
            max_tokens: 200,
            messages: vec![
                VisionMessage {
                    role: "system",
                    content: VisionContent::Text(VISION_PROMPT.to_string()),
                },
                VisionMessage {
                    role: "user",
                    content: VisionContent::Parts(vec![
                        ContentPart::Text {
                            text: "Extract the transaction details from this image:".to_string(),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: Self::data_url(image),
                                detail: "high",
                            },
                        },
                    ]),
                },
            ],
        }
    }

    async fn extract_once(&self, body: &VisionRequest) -> Result<Option<String>, ExternalServiceError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(self.config.api_key())
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(Self::SERVICE, &self.config, e))?;

        let response = check_status(Self::SERVICE, response).await?;
        let parsed: VisionResponse = response
            .json()
            .await
            .map_err(|e| ExternalServiceError::invalid_response(Self::SERVICE, e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|t| t.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() || text.contains(NO_TRANSACTION_FOUND) {
            return Ok(None);
        }
        Ok(Some(text))
    }
}

#[async_trait]
impl VisionExtractor for OpenAIVisionExtractor {
    async fn extract_transaction(&self, image: &MediaContent) -> Result<Option<String>, ExternalServiceError> {
        let body = self.request_body(image);
        let body = &body;
        self.config
            .retry_policy()
            .run("openai.vision", || self.extract_once(body))
            .await
    }
}

#[derive(Debug, Serialize)]
struct VisionRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<VisionMessage>,
}

#[derive(Debug, Serialize)]
struct VisionMessage {
    role: &'static str,
    content: VisionContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum VisionContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Debug, Deserialize)]
struct VisionResponse {
    choices: Vec<VisionChoice>,
}

#[derive(Debug, Deserialize)]
struct VisionChoice {
    message: VisionResponseMessage,
}

#[derive(Debug, Deserialize)]
struct VisionResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> OpenAIConfig {
        OpenAIConfig::new("sk-test")
            .with_base_url(server.uri())
            .with_timeout(Duration::from_secs(2))
            .with_retry_backoff(Duration::from_millis(1))
    }

    fn voice_note() -> MediaContent {
        MediaContent {
            bytes: vec![0u8; 256],
            content_type: "audio/ogg".to_string(),
        }
    }

    fn receipt() -> MediaContent {
        MediaContent {
            bytes: vec![1, 2, 3],
            content_type: "image/png".to_string(),
        }
    }

    fn vision_reply(content: &str) -> serde_json::Value {
        serde_json::json!({
            "model": "gpt-4o-mini",
            "choices": [{"message": {"role": "assistant", "content": content}, "finish_reason": "stop"}]
        })
    }

    #[test]
    fn picks_file_name_from_content_type() {
        assert_eq!(WhisperTranscriber::file_name("audio/ogg; codecs=opus"), "voice.ogg");
        assert_eq!(WhisperTranscriber::file_name("audio/mpeg"), "voice.mp3");
    }

    #[test]
    fn image_is_sent_as_data_url() {
        assert_eq!(OpenAIVisionExtractor::data_url(&receipt()), "data:image/png;base64,AQID");
    }

    #[tokio::test]
    async fn transcribes_voice_note() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .and(body_string_contains("whisper-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": " Spent 300 on cab "})))
            .mount(&server)
            .await;

        let transcriber = WhisperTranscriber::new(config_for(&server), "whisper-1");
        let text = transcriber.transcribe(&voice_note()).await.unwrap();
        assert_eq!(text, "Spent 300 on cab");
    }

    #[tokio::test]
    async fn extracts_transaction_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({"max_tokens": 200})))
            .respond_with(ResponseTemplate::new(200).set_body_json(vision_reply("Paid ₹500 to Swiggy on Dec 18")))
            .mount(&server)
            .await;

        let extractor = OpenAIVisionExtractor::new(config_for(&server));
        let text = extractor.extract_transaction(&receipt()).await.unwrap();
        assert_eq!(text.as_deref(), Some("Paid ₹500 to Swiggy on Dec 18"));
    }

    #[tokio::test]
    async fn sentinel_means_no_transaction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vision_reply(NO_TRANSACTION_FOUND)))
            .mount(&server)
            .await;

        let extractor = OpenAIVisionExtractor::new(config_for(&server));
        assert_eq!(extractor.extract_transaction(&receipt()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn server_errors_surface_after_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(502))
            .expect(2)
            .mount(&server)
            .await;

        let transcriber = WhisperTranscriber::new(config_for(&server), "whisper-1");
        let err = transcriber.transcribe(&voice_note()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
