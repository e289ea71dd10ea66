//! Message normalizer - turns raw inbound payloads into text.
//!
//! Images go through vision extraction, voice notes through transcription.
//! Everything after this point only sees [`NormalizedMessage`].

use chrono::{FixedOffset, Offset, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::domain::conversation::{MessageKind, NormalizedMessage};
use crate::domain::foundation::{ProviderMessageId, Timestamp, UserId};
use crate::ports::{ExternalServiceError, MediaFetcher, Transcriber, VisionExtractor};

/// Prefix marking text that came from a receipt or screenshot.
pub const RECEIPT_PREFIX: &str = "[From receipt] ";

/// Attachment reference from the messaging provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub url: String,
    pub content_type: String,
}

/// A message as received from the provider, before any extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub provider_message_id: ProviderMessageId,
    pub sender: UserId,
    pub kind: MessageKind,
    pub body: String,
    pub media: Option<MediaRef>,
    pub received_at: Timestamp,
}

impl InboundMessage {
    /// A plain text message received now.
    pub fn text(provider_message_id: ProviderMessageId, sender: UserId, body: impl Into<String>) -> Self {
        Self {
            provider_message_id,
            sender,
            kind: MessageKind::Text,
            body: body.into(),
            media: None,
            received_at: Timestamp::now(),
        }
    }

    /// A message carrying one attachment. The kind follows the content type.
    pub fn with_media(
        provider_message_id: ProviderMessageId,
        sender: UserId,
        body: impl Into<String>,
        media: MediaRef,
    ) -> Self {
        Self {
            provider_message_id,
            sender,
            kind: MessageKind::from_content_type(&media.content_type),
            body: body.into(),
            media: Some(media),
            received_at: Timestamp::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("no usable text in {0} message")]
    EmptyContent(MessageKind),

    #[error("{0} message has no media attached")]
    MissingMedia(MessageKind),

    #[error(transparent)]
    Service(#[from] ExternalServiceError),
}

pub struct MessageNormalizer {
    fetcher: Arc<dyn MediaFetcher>,
    transcriber: Arc<dyn Transcriber>,
    vision: Arc<dyn VisionExtractor>,
    utc_offset: FixedOffset,
}

impl MessageNormalizer {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        transcriber: Arc<dyn Transcriber>,
        vision: Arc<dyn VisionExtractor>,
    ) -> Self {
        Self {
            fetcher,
            transcriber,
            vision,
            utc_offset: Utc.fix(),
        }
    }

    /// Offset from UTC used to date messages. Defaults to UTC.
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    pub async fn normalize(&self, inbound: &InboundMessage) -> Result<NormalizedMessage, ExtractionError> {
        let text = match inbound.kind {
            MessageKind::Text => inbound.body.trim().to_string(),
            MessageKind::Image => self.read_receipt(inbound).await?,
            MessageKind::Audio => self.transcribe(inbound).await?,
        };

        if text.is_empty() {
            return Err(ExtractionError::EmptyContent(inbound.kind));
        }

        Ok(NormalizedMessage {
            provider_message_id: inbound.provider_message_id.clone(),
            sender: inbound.sender.clone(),
            kind: inbound.kind,
            text,
            received_at: inbound.received_at,
            local_date: inbound.received_at.date_at(self.utc_offset),
        })
    }

    async fn read_receipt(&self, inbound: &InboundMessage) -> Result<String, ExtractionError> {
        let media = inbound
            .media
            .as_ref()
            .ok_or(ExtractionError::MissingMedia(MessageKind::Image))?;
        let mut image = self.fetcher.fetch(&media.url).await?;
        // The webhook's content type wins over the download's.
        image.content_type = media.content_type.clone();

        let extracted = self
            .vision
            .extract_transaction(&image)
            .await?
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ExtractionError::EmptyContent(MessageKind::Image))?;

        tracing::debug!(message_id = %inbound.provider_message_id, "extracted transaction from image");
        Ok(format!("{}{}", RECEIPT_PREFIX, extracted))
    }

    async fn transcribe(&self, inbound: &InboundMessage) -> Result<String, ExtractionError> {
        let media = inbound
            .media
            .as_ref()
            .ok_or(ExtractionError::MissingMedia(MessageKind::Audio))?;
        let mut audio = self.fetcher.fetch(&media.url).await?;
        audio.content_type = media.content_type.clone();

        let transcript = self.transcriber.transcribe(&audio).await?;
        tracing::debug!(
            message_id = %inbound.provider_message_id,
            chars = transcript.len(),
            "transcribed voice note"
        );
        Ok(transcript.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::media::FixedMedia;
    use chrono::TimeZone;

    fn normalizer(media: FixedMedia) -> MessageNormalizer {
        let media = Arc::new(media);
        MessageNormalizer::new(media.clone(), media.clone(), media)
    }

    fn sender() -> UserId {
        UserId::new("whatsapp:+919876543210").unwrap()
    }

    fn media(content_type: &str) -> MediaRef {
        MediaRef {
            url: "https://api.twilio.com/media/ME1".to_string(),
            content_type: content_type.to_string(),
        }
    }

    #[tokio::test]
    async fn text_is_trimmed() {
        let n = normalizer(FixedMedia::new());
        let inbound = InboundMessage::text(ProviderMessageId::new("SM1").unwrap(), sender(), "  Spent 500 on food \n");
        let message = n.normalize(&inbound).await.unwrap();
        assert_eq!(message.text, "Spent 500 on food");
        assert_eq!(message.kind, MessageKind::Text);
    }

    #[tokio::test]
    async fn local_date_follows_configured_offset() {
        let ist = FixedOffset::east_opt(330 * 60).unwrap();
        let n = normalizer(FixedMedia::new()).with_utc_offset(ist);
        let mut inbound = InboundMessage::text(ProviderMessageId::new("SM1").unwrap(), sender(), "Spent 80 on tea");
        // 00:30 IST on Dec 21 is still Dec 20 in UTC.
        inbound.received_at = Timestamp::from_datetime(Utc.with_ymd_and_hms(2024, 12, 20, 19, 0, 0).unwrap());

        let message = n.normalize(&inbound).await.unwrap();
        assert_eq!(message.local_date, chrono::NaiveDate::from_ymd_opt(2024, 12, 21).unwrap());
    }

    #[tokio::test]
    async fn blank_text_is_empty_content() {
        let n = normalizer(FixedMedia::new());
        let inbound = InboundMessage::text(ProviderMessageId::new("SM1").unwrap(), sender(), "   ");
        let err = n.normalize(&inbound).await.unwrap_err();
        assert_eq!(err, ExtractionError::EmptyContent(MessageKind::Text));
    }

    #[tokio::test]
    async fn image_text_is_prefixed() {
        let fixed = Arc::new(FixedMedia::new().with_extraction("Paid ₹500 to Swiggy on Dec 18"));
        let n = MessageNormalizer::new(fixed.clone(), fixed.clone(), fixed.clone());
        let inbound = InboundMessage::with_media(
            ProviderMessageId::new("SM2").unwrap(),
            sender(),
            "",
            media("image/jpeg"),
        );
        let message = n.normalize(&inbound).await.unwrap();
        assert_eq!(message.kind, MessageKind::Image);
        assert_eq!(message.text, "[From receipt] Paid ₹500 to Swiggy on Dec 18");
        assert_eq!(fixed.fetched_urls(), vec!["https://api.twilio.com/media/ME1".to_string()]);
    }

    #[tokio::test]
    async fn image_without_transaction_is_empty_content() {
        let n = normalizer(FixedMedia::new());
        let inbound = InboundMessage::with_media(
            ProviderMessageId::new("SM3").unwrap(),
            sender(),
            "",
            media("image/png"),
        );
        let err = n.normalize(&inbound).await.unwrap_err();
        assert_eq!(err, ExtractionError::EmptyContent(MessageKind::Image));
    }

    #[tokio::test]
    async fn voice_note_is_transcribed() {
        let n = normalizer(FixedMedia::new().with_transcript(" spent 200 on uber "));
        let inbound = InboundMessage::with_media(
            ProviderMessageId::new("SM4").unwrap(),
            sender(),
            "",
            media("audio/ogg"),
        );
        let message = n.normalize(&inbound).await.unwrap();
        assert_eq!(message.kind, MessageKind::Audio);
        assert_eq!(message.text, "spent 200 on uber");
    }

    #[tokio::test]
    async fn silent_voice_note_is_empty_content() {
        let n = normalizer(FixedMedia::new().with_transcript(""));
        let inbound = InboundMessage::with_media(
            ProviderMessageId::new("SM5").unwrap(),
            sender(),
            "",
            media("audio/ogg"),
        );
        assert_eq!(
            n.normalize(&inbound).await.unwrap_err(),
            ExtractionError::EmptyContent(MessageKind::Audio)
        );
    }

    #[tokio::test]
    async fn service_failure_is_reported() {
        let n = normalizer(FixedMedia::new().failing_with(ExternalServiceError::unavailable("twilio media", "down")));
        let inbound = InboundMessage::with_media(
            ProviderMessageId::new("SM6").unwrap(),
            sender(),
            "",
            media("audio/mpeg"),
        );
        let err = n.normalize(&inbound).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Service(_)));
    }

    #[tokio::test]
    async fn media_kind_without_attachment_is_rejected() {
        let n = normalizer(FixedMedia::new());
        let mut inbound = InboundMessage::text(ProviderMessageId::new("SM7").unwrap(), sender(), "");
        inbound.kind = MessageKind::Image;
        assert_eq!(
            n.normalize(&inbound).await.unwrap_err(),
            ExtractionError::MissingMedia(MessageKind::Image)
        );
    }
}
