//! Media adapters: Twilio download, OpenAI transcription and vision.

mod fixed_media;
mod openai_media;
mod twilio_media;

pub use fixed_media::{FixedMedia, UnconfiguredMedia};
pub use openai_media::{OpenAIVisionExtractor, WhisperTranscriber, NO_TRANSACTION_FOUND};
pub use twilio_media::TwilioMediaFetcher;
