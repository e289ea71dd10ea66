//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `ai` - OpenAI chat completions (plus a scripted mock)
//! - `media` - Twilio media download, Whisper transcription, vision extraction
//! - `messaging` - Twilio WhatsApp replies (plus a logging sender)
//! - `postgres` - PostgreSQL stores
//! - `memory` - In-memory stores for tests and local runs
//! - `http` - The webhook surface
//! - `resilience` - Timeout and retry policy for outbound calls

pub mod ai;
pub mod http;
pub mod media;
pub mod memory;
pub mod messaging;
pub mod postgres;
pub mod resilience;
