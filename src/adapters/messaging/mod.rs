//! Outbound WhatsApp reply adapters.

mod logging_sender;
mod twilio_sender;

pub use logging_sender::LoggingSender;
pub use twilio_sender::{split_body, TwilioSender, MAX_BODY_CHARS};
