//! Reply domain - locale-aware rendering of handler results.

mod composer;
mod locale;
mod result;

pub use composer::{missing_field_question, ReplyComposer, HELP_TEXT};
pub use locale::{format_amount, Locale};
pub use result::HandlerResult;
