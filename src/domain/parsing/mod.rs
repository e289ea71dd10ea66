//! Text understanding: amounts, currencies, dates, periods and intents.

mod currency;
mod text_parser;
mod time_range;

pub use currency::{detect_currency, find_amount, AmountMatch};
pub use text_parser::{
    detect_category, title_case, Confidence, Intent, ParsedMessage, SplitTarget, TextParser,
    AMOUNT_ONLY_CANDIDATES, CATEGORY_KEYWORDS,
};
pub use time_range::TimeRange;
