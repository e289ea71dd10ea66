//! Keyword-driven intent and entity extraction.
//!
//! Parsing is a pure function of the text, the reference date and the
//! default currency. Nothing here touches the clock or the network, which is
//! what lets the router stay deterministic.

use chrono::{Datelike, Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::currency::{detect_currency, find_amount};
use super::time_range::TimeRange;
use crate::domain::foundation::{Currency, Money};

/// What the user wants done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    AddExpense,
    DeleteLastExpense,
    QuerySummary,
    ListExpenses,
    SplitPayment,
    CheckDebts,
    SettleDebt,
    AddCategory,
    ListCategories,
    DeleteCategory,
    Help,
    Unknown,
}

impl Intent {
    /// Short phrase used when offering the intent as a choice.
    pub fn describe(&self) -> &'static str {
        match self {
            Intent::AddExpense => "log it as your expense",
            Intent::DeleteLastExpense => "delete your last expense",
            Intent::QuerySummary => "show a spending summary",
            Intent::ListExpenses => "list recent expenses",
            Intent::SplitPayment => "split it with others",
            Intent::CheckDebts => "show who owes whom",
            Intent::SettleDebt => "settle a debt",
            Intent::AddCategory => "add a category",
            Intent::ListCategories => "list your categories",
            Intent::DeleteCategory => "delete a category",
            Intent::Help => "show help",
            Intent::Unknown => "something else",
        }
    }

    /// Words a user may answer with to pick this intent from a choice list.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Intent::AddExpense => &["expense", "add", "log", "mine", "me", "just me"],
            Intent::SplitPayment => &["split", "share", "shared", "divide"],
            Intent::QuerySummary => &["summary", "total"],
            Intent::ListExpenses => &["list"],
            Intent::CheckDebts => &["debts", "debt", "owes", "balance"],
            Intent::SettleDebt => &["settle", "settled"],
            _ => &[],
        }
    }
}

/// How sure the keyword classifier is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Low,
}

/// Who a split is shared with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitTarget {
    /// Total head count, the user included ("split with 4 people").
    Count(u32),
    /// Named people besides the user.
    People(Vec<String>),
}

impl SplitTarget {
    /// Number of shares, the user's own included.
    pub fn head_count(&self) -> u32 {
        match self {
            SplitTarget::Count(n) => *n,
            SplitTarget::People(people) => people.len() as u32 + 1,
        }
    }

    pub fn people(&self) -> &[String] {
        match self {
            SplitTarget::Count(_) => &[],
            SplitTarget::People(people) => people,
        }
    }
}

/// Everything extracted from one message.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage {
    pub intent: Intent,
    pub confidence: Confidence,
    pub amount: Option<Money>,
    /// Explicit or default currency.
    pub currency: Currency,
    pub description: Option<String>,
    pub category_hint: Option<String>,
    pub expense_date: Option<NaiveDate>,
    pub time_range: Option<TimeRange>,
    pub split: Option<SplitTarget>,
    pub person_name: Option<String>,
    pub category_name: Option<String>,
    /// Intents a low-confidence parse could mean, in the order offered.
    pub candidates: Vec<Intent>,
    pub raw_text: String,
}

impl ParsedMessage {
    pub fn is_confident(&self) -> bool {
        self.confidence == Confidence::High
    }
}

/// Intents offered when a bare amount could be either.
pub const AMOUNT_ONLY_CANDIDATES: [Intent; 2] = [Intent::AddExpense, Intent::SplitPayment];

/// Families whose keywords also turn up in ordinary spending sentences
/// ("paid 2000 for the pending bill"). With an amount and a spending verb
/// they are offered next to `AddExpense` instead of winning outright.
const COMPETES_WITH_SPENDING: &[Intent] = &[
    Intent::SettleDebt,
    Intent::CheckDebts,
    Intent::ListExpenses,
    Intent::QuerySummary,
];

/// Built-in category names with the words that suggest them.
pub const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Food",
        &[
            "food", "lunch", "dinner", "breakfast", "snack", "meal", "eat", "eating", "restaurant",
            "cafe", "coffee", "tea", "swiggy", "zomato", "ubereats", "doordash", "sandwich",
            "burger", "pizza", "pasta", "noodles", "rice", "curry", "biryani", "dosa", "idli",
            "samosa", "paratha", "roti", "dal", "thali", "momos", "chicken", "mutton", "fish",
            "paneer", "salad", "soup", "bread", "chai", "lassi", "juice", "smoothie", "milkshake",
            "beer", "wine", "drinks", "ice cream", "icecream", "cake", "dessert", "sweet", "mithai",
            "gulab jamun", "mcdonalds", "kfc", "dominos", "subway", "starbucks", "ccd", "mcd",
        ],
    ),
    (
        "Transport",
        &[
            "uber", "ola", "cab", "taxi", "auto", "rickshaw", "bus", "metro", "train", "fuel",
            "petrol", "diesel", "transport", "travel", "flight", "ticket", "rapido", "bike",
            "scooter", "parking", "toll", "lyft",
        ],
    ),
    (
        "Shopping",
        &[
            "shopping", "amazon", "flipkart", "myntra", "clothes", "shoes", "electronics", "buy",
            "purchase", "mall", "store", "market", "bazaar", "grocery", "groceries", "bigbasket",
            "blinkit", "zepto", "instamart", "dmart",
        ],
    ),
    (
        "Bills",
        &[
            "bill", "electricity", "water", "gas", "internet", "wifi", "phone", "recharge", "rent",
            "emi", "loan", "insurance", "tax", "maintenance", "society",
        ],
    ),
    (
        "Entertainment",
        &[
            "movie", "netflix", "spotify", "amazon prime", "hotstar", "game", "gaming", "concert",
            "subscription", "youtube", "premium", "theatre", "cinema", "pvr", "inox", "bookmyshow",
        ],
    ),
    (
        "Health",
        &[
            "medicine", "doctor", "hospital", "pharmacy", "medical", "health", "gym", "fitness",
            "yoga", "clinic", "lab", "checkup", "apollo", "1mg", "pharmeasy", "netmeds",
        ],
    ),
];

const HELP_WORDS: &[&str] = &["help", "?", "commands", "menu"];

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

static SPENDING_VERB: Lazy<Regex> =
    Lazy::new(|| re(r"\b(?:spent|spend|paid|pay|bought|expense|cost|charged)\b"));

/// Intent patterns, most specific first. Matched against lowercased text.
static INTENT_PATTERNS: Lazy<Vec<(Intent, Regex)>> = Lazy::new(|| {
    vec![
        (Intent::DeleteCategory, re(r"\b(?:delete|remove)\s+category\b")),
        (Intent::DeleteLastExpense, re(r"\b(?:delete|remove|undo)\b")),
        (
            Intent::SettleDebt,
            re(r"paid me|\bsettled?\b|paid back|\bcleared\b|received from"),
        ),
        (
            Intent::CheckDebts,
            re(r"who owes|owes? me|\bmy debts\b|\bdebts?\b|\bpending\b"),
        ),
        (
            Intent::SplitPayment,
            re(r"\b(?:split|divide|share|among|between)\b|with \d+ people"),
        ),
        (Intent::ListCategories, re(r"\b(?:my|list|show|all)\s+categories\b")),
        (Intent::AddCategory, re(r"\b(?:add|new|create)\s+category\b")),
        (
            Intent::ListExpenses,
            re(r"\b(?:list|recent|transactions|history)\b|\bshow\b.*\bexpenses\b"),
        ),
        (
            Intent::QuerySummary,
            re(r"how much|\bshow\b|\bexpenses\b|\bspending\b|\bsummary\b|\btotal\b|tell me|what did i"),
        ),
        (Intent::AddExpense, (*SPENDING_VERB).clone()),
    ]
});

static TIME_PATTERNS: Lazy<Vec<(TimeRange, Regex)>> = Lazy::new(|| {
    vec![
        (TimeRange::Today, re(r"\btoday\b")),
        (TimeRange::Yesterday, re(r"\byesterday\b")),
        (TimeRange::LastWeek, re(r"\blast week\b")),
        (TimeRange::ThisWeek, re(r"\bthis week\b|\bweek\b")),
        (TimeRange::LastMonth, re(r"\blast month\b")),
        (TimeRange::ThisMonth, re(r"\bthis month\b|\bmonth\b")),
    ]
});

const MONTHS: &str = "jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec";

static DAY_MONTH: Lazy<Regex> = Lazy::new(|| {
    re(&format!(
        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?({MONTHS})[a-z]*\b"
    ))
});

static MONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    re(&format!(r"(?i)\b({MONTHS})[a-z]*\s+(\d{{1,2}})(?:st|nd|rd|th)?\b"))
});

static HEAD_COUNT: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\b(\d{1,2})\s*(?:people|persons|ways|friends)\b"));

const NAME_LIST: &str = r"[A-Z][a-z]+(?:\s*(?:,|&|\band\b)\s*[A-Z][a-z]+)*";

static NAMED_PARTICIPANTS: Lazy<Regex> =
    Lazy::new(|| re(&format!(r"\b(?:with|between|among)\s+({NAME_LIST})")));

static NAME_REPLY: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)^(?:with\s+)?([a-z]+(?:\s*(?:,|&|\band\b)\s*[a-z]+)*)\s*[.!]?$")
});

static NAME_SEPARATOR: Lazy<Regex> = Lazy::new(|| re(r"(?i)\s*(?:,|&|\band\b)\s*"));

static PERSON_BEFORE_VERB: Lazy<Regex> =
    Lazy::new(|| re(r"\b([A-Z][a-z]+)\s+(?:paid|settled|cleared|returned)\b"));

static PERSON_AFTER_PREP: Lazy<Regex> =
    Lazy::new(|| re(r"\b(?:from|by|with)\s+([A-Z][a-z]+)"));

static ADD_CATEGORY_NAME: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\b(?:add|new|create)\s+category\s+(.+)$"));

static DELETE_CATEGORY_NAME: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\b(?:delete|remove)\s+category\s+(.+)$"));

static RECEIPT_PREFIX: Lazy<Regex> = Lazy::new(|| re(r"(?i)^\s*\[from [a-z ]+\]:?\s*"));

static SPLIT_TAIL: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)[,;]?\s*\b(?:split|divide|share)\b.*$|\s+with\s+[A-Z][a-z]+.*$"));

static DESCRIPTION_NOISE: Lazy<Regex> = Lazy::new(|| {
    re(&format!(
        r"(?i)\b(?:spent|spend|paid|bought|for|on|to|at|rs\.?|inr|rupees?|dollars?|usd|euros?|pounds?|today|yesterday|last week|this week|this month)\b|[₹$€£¥]|\b\d{{1,2}}(?:st|nd|rd|th)?\s+(?:of\s+)?(?:{MONTHS})[a-z]*\b|\b(?:{MONTHS})[a-z]*\s+\d{{1,2}}\b"
    ))
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| re(r"\s+"));

const NOT_NAMES: &[&str] = &["Me", "My", "You", "Him", "Her", "Them", "Us", "Everyone"];

/// Keyword-based parser for inbound text.
#[derive(Debug, Clone)]
pub struct TextParser {
    default_currency: Currency,
}

impl TextParser {
    pub fn new(default_currency: Currency) -> Self {
        Self { default_currency }
    }

    /// Parses a message. `today` anchors relative dates ("yesterday").
    pub fn parse(&self, text: &str, today: NaiveDate) -> ParsedMessage {
        let raw = text.trim();
        let lower = raw.to_lowercase();

        let currency = detect_currency(raw).unwrap_or(self.default_currency);
        let amount = self.amount_in(raw, currency);
        let category_hint = detect_category(&lower);
        let split = self.participants_in(raw);

        let (intent, confidence, candidates) = if HELP_WORDS.contains(&lower.as_str()) {
            (Intent::Help, Confidence::High, Vec::new())
        } else {
            classify(&lower, amount.is_some(), category_hint.is_some(), split.as_ref())
        };

        let category_name = match intent {
            Intent::AddCategory => capture_title(&ADD_CATEGORY_NAME, raw),
            Intent::DeleteCategory => capture_title(&DELETE_CATEGORY_NAME, raw),
            _ => None,
        };

        ParsedMessage {
            intent,
            confidence,
            amount,
            currency,
            description: extract_description(raw),
            category_hint,
            expense_date: extract_date(&lower, today),
            time_range: TIME_PATTERNS
                .iter()
                .find(|(_, pattern)| pattern.is_match(&lower))
                .map(|(range, _)| *range),
            split,
            person_name: self.person_in(raw),
            category_name,
            candidates,
            raw_text: raw.to_string(),
        }
    }

    /// First plausible amount in `text`, in `currency`.
    pub fn amount_in(&self, text: &str, currency: Currency) -> Option<Money> {
        let found = find_amount(text)?;
        Money::parse_decimal(&found.digits, currency)
            .ok()
            .filter(Money::is_positive)
    }

    /// Split participants: a head count or a list of capitalised names.
    pub fn participants_in(&self, text: &str) -> Option<SplitTarget> {
        if let Some(n) = HEAD_COUNT
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        {
            if n >= 2 {
                return Some(SplitTarget::Count(n));
            }
        }
        NAMED_PARTICIPANTS
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| people_from(m.as_str()))
            .map(SplitTarget::People)
    }

    /// Participants given as a bare answer ("Alice and Bob", "3 people").
    pub fn participants_from_reply(&self, text: &str) -> Option<SplitTarget> {
        if let Some(target) = self.participants_in(text) {
            return Some(target);
        }
        NAME_REPLY
            .captures(text.trim())
            .and_then(|c| c.get(1))
            .and_then(|m| people_from(m.as_str()))
            .map(SplitTarget::People)
    }

    /// Counterparty named in a debt message ("Rahul paid me back").
    pub fn person_in(&self, text: &str) -> Option<String> {
        [&*PERSON_BEFORE_VERB, &*PERSON_AFTER_PREP]
            .iter()
            .filter_map(|pattern| pattern.captures(text).and_then(|c| c.get(1)))
            .map(|m| m.as_str().to_string())
            .find(|name| !NOT_NAMES.contains(&name.as_str()))
    }
}

/// Picks the intent for `lower`, with the alternatives when unsure.
///
/// Text carrying an amount never deletes the last expense: "paid 800 to
/// remove the old AC" is a purchase.
fn classify(
    lower: &str,
    has_amount: bool,
    has_category: bool,
    split: Option<&SplitTarget>,
) -> (Intent, Confidence, Vec<Intent>) {
    let matched = INTENT_PATTERNS
        .iter()
        .filter(|(intent, _)| !(has_amount && *intent == Intent::DeleteLastExpense))
        .find(|(_, pattern)| pattern.is_match(lower));

    if let Some((intent, pattern)) = matched {
        // The keyword itself may contain a spending verb ("paid me"), so
        // look for one outside it.
        let spends_outside_keyword = || SPENDING_VERB.is_match(&pattern.replace_all(lower, " "));
        if has_amount && COMPETES_WITH_SPENDING.contains(intent) && spends_outside_keyword() {
            return (
                Intent::AddExpense,
                Confidence::Low,
                vec![Intent::AddExpense, *intent],
            );
        }
        return (*intent, Confidence::High, Vec::new());
    }
    match (has_amount, split, has_category) {
        (true, Some(_), _) => (Intent::SplitPayment, Confidence::High, Vec::new()),
        (true, None, true) => (Intent::AddExpense, Confidence::High, Vec::new()),
        (true, None, false) => (
            Intent::AddExpense,
            Confidence::Low,
            AMOUNT_ONLY_CANDIDATES.to_vec(),
        ),
        (false, _, _) => (Intent::Unknown, Confidence::Low, Vec::new()),
    }
}

/// Built-in category suggested by a keyword in `lower`, if any.
pub fn detect_category(lower: &str) -> Option<String> {
    let padded = format!(
        " {} ",
        lower
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect::<String>()
    );
    let padded = WHITESPACE.replace_all(&padded, " ");
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| {
            keywords.iter().any(|kw| {
                padded.contains(&format!(" {} ", kw)) || padded.contains(&format!(" {}s ", kw))
            })
        })
        .map(|(name, _)| name.to_string())
}

fn extract_description(raw: &str) -> Option<String> {
    let mut text = RECEIPT_PREFIX.replace(raw, "").to_string();
    text = SPLIT_TAIL.replace(&text, "").to_string();
    if let Some(found) = find_amount(&text) {
        text.replace_range(found.start..found.end, " ");
    }
    let text = DESCRIPTION_NOISE.replace_all(&text, " ");
    let text = WHITESPACE.replace_all(&text, " ");
    let text = text.trim_matches(|c: char| c.is_whitespace() || ",.;:-!".contains(c));
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn extract_date(lower: &str, today: NaiveDate) -> Option<NaiveDate> {
    if lower.contains("yesterday") {
        return Some(today - Duration::days(1));
    }
    let (day, month) = if let Some(c) = DAY_MONTH.captures(lower) {
        (c.get(1)?.as_str(), c.get(2)?.as_str())
    } else if let Some(c) = MONTH_DAY.captures(lower) {
        (c.get(2)?.as_str(), c.get(1)?.as_str())
    } else {
        return None;
    };
    let day: u32 = day.parse().ok()?;
    let month = MONTHS.split('|').position(|m| m == month)? as u32 + 1;
    let candidate = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if candidate > today {
        NaiveDate::from_ymd_opt(today.year() - 1, month, day)
    } else {
        Some(candidate)
    }
}

fn people_from(list: &str) -> Option<Vec<String>> {
    let mut people: Vec<String> = Vec::new();
    for name in NAME_SEPARATOR.split(list).map(str::trim).filter(|n| !n.is_empty()) {
        let name = title_case(name);
        if NOT_NAMES.contains(&name.as_str()) {
            return None;
        }
        if !people.contains(&name) {
            people.push(name);
        }
    }
    if people.is_empty() {
        None
    } else {
        Some(people)
    }
}

fn capture_title(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_matches(|c: char| c.is_whitespace() || ".!?".contains(c)))
        .filter(|name| !name.is_empty())
        .map(title_case)
}

/// "monthly subscriptions" -> "Monthly Subscriptions"
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
