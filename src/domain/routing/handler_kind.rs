//! The closed set of specialized handlers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;
use crate::domain::parsing::Intent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    Expense,
    Query,
    Split,
    Category,
}

impl HandlerKind {
    pub const ALL: [HandlerKind; 4] = [
        HandlerKind::Expense,
        HandlerKind::Query,
        HandlerKind::Split,
        HandlerKind::Category,
    ];

    /// Handler responsible for an intent. `Help` and `Unknown` have none.
    pub fn for_intent(intent: Intent) -> Option<Self> {
        match intent {
            Intent::AddExpense | Intent::DeleteLastExpense => Some(HandlerKind::Expense),
            Intent::QuerySummary | Intent::ListExpenses => Some(HandlerKind::Query),
            Intent::SplitPayment | Intent::CheckDebts | Intent::SettleDebt => Some(HandlerKind::Split),
            Intent::AddCategory | Intent::ListCategories | Intent::DeleteCategory => {
                Some(HandlerKind::Category)
            }
            Intent::Help | Intent::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerKind::Expense => "expense",
            HandlerKind::Query => "query",
            HandlerKind::Split => "split",
            HandlerKind::Category => "category",
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandlerKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HandlerKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ValidationError::invalid_format("handler", format!("unknown handler {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_actionable_intent_has_a_handler() {
        assert_eq!(HandlerKind::for_intent(Intent::AddExpense), Some(HandlerKind::Expense));
        assert_eq!(HandlerKind::for_intent(Intent::ListExpenses), Some(HandlerKind::Query));
        assert_eq!(HandlerKind::for_intent(Intent::SettleDebt), Some(HandlerKind::Split));
        assert_eq!(HandlerKind::for_intent(Intent::DeleteCategory), Some(HandlerKind::Category));
        assert_eq!(HandlerKind::for_intent(Intent::Help), None);
        assert_eq!(HandlerKind::for_intent(Intent::Unknown), None);
    }

    #[test]
    fn parses_from_display_form() {
        for kind in HandlerKind::ALL {
            assert_eq!(kind.to_string().parse::<HandlerKind>().unwrap(), kind);
        }
    }
}
