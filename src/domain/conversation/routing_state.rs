//! Routing state carried between turns.
//!
//! A single enum holds the "active handler" marker and the pending
//! clarification, so a conversation can never have both at once.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::StateMachine;
use crate::domain::parsing::Intent;
use crate::domain::routing::HandlerKind;

/// A field a handler needed but could not find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingField {
    Amount,
    Participants,
    PersonName,
    CategoryName,
}

impl MissingField {
    /// Maps a validation error's field name back to the field.
    pub fn from_field_name(field: &str) -> Option<Self> {
        match field {
            "amount" => Some(MissingField::Amount),
            "participants" => Some(MissingField::Participants),
            "person" | "person_name" => Some(MissingField::PersonName),
            "category" | "category_name" => Some(MissingField::CategoryName),
            _ => None,
        }
    }
}

/// The question the assistant is waiting to have answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingClarification {
    /// The text fits more than one intent.
    ChooseIntent {
        original_text: String,
        candidates: Vec<Intent>,
    },
    /// The intent is known but a required field is missing.
    MissingField {
        intent: Intent,
        field: MissingField,
        original_text: String,
    },
    /// Nothing in the text was recognised.
    Rephrase { original_text: String },
}

impl PendingClarification {
    pub fn original_text(&self) -> &str {
        match self {
            PendingClarification::ChooseIntent { original_text, .. }
            | PendingClarification::MissingField { original_text, .. }
            | PendingClarification::Rephrase { original_text } => original_text,
        }
    }
}

/// Where the conversation stands between messages.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum RoutingState {
    #[default]
    Idle,
    AwaitingClarification(PendingClarification),
    HandlerActive(HandlerKind),
}

impl RoutingState {
    pub fn phase(&self) -> RoutingPhase {
        match self {
            RoutingState::Idle => RoutingPhase::Idle,
            RoutingState::AwaitingClarification(_) => RoutingPhase::AwaitingClarification,
            RoutingState::HandlerActive(_) => RoutingPhase::HandlerActive,
        }
    }

    pub fn pending(&self) -> Option<&PendingClarification> {
        match self {
            RoutingState::AwaitingClarification(pending) => Some(pending),
            _ => None,
        }
    }

    pub fn active_handler(&self) -> Option<HandlerKind> {
        match self {
            RoutingState::HandlerActive(kind) => Some(*kind),
            _ => None,
        }
    }
}

/// Fieldless view of [`RoutingState`] for transition checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingPhase {
    Idle,
    AwaitingClarification,
    HandlerActive,
}

impl StateMachine for RoutingPhase {
    fn can_transition_to(&self, target: &Self) -> bool {
        use RoutingPhase::*;
        matches!(
            (self, target),
            (Idle, HandlerActive)
                | (Idle, AwaitingClarification)
                | (HandlerActive, Idle)
                // Handler asked a follow-up question
                | (HandlerActive, AwaitingClarification)
                | (AwaitingClarification, HandlerActive)
                | (AwaitingClarification, Idle)
                // Re-asked or replaced by a different question
                | (AwaitingClarification, AwaitingClarification)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use RoutingPhase::*;
        match self {
            Idle => vec![HandlerActive, AwaitingClarification],
            HandlerActive => vec![Idle, AwaitingClarification],
            AwaitingClarification => vec![HandlerActive, Idle, AwaitingClarification],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_idle() {
        assert_eq!(RoutingState::default(), RoutingState::Idle);
        assert_eq!(RoutingState::default().phase(), RoutingPhase::Idle);
    }

    #[test]
    fn idle_cannot_loop_to_itself() {
        assert!(RoutingPhase::Idle.transition_to(RoutingPhase::Idle).is_err());
    }

    #[test]
    fn clarification_can_resolve_either_way() {
        let phase = RoutingPhase::AwaitingClarification;
        assert!(phase.can_transition_to(&RoutingPhase::HandlerActive));
        assert!(phase.can_transition_to(&RoutingPhase::Idle));
        assert!(!phase.is_terminal());
    }

    #[test]
    fn state_serializes_with_tag_and_detail() {
        let state = RoutingState::AwaitingClarification(PendingClarification::MissingField {
            intent: Intent::SplitPayment,
            field: MissingField::Participants,
            original_text: "Paid 1200 for dinner, split".into(),
        });
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "awaiting_clarification");
        assert_eq!(json["detail"]["kind"], "missing_field");
        assert_eq!(json["detail"]["intent"], "split_payment");
        let back: RoutingState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn idle_serializes_without_detail() {
        let json = serde_json::to_value(RoutingState::Idle).unwrap();
        assert_eq!(json["state"], "idle");
    }

    #[test]
    fn missing_field_names_map_back() {
        assert_eq!(MissingField::from_field_name("amount"), Some(MissingField::Amount));
        assert_eq!(MissingField::from_field_name("currency"), None);
    }
}
