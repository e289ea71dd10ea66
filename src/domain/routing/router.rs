//! Intent router - picks a handler or asks the user a question.
//!
//! Routing is a pure function of the normalized message and the
//! conversation's routing state. The same inputs always give the same
//! decision; there is no clock, randomness or I/O in here.

use thiserror::Error;

use super::handler_kind::HandlerKind;
use crate::domain::conversation::{
    Conversation, MissingField, NormalizedMessage, PendingClarification, RoutingState,
};
use crate::domain::parsing::{
    title_case, Confidence, Intent, ParsedMessage, TextParser, AMOUNT_ONLY_CANDIDATES,
};

const DISMISS_PHRASES: &[&str] = &["cancel", "never mind", "nevermind", "forget it", "stop", "nothing"];

/// A handler selection with everything parsed for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub handler: HandlerKind,
    pub intent: Intent,
    pub parsed: ParsedMessage,
}

/// Why the router could not pick a handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmbiguousIntentError {
    #[error("'{text}' fits more than one intent")]
    MultipleCandidates { text: String, candidates: Vec<Intent> },

    #[error("no intent recognised in '{text}'")]
    Unrecognized { text: String },

    #[error("reply did not supply the missing {field:?}")]
    FieldNotSupplied { intent: Intent, field: MissingField },
}

/// A question to put to the user, and the state to wait in.
#[derive(Debug, Clone, PartialEq)]
pub struct ClarificationRequest {
    pub pending: PendingClarification,
    pub reason: AmbiguousIntentError,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    Dispatch(Route),
    Clarify(ClarificationRequest),
    Help,
    /// The user cancelled whatever was pending.
    Dismiss,
}

/// Supervisor that maps messages to handlers using conversational context.
#[derive(Debug, Clone)]
pub struct IntentRouter {
    parser: TextParser,
}

impl IntentRouter {
    pub fn new(parser: TextParser) -> Self {
        Self { parser }
    }

    /// Decides what to do with `message` given the conversation's state.
    ///
    /// A stale `HandlerActive` marker routes like `Idle`.
    pub fn route(&self, message: &NormalizedMessage, conversation: &Conversation) -> RouteDecision {
        let today = message.local_date;
        let parsed = self.parser.parse(&message.text, today);

        if is_dismissal(&message.text) {
            return RouteDecision::Dismiss;
        }

        match conversation.routing() {
            RoutingState::AwaitingClarification(pending) => self.resolve(pending, parsed, today),
            RoutingState::Idle | RoutingState::HandlerActive(_) => fresh(parsed),
        }
    }

    fn resolve(
        &self,
        pending: &PendingClarification,
        reply: ParsedMessage,
        today: chrono::NaiveDate,
    ) -> RouteDecision {
        if reply.intent == Intent::Help {
            return RouteDecision::Help;
        }

        match pending {
            PendingClarification::MissingField {
                intent,
                field,
                original_text,
            } => {
                if switches_intent(&reply, *intent) {
                    return fresh(reply);
                }
                let mut base = self.parser.parse(original_text, today);
                if !self.fill(&mut base, *field, &reply) {
                    return RouteDecision::Clarify(ClarificationRequest {
                        pending: pending.clone(),
                        reason: AmbiguousIntentError::FieldNotSupplied {
                            intent: *intent,
                            field: *field,
                        },
                    });
                }
                dispatch_as(*intent, base)
            }
            PendingClarification::ChooseIntent {
                original_text,
                candidates,
            } => match choose(candidates, &reply.raw_text) {
                Some(intent) => dispatch_as(intent, self.parser.parse(original_text, today)),
                None if reply.is_confident() && reply.intent != Intent::Unknown => fresh(reply),
                None => RouteDecision::Clarify(ClarificationRequest {
                    pending: pending.clone(),
                    reason: AmbiguousIntentError::MultipleCandidates {
                        text: original_text.clone(),
                        candidates: candidates.clone(),
                    },
                }),
            },
            // A rephrase is a fresh attempt.
            PendingClarification::Rephrase { .. } => fresh(reply),
        }
    }

    /// Copies the missing field from the reply into the original parse.
    fn fill(&self, base: &mut ParsedMessage, field: MissingField, reply: &ParsedMessage) -> bool {
        let filled = match field {
            MissingField::Amount => reply.amount.is_some(),
            MissingField::Participants => {
                match self.parser.participants_from_reply(&reply.raw_text) {
                    Some(target) => {
                        base.split = Some(target);
                        true
                    }
                    None => false,
                }
            }
            MissingField::PersonName => {
                match reply.person_name.clone().or_else(|| single_name(&reply.raw_text)) {
                    Some(name) => {
                        base.person_name = Some(name);
                        true
                    }
                    None => false,
                }
            }
            MissingField::CategoryName => {
                let name = title_case(reply.raw_text.trim_matches(|c: char| c.is_whitespace() || ".!?".contains(c)));
                if name.is_empty() {
                    false
                } else {
                    base.category_name = Some(name);
                    true
                }
            }
        };

        // An amount in the reply completes the original either way.
        if let Some(amount) = reply.amount {
            if base.amount.is_none() || field == MissingField::Amount {
                base.amount = Some(amount);
                base.currency = amount.currency();
            }
        }
        filled
    }
}

fn fresh(parsed: ParsedMessage) -> RouteDecision {
    match (parsed.intent, parsed.confidence) {
        (Intent::Help, _) => RouteDecision::Help,
        (Intent::Unknown, _) => RouteDecision::Clarify(ClarificationRequest {
            reason: AmbiguousIntentError::Unrecognized {
                text: parsed.raw_text.clone(),
            },
            pending: PendingClarification::Rephrase {
                original_text: parsed.raw_text,
            },
        }),
        (intent, Confidence::High) => dispatch_as(intent, parsed),
        (_, Confidence::Low) => {
            let candidates = if parsed.candidates.is_empty() {
                AMOUNT_ONLY_CANDIDATES.to_vec()
            } else {
                parsed.candidates
            };
            RouteDecision::Clarify(ClarificationRequest {
                reason: AmbiguousIntentError::MultipleCandidates {
                    text: parsed.raw_text.clone(),
                    candidates: candidates.clone(),
                },
                pending: PendingClarification::ChooseIntent {
                    original_text: parsed.raw_text,
                    candidates,
                },
            })
        }
    }
}

fn dispatch_as(intent: Intent, mut parsed: ParsedMessage) -> RouteDecision {
    match HandlerKind::for_intent(intent) {
        Some(handler) => {
            parsed.intent = intent;
            parsed.confidence = Confidence::High;
            RouteDecision::Dispatch(Route {
                handler,
                intent,
                parsed,
            })
        }
        None if intent == Intent::Help => RouteDecision::Help,
        None => fresh(ParsedMessage {
            intent: Intent::Unknown,
            ..parsed
        }),
    }
}

/// A confident reply for some other intent abandons the question.
fn switches_intent(reply: &ParsedMessage, pending: Intent) -> bool {
    reply.is_confident() && reply.intent != pending && reply.intent != Intent::Unknown
}

/// Picks a candidate by its 1-based position or by an alias word.
fn choose(candidates: &[Intent], reply: &str) -> Option<Intent> {
    let answer = reply
        .trim()
        .trim_matches(|c: char| ".!?)".contains(c))
        .to_lowercase();
    if let Ok(index) = answer.parse::<usize>() {
        return index.checked_sub(1).and_then(|i| candidates.get(i)).copied();
    }
    candidates.iter().copied().find(|intent| {
        intent
            .aliases()
            .iter()
            .any(|alias| answer == *alias || answer.split_whitespace().any(|w| w == *alias))
    })
}

fn is_dismissal(text: &str) -> bool {
    let lower = text
        .trim()
        .trim_end_matches(|c: char| ".!".contains(c))
        .to_lowercase();
    DISMISS_PHRASES.contains(&lower.as_str())
}

/// A one-word reply read as a person's name ("rahul" -> "Rahul").
fn single_name(text: &str) -> Option<String> {
    let word = text.trim().trim_end_matches(|c: char| ".!".contains(c));
    if !word.is_empty() && word.chars().all(|c| c.is_alphabetic()) {
        Some(title_case(word))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{Currency, Money, ProviderMessageId, Timestamp, UserId};
    use crate::domain::parsing::SplitTarget;
    use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};

    fn router() -> IntentRouter {
        IntentRouter::new(TextParser::new(Currency::Inr))
    }

    fn msg(text: &str) -> NormalizedMessage {
        NormalizedMessage::text(
            ProviderMessageId::new("SM1").unwrap(),
            UserId::new("+911").unwrap(),
            text,
            Timestamp::from_datetime(Utc.with_ymd_and_hms(2024, 12, 20, 10, 0, 0).unwrap()),
        )
    }

    fn idle() -> Conversation {
        Conversation::new(UserId::new("+911").unwrap())
    }

    fn awaiting(pending: PendingClarification) -> Conversation {
        let mut c = idle();
        c.await_clarification(pending).unwrap();
        c
    }

    fn dispatched(decision: RouteDecision) -> Route {
        match decision {
            RouteDecision::Dispatch(route) => route,
            other => panic!("expected dispatch, got {:?}", other),
        }
    }

    fn clarified(decision: RouteDecision) -> ClarificationRequest {
        match decision {
            RouteDecision::Clarify(request) => request,
            other => panic!("expected clarification, got {:?}", other),
        }
    }

    #[test]
    fn idle_expense_routes_to_expense_handler() {
        let route = dispatched(router().route(&msg("Spent 500 on food"), &idle()));
        assert_eq!(route.handler, HandlerKind::Expense);
        assert_eq!(route.intent, Intent::AddExpense);
        assert_eq!(route.parsed.amount, Some(Money::from_major(500, Currency::Inr)));
    }

    #[test]
    fn stale_handler_marker_routes_like_idle() {
        let mut c = idle();
        c.begin_handling(HandlerKind::Query).unwrap();
        let route = dispatched(router().route(&msg("Who owes me?"), &c));
        assert_eq!(route.handler, HandlerKind::Split);
    }

    #[test]
    fn bare_amount_asks_which_intent() {
        let request = clarified(router().route(&msg("1200"), &idle()));
        assert_eq!(
            request.pending,
            PendingClarification::ChooseIntent {
                original_text: "1200".into(),
                candidates: AMOUNT_ONLY_CANDIDATES.to_vec(),
            }
        );
    }

    #[test]
    fn amount_with_removal_word_is_logged_not_deleted() {
        let route = dispatched(router().route(&msg("Paid 800 to remove the old AC"), &idle()));
        assert_eq!(route.handler, HandlerKind::Expense);
        assert_eq!(route.intent, Intent::AddExpense);
        assert_eq!(route.parsed.amount, Some(Money::from_major(800, Currency::Inr)));
    }

    #[test]
    fn spending_with_competing_keyword_offers_both_intents() {
        let request = clarified(router().route(&msg("Spent 1500 total on groceries"), &idle()));
        assert_eq!(
            request.pending,
            PendingClarification::ChooseIntent {
                original_text: "Spent 1500 total on groceries".into(),
                candidates: vec![Intent::AddExpense, Intent::QuerySummary],
            }
        );

        let request = clarified(router().route(&msg("Paid 2000 for the pending electricity bill"), &idle()));
        assert_eq!(
            request.reason,
            AmbiguousIntentError::MultipleCandidates {
                text: "Paid 2000 for the pending electricity bill".into(),
                candidates: vec![Intent::AddExpense, Intent::CheckDebts],
            }
        );
    }

    #[test]
    fn picking_expense_after_competing_keyword_logs_it() {
        let c = awaiting(PendingClarification::ChooseIntent {
            original_text: "Paid 2000 for the pending electricity bill".into(),
            candidates: vec![Intent::AddExpense, Intent::CheckDebts],
        });
        let route = dispatched(router().route(&msg("1"), &c));
        assert_eq!(route.intent, Intent::AddExpense);
        assert_eq!(route.parsed.amount, Some(Money::from_major(2000, Currency::Inr)));

        let route = dispatched(router().route(&msg("debts"), &c));
        assert_eq!(route.intent, Intent::CheckDebts);
    }

    #[test]
    fn relative_dates_use_the_senders_day() {
        // 10:00 UTC on Dec 20 is already Dec 21 at UTC+14.
        let ahead = FixedOffset::east_opt(14 * 3600).unwrap();
        let message = msg("Spent 300 on lunch yesterday").at_offset(ahead);
        let route = dispatched(router().route(&message, &idle()));
        assert_eq!(route.parsed.expense_date, NaiveDate::from_ymd_opt(2024, 12, 20));

        let route = dispatched(router().route(&msg("Spent 300 on lunch yesterday"), &idle()));
        assert_eq!(route.parsed.expense_date, NaiveDate::from_ymd_opt(2024, 12, 19));
    }

    #[test]
    fn gibberish_asks_to_rephrase() {
        let request = clarified(router().route(&msg("blah blah"), &idle()));
        assert!(matches!(request.reason, AmbiguousIntentError::Unrecognized { .. }));
        assert!(matches!(request.pending, PendingClarification::Rephrase { .. }));
    }

    #[test]
    fn help_and_cancel() {
        assert_eq!(router().route(&msg("help"), &idle()), RouteDecision::Help);
        let c = awaiting(PendingClarification::Rephrase {
            original_text: "x".into(),
        });
        assert_eq!(router().route(&msg("Never mind."), &c), RouteDecision::Dismiss);
    }

    #[test]
    fn choice_by_index_uses_original_text() {
        let c = awaiting(PendingClarification::ChooseIntent {
            original_text: "1200 dinner".into(),
            candidates: AMOUNT_ONLY_CANDIDATES.to_vec(),
        });
        let route = dispatched(router().route(&msg("2"), &c));
        assert_eq!(route.handler, HandlerKind::Split);
        assert_eq!(route.parsed.amount, Some(Money::from_major(1200, Currency::Inr)));

        let route = dispatched(router().route(&msg("expense"), &c));
        assert_eq!(route.intent, Intent::AddExpense);
    }

    #[test]
    fn choice_out_of_range_is_reasked() {
        let c = awaiting(PendingClarification::ChooseIntent {
            original_text: "1200".into(),
            candidates: AMOUNT_ONLY_CANDIDATES.to_vec(),
        });
        let request = clarified(router().route(&msg("7"), &c));
        assert_eq!(request.pending, c.pending_clarification().unwrap().clone());
    }

    #[test]
    fn bare_amount_after_split_question_routes_to_split() {
        let c = awaiting(PendingClarification::MissingField {
            intent: Intent::SplitPayment,
            field: MissingField::Amount,
            original_text: "split dinner with Alice and Bob".into(),
        });
        let route = dispatched(router().route(&msg("1200"), &c));
        assert_eq!(route.handler, HandlerKind::Split);
        assert_eq!(route.parsed.amount, Some(Money::from_major(1200, Currency::Inr)));
        assert_eq!(route.parsed.split.unwrap().head_count(), 3);

        // The same text with no pending question is ambiguous instead.
        assert!(matches!(router().route(&msg("1200"), &idle()), RouteDecision::Clarify(_)));
    }

    #[test]
    fn participants_reply_fills_split() {
        let c = awaiting(PendingClarification::MissingField {
            intent: Intent::SplitPayment,
            field: MissingField::Participants,
            original_text: "Paid 900 for pizza, split it".into(),
        });
        let route = dispatched(router().route(&msg("rahul and priya"), &c));
        assert_eq!(
            route.parsed.split,
            Some(SplitTarget::People(vec!["Rahul".into(), "Priya".into()]))
        );
        assert_eq!(route.parsed.amount, Some(Money::from_major(900, Currency::Inr)));
    }

    #[test]
    fn person_reply_fills_settlement() {
        let c = awaiting(PendingClarification::MissingField {
            intent: Intent::SettleDebt,
            field: MissingField::PersonName,
            original_text: "settled".into(),
        });
        let route = dispatched(router().route(&msg("rahul"), &c));
        assert_eq!(route.parsed.person_name.as_deref(), Some("Rahul"));
    }

    #[test]
    fn different_confident_intent_abandons_question() {
        let c = awaiting(PendingClarification::MissingField {
            intent: Intent::SplitPayment,
            field: MissingField::Participants,
            original_text: "split 1200".into(),
        });
        let route = dispatched(router().route(&msg("How much did I spend this week?"), &c));
        assert_eq!(route.handler, HandlerKind::Query);
    }

    #[test]
    fn unusable_reply_reasks_same_question() {
        let pending = PendingClarification::MissingField {
            intent: Intent::SplitPayment,
            field: MissingField::Participants,
            original_text: "split 1200".into(),
        };
        let request = clarified(router().route(&msg("no idea, some folks"), &awaiting(pending.clone())));
        assert_eq!(request.pending, pending);
    }
}
