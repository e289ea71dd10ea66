//! Handler contract and the closed dispatch table.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use super::{CategoryHandler, ExpenseHandler, QueryHandler, SplitHandler};
use crate::domain::conversation::{Conversation, MissingField, NormalizedMessage, PendingClarification};
use crate::domain::foundation::{DomainError, UserId, ValidationError};
use crate::domain::reply::HandlerResult;
use crate::domain::routing::{HandlerKind, Route};

/// Everything a handler gets to see for one message.
#[derive(Debug, Clone, Copy)]
pub struct HandlerRequest<'a> {
    pub message: &'a NormalizedMessage,
    pub route: &'a Route,
    pub conversation: &'a Conversation,
}

impl<'a> HandlerRequest<'a> {
    pub fn new(message: &'a NormalizedMessage, route: &'a Route, conversation: &'a Conversation) -> Self {
        Self {
            message,
            route,
            conversation,
        }
    }

    pub fn owner(&self) -> &UserId {
        &self.message.sender
    }

    /// Day the message arrived; anchors relative dates and periods.
    pub fn today(&self) -> NaiveDate {
        self.message.local_date
    }
}

/// What a handler did with the message.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    /// The action ran; the result is rendered for the user.
    Completed(HandlerResult),
    /// A required field is missing; the conversation waits for it.
    FollowUp(PendingClarification),
}

impl HandlerOutcome {
    pub fn result(&self) -> Option<&HandlerResult> {
        match self {
            HandlerOutcome::Completed(result) => Some(result),
            HandlerOutcome::FollowUp(_) => None,
        }
    }

    pub fn follow_up(&self) -> Option<&PendingClarification> {
        match self {
            HandlerOutcome::Completed(_) => None,
            HandlerOutcome::FollowUp(pending) => Some(pending),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A mutation broke a store invariant and was rolled back.
    #[error("mutation rejected: {0}")]
    Integrity(DomainError),

    #[error("store error: {0}")]
    Store(DomainError),
}

impl From<DomainError> for HandlerError {
    fn from(err: DomainError) -> Self {
        if err.is_integrity_violation() {
            HandlerError::Integrity(err)
        } else {
            HandlerError::Store(err)
        }
    }
}

/// Shared contract of the specialized handlers.
#[async_trait]
pub trait IntentHandler: Send + Sync {
    fn kind(&self) -> HandlerKind;

    async fn handle(&self, request: &HandlerRequest<'_>) -> Result<HandlerOutcome, HandlerError>;
}

/// The fixed set of handlers, one per [`HandlerKind`].
pub struct HandlerSet {
    expense: ExpenseHandler,
    query: QueryHandler,
    split: SplitHandler,
    category: CategoryHandler,
}

impl HandlerSet {
    pub fn new(expense: ExpenseHandler, query: QueryHandler, split: SplitHandler, category: CategoryHandler) -> Self {
        Self {
            expense,
            query,
            split,
            category,
        }
    }

    pub fn get(&self, kind: HandlerKind) -> &dyn IntentHandler {
        match kind {
            HandlerKind::Expense => &self.expense,
            HandlerKind::Query => &self.query,
            HandlerKind::Split => &self.split,
            HandlerKind::Category => &self.category,
        }
    }

    /// Runs the handler selected by the route.
    ///
    /// A missing required field comes back as a follow-up question instead
    /// of an error, remembering the original text so the answer can be
    /// merged into it.
    pub async fn dispatch(&self, request: &HandlerRequest<'_>) -> Result<HandlerOutcome, HandlerError> {
        match self.get(request.route.handler).handle(request).await {
            Err(HandlerError::Validation(ValidationError::MissingField { field })) => {
                match MissingField::from_field_name(&field) {
                    Some(missing) => Ok(HandlerOutcome::FollowUp(PendingClarification::MissingField {
                        intent: request.route.intent,
                        field: missing,
                        original_text: request.route.parsed.raw_text.clone(),
                    })),
                    None => Err(ValidationError::MissingField { field }.into()),
                }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;

    #[test]
    fn split_mismatch_is_an_integrity_error() {
        let err: HandlerError = DomainError::new(ErrorCode::SplitMismatch, "shares do not add up").into();
        assert!(matches!(&err, HandlerError::Integrity(e) if e.code == ErrorCode::SplitMismatch));

        let err: HandlerError = DomainError::database("connection reset").into();
        assert!(matches!(err, HandlerError::Store(_)));
    }

    #[test]
    fn outcome_accessors() {
        let outcome = HandlerOutcome::Completed(HandlerResult::NothingToDelete);
        assert_eq!(outcome.result(), Some(&HandlerResult::NothingToDelete));
        assert!(outcome.follow_up().is_none());
    }
}
