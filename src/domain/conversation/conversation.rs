//! Conversation aggregate - the per-sender state the router reads.

use super::routing_state::{PendingClarification, RoutingPhase, RoutingState};
use super::turn::Turn;
use crate::domain::foundation::{ConversationId, DomainError, StateMachine, Timestamp, UserId};
use crate::domain::routing::HandlerKind;

/// Number of recent turns kept on the aggregate.
pub const RECENT_TURN_WINDOW: usize = 10;

/// The ongoing exchange with one sender.
///
/// Created on the first inbound message and never destroyed. Routing state
/// changes go through [`StateMachine`] checks on [`RoutingPhase`], and
/// `version` backs optimistic concurrency in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    id: ConversationId,
    user_id: UserId,
    routing: RoutingState,
    turns: Vec<Turn>,
    turn_window: usize,
    version: i64,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl Conversation {
    /// Starts a conversation for a first-time sender.
    pub fn new(user_id: UserId) -> Self {
        let now = Timestamp::now();
        Self {
            id: ConversationId::new(),
            user_id,
            routing: RoutingState::Idle,
            turns: Vec::new(),
            turn_window: RECENT_TURN_WINDOW,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstitutes a conversation from persistence.
    ///
    /// `turns` must be oldest first. They are kept as loaded; the store
    /// already limited them, and `with_turn_window` caps them further.
    pub fn reconstitute(
        id: ConversationId,
        user_id: UserId,
        routing: RoutingState,
        turns: Vec<Turn>,
        version: i64,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        let turn_window = turns.len().max(RECENT_TURN_WINDOW);
        Self {
            id,
            user_id,
            routing,
            turns,
            turn_window,
            version,
            created_at,
            updated_at,
        }
    }

    /// Overrides how many recent turns are kept.
    pub fn with_turn_window(mut self, window: usize) -> Self {
        self.turn_window = window.max(1);
        self.trim_turns();
        self
    }

    // === Accessors ===

    pub fn id(&self) -> ConversationId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn routing(&self) -> &RoutingState {
        &self.routing
    }

    pub fn phase(&self) -> RoutingPhase {
        self.routing.phase()
    }

    pub fn pending_clarification(&self) -> Option<&PendingClarification> {
        self.routing.pending()
    }

    /// Recent turns, oldest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    pub fn is_new(&self) -> bool {
        self.version == 0
    }

    // === State changes ===

    /// Marks a handler as running.
    pub fn begin_handling(&mut self, handler: HandlerKind) -> Result<(), DomainError> {
        self.transition(RoutingState::HandlerActive(handler))
    }

    /// Ends the running handler, either returning to idle or waiting on a
    /// follow-up question.
    pub fn finish_handling(&mut self, follow_up: Option<PendingClarification>) -> Result<(), DomainError> {
        let next = match follow_up {
            Some(pending) => RoutingState::AwaitingClarification(pending),
            None => RoutingState::Idle,
        };
        self.transition(next)
    }

    /// Records a question the next message should answer.
    pub fn await_clarification(&mut self, pending: PendingClarification) -> Result<(), DomainError> {
        self.transition(RoutingState::AwaitingClarification(pending))
    }

    /// Drops any pending question or active marker.
    pub fn reset(&mut self) {
        if self.routing != RoutingState::Idle {
            self.routing = RoutingState::Idle;
            self.touch();
        }
    }

    /// Clears a handler marker left behind by a turn that never finished.
    ///
    /// Returns the handler that was marked active, if any.
    pub fn recover_stale_handler(&mut self) -> Option<HandlerKind> {
        let stale = self.routing.active_handler();
        if stale.is_some() {
            self.reset();
        }
        stale
    }

    /// Appends a turn, keeping only the most recent window.
    pub fn record_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.trim_turns();
        self.touch();
    }

    /// Moves this copy's routing state and unsaved turns onto `latest`, a
    /// newer stored copy of the same conversation.
    ///
    /// Used when a save loses the version race after the turn's side
    /// effects are already committed.
    pub fn rebase_onto(self, latest: Conversation) -> Conversation {
        let mut rebased = latest.with_turn_window(self.turn_window);
        for turn in self.turns {
            if !rebased.turns.iter().any(|t| t.id == turn.id) {
                rebased.turns.push(turn);
            }
        }
        rebased.turns.sort_by_key(|t| t.at);
        rebased.trim_turns();
        rebased.routing = self.routing;
        rebased.touch();
        rebased
    }

    /// Advances the version after a successful save.
    pub fn mark_saved(&mut self) {
        self.version += 1;
    }

    fn transition(&mut self, next: RoutingState) -> Result<(), DomainError> {
        self.routing.phase().transition_to(next.phase())?;
        self.routing = next;
        self.touch();
        Ok(())
    }

    fn trim_turns(&mut self) {
        if self.turns.len() > self.turn_window {
            let excess = self.turns.len() - self.turn_window;
            self.turns.drain(..excess);
        }
    }

    fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::{MessageKind, MissingField, TurnOutcome};
    use crate::domain::foundation::{ErrorCode, ProviderMessageId};
    use crate::domain::parsing::Intent;

    fn conversation() -> Conversation {
        Conversation::new(UserId::new("+919876543210").unwrap())
    }

    fn turn(id: &str) -> Turn {
        Turn::new(
            ProviderMessageId::new(id).unwrap(),
            MessageKind::Text,
            "spent 10",
            Some(HandlerKind::Expense),
            TurnOutcome::Handled,
            "ok",
        )
    }

    fn pending() -> PendingClarification {
        PendingClarification::MissingField {
            intent: Intent::SplitPayment,
            field: MissingField::Participants,
            original_text: "split 1200".into(),
        }
    }

    #[test]
    fn new_conversation_is_idle_and_unsaved() {
        let c = conversation();
        assert_eq!(c.phase(), RoutingPhase::Idle);
        assert!(c.is_new());
        assert!(c.turns().is_empty());
    }

    #[test]
    fn handling_cycle_returns_to_idle() {
        let mut c = conversation();
        c.begin_handling(HandlerKind::Expense).unwrap();
        assert_eq!(c.routing().active_handler(), Some(HandlerKind::Expense));
        c.finish_handling(None).unwrap();
        assert_eq!(c.phase(), RoutingPhase::Idle);
    }

    #[test]
    fn handler_follow_up_waits_for_answer() {
        let mut c = conversation();
        c.begin_handling(HandlerKind::Split).unwrap();
        c.finish_handling(Some(pending())).unwrap();
        assert_eq!(c.pending_clarification(), Some(&pending()));
    }

    #[test]
    fn finishing_without_starting_is_rejected() {
        let mut c = conversation();
        let err = c.finish_handling(None).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
    }

    #[test]
    fn stale_handler_is_recovered() {
        let mut c = conversation();
        c.begin_handling(HandlerKind::Query).unwrap();
        assert_eq!(c.recover_stale_handler(), Some(HandlerKind::Query));
        assert_eq!(c.phase(), RoutingPhase::Idle);
        assert_eq!(c.recover_stale_handler(), None);
    }

    #[test]
    fn turns_are_capped_to_window() {
        let mut c = conversation().with_turn_window(3);
        for i in 0..5 {
            c.record_turn(turn(&format!("SM{}", i)));
        }
        assert_eq!(c.turns().len(), 3);
        assert_eq!(c.turns()[0].provider_message_id.as_str(), "SM2");
        assert_eq!(c.turns()[2].provider_message_id.as_str(), "SM4");
    }

    #[test]
    fn reconstituted_turns_survive_a_wider_window() {
        let turns: Vec<Turn> = (0..15).map(|i| turn(&format!("SM{}", i))).collect();
        let c = Conversation::reconstitute(
            ConversationId::new(),
            UserId::new("+919876543210").unwrap(),
            RoutingState::Idle,
            turns,
            3,
            Timestamp::now(),
            Timestamp::now(),
        )
        .with_turn_window(20);
        assert_eq!(c.turns().len(), 15);
        assert_eq!(c.with_turn_window(5).turns().len(), 5);
    }

    #[test]
    fn rebase_keeps_newer_version_and_this_turn() {
        let mut stored = conversation();
        stored.record_turn(turn("SM1"));

        let mut ours = stored.clone();
        let mut theirs = stored;
        theirs.record_turn(turn("SM2"));
        theirs.mark_saved();
        theirs.mark_saved();

        ours.await_clarification(pending()).unwrap();
        ours.record_turn(turn("SM3"));

        let rebased = ours.rebase_onto(theirs);
        assert_eq!(rebased.version(), 2);
        assert_eq!(rebased.pending_clarification(), Some(&pending()));
        let ids: Vec<&str> = rebased.turns().iter().map(|t| t.provider_message_id.as_str()).collect();
        assert_eq!(ids, vec!["SM1", "SM2", "SM3"]);
    }

    #[test]
    fn mark_saved_bumps_version() {
        let mut c = conversation();
        c.mark_saved();
        assert_eq!(c.version(), 1);
        assert!(!c.is_new());
    }
}
