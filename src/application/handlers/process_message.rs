//! ProcessMessageHandler - the inbound pipeline for one message.
//!
//! Claim → load conversation → normalize → route → dispatch → compose →
//! record turn → save. Every failure below the store boundary becomes a
//! reply and a turn outcome; only a conversation store that cannot be
//! read surfaces as an error.

use std::sync::Arc;
use thiserror::Error;

use super::dispatch::{HandlerError, HandlerOutcome, HandlerRequest, HandlerSet};
use crate::application::normalizer::{ExtractionError, InboundMessage, MessageNormalizer};
use crate::domain::conversation::{Conversation, NormalizedMessage, Turn, TurnOutcome};
use crate::domain::foundation::{DomainError, ErrorCode, UserId, ValidationError};
use crate::domain::reply::ReplyComposer;
use crate::domain::routing::{
    AmbiguousIntentError, ClarificationRequest, HandlerKind, IntentRouter, RouteDecision,
};
use crate::ports::{
    AIProvider, CategoryRepository, CompletionRequest, ConversationStore, ExternalServiceError,
    MessageRole, MessageSender, ProcessedMessageStore, RequestMetadata, SaveResult,
};

const FALLBACK_SYSTEM_PROMPT: &str = "You are Thuk, a friendly WhatsApp expense tracker bot.

The user sent a message that wasn't clearly understood. Acknowledge it, suggest how they \
might rephrase it and give examples of supported commands. Keep it short. Do not use emojis.

Supported actions:
- Add expenses: \"Spent 500 on food\"
- Query expenses: \"How much did I spend today?\"
- Split payments: \"2000 split with 4 people\"
- Check debts: \"Who owes me?\"
- Settle debts: \"Rahul paid me back\"
- Categories: \"Add category Subscriptions\" or \"Show my categories\"
- Delete: \"Delete last expense\"";

/// Failures of the pipeline, each mapped to a reply and turn outcome.
#[derive(Debug, Clone, Error)]
pub enum AssistantError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Ambiguous(#[from] AmbiguousIntentError),

    #[error(transparent)]
    ExternalService(#[from] ExternalServiceError),

    #[error("mutation rejected: {0}")]
    Integrity(DomainError),

    #[error("store error: {0}")]
    Store(DomainError),
}

impl From<HandlerError> for AssistantError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::Validation(e) => AssistantError::Validation(e),
            HandlerError::Integrity(e) => AssistantError::Integrity(e),
            HandlerError::Store(e) => AssistantError::Store(e),
        }
    }
}

impl AssistantError {
    /// Turn outcome recorded for this failure.
    pub fn outcome(&self) -> TurnOutcome {
        match self {
            AssistantError::Extraction(_) => TurnOutcome::ExtractionFailed,
            AssistantError::Validation(_) => TurnOutcome::Rejected,
            AssistantError::Ambiguous(_) => TurnOutcome::ClarificationRequested,
            AssistantError::ExternalService(_) | AssistantError::Integrity(_) | AssistantError::Store(_) => {
                TurnOutcome::Failed
            }
        }
    }
}

/// Result of processing one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessMessageResult {
    /// The provider id had been processed before; nothing was done.
    Duplicate,
    Replied {
        handler: Option<HandlerKind>,
        outcome: TurnOutcome,
        reply: String,
    },
}

impl ProcessMessageResult {
    pub fn reply(&self) -> Option<&str> {
        match self {
            ProcessMessageResult::Duplicate => None,
            ProcessMessageResult::Replied { reply, .. } => Some(reply),
        }
    }

    pub fn outcome(&self) -> Option<TurnOutcome> {
        match self {
            ProcessMessageResult::Duplicate => None,
            ProcessMessageResult::Replied { outcome, .. } => Some(*outcome),
        }
    }
}

/// Ports the pipeline talks to.
#[derive(Clone)]
pub struct PipelinePorts {
    pub conversations: Arc<dyn ConversationStore>,
    pub processed: Arc<dyn ProcessedMessageStore>,
    pub categories: Arc<dyn CategoryRepository>,
    pub sender: Arc<dyn MessageSender>,
    pub ai: Option<Arc<dyn AIProvider>>,
}

pub struct ProcessMessageHandler {
    ports: PipelinePorts,
    normalizer: MessageNormalizer,
    router: IntentRouter,
    handlers: HandlerSet,
    composer: ReplyComposer,
    turn_window: usize,
}

struct TurnReply {
    handler: Option<HandlerKind>,
    outcome: TurnOutcome,
    reply: String,
}

impl ProcessMessageHandler {
    pub fn new(
        ports: PipelinePorts,
        normalizer: MessageNormalizer,
        router: IntentRouter,
        handlers: HandlerSet,
        composer: ReplyComposer,
    ) -> Self {
        Self {
            ports,
            normalizer,
            router,
            handlers,
            composer,
            turn_window: crate::domain::conversation::RECENT_TURN_WINDOW,
        }
    }

    pub fn with_turn_window(mut self, window: usize) -> Self {
        self.turn_window = window.max(1);
        self
    }

    /// Processes a message and delivers the reply through the sender.
    pub async fn handle_and_reply(&self, inbound: InboundMessage) -> Result<ProcessMessageResult, AssistantError> {
        let sender = inbound.sender.clone();
        match self.handle(inbound).await {
            Ok(result) => {
                if let Some(reply) = result.reply() {
                    self.deliver(&sender, reply).await;
                }
                Ok(result)
            }
            Err(e) => {
                tracing::error!(sender = %sender, error = %e, "message could not be processed");
                self.deliver(&sender, &self.composer.service_unavailable()).await;
                Err(e)
            }
        }
    }

    /// Processes a message and returns the reply without sending it.
    pub async fn handle(&self, inbound: InboundMessage) -> Result<ProcessMessageResult, AssistantError> {
        let message_id = inbound.provider_message_id.clone();
        let sender = inbound.sender.clone();

        if self
            .ports
            .processed
            .claim(&message_id, &sender)
            .await
            .map_err(AssistantError::Store)?
            == SaveResult::AlreadyExists
        {
            tracing::info!(sender = %sender, message_id = %message_id, "duplicate delivery skipped");
            return Ok(ProcessMessageResult::Duplicate);
        }

        let mut conversation = self.load_conversation(&sender).await?;

        if let Some(stale) = conversation.recover_stale_handler() {
            tracing::warn!(
                sender = %sender,
                handler = %stale,
                "previous turn left a handler marked active, resetting"
            );
        }

        let (text, turn) = match self.normalizer.normalize(&inbound).await {
            Ok(message) => {
                let turn = self.respond(&message, &mut conversation).await;
                (message.text, turn)
            }
            Err(e) => {
                tracing::warn!(sender = %sender, message_id = %message_id, error = %e, "extraction failed");
                let reply = match &e {
                    ExtractionError::Service(_) => self.composer.service_unavailable(),
                    _ => self.composer.extraction_failed(inbound.kind),
                };
                let turn = TurnReply {
                    handler: None,
                    outcome: AssistantError::from(e).outcome(),
                    reply,
                };
                (String::new(), turn)
            }
        };

        conversation.record_turn(Turn::new(
            message_id.clone(),
            inbound.kind,
            text,
            turn.handler,
            turn.outcome,
            turn.reply.clone(),
        ));

        // The turn's side effects are committed by now, so a failed save
        // must not turn the reply into an apology.
        if let Err(e) = self.persist(conversation).await {
            tracing::error!(
                sender = %sender,
                message_id = %message_id,
                error = %e,
                "conversation state not saved"
            );
        }

        tracing::info!(
            sender = %sender,
            message_id = %message_id,
            handler = turn.handler.map(|h| h.as_str()),
            outcome = %turn.outcome,
            "turn complete"
        );

        Ok(ProcessMessageResult::Replied {
            handler: turn.handler,
            outcome: turn.outcome,
            reply: turn.reply,
        })
    }

    /// Saves the conversation, rebasing once onto the stored copy if
    /// another writer saved first.
    async fn persist(&self, conversation: Conversation) -> Result<(), DomainError> {
        let conflict = match self.ports.conversations.save(&conversation).await {
            Ok(()) => return Ok(()),
            Err(e) if e.code == ErrorCode::VersionConflict => e,
            Err(e) => return Err(e),
        };

        tracing::warn!(
            sender = %conversation.user_id(),
            error = %conflict,
            "conversation changed during the turn, rebasing"
        );
        let latest = self
            .ports
            .conversations
            .load(conversation.user_id())
            .await?
            .ok_or(conflict)?;
        self.ports.conversations.save(&conversation.rebase_onto(latest)).await
    }

    async fn load_conversation(&self, sender: &UserId) -> Result<Conversation, AssistantError> {
        let existing = self
            .ports
            .conversations
            .load(sender)
            .await
            .map_err(AssistantError::Store)?;

        match existing {
            Some(conversation) => Ok(conversation.with_turn_window(self.turn_window)),
            None => {
                self.ports
                    .categories
                    .ensure_defaults(sender)
                    .await
                    .map_err(AssistantError::Store)?;
                tracing::info!(sender = %sender, "new conversation");
                Ok(Conversation::new(sender.clone()).with_turn_window(self.turn_window))
            }
        }
    }

    /// Routes the message and applies the decision to the conversation.
    async fn respond(&self, message: &NormalizedMessage, conversation: &mut Conversation) -> TurnReply {
        match self.router.route(message, conversation) {
            RouteDecision::Help => TurnReply {
                handler: None,
                outcome: TurnOutcome::HelpShown,
                reply: self.composer.help(),
            },
            RouteDecision::Dismiss => {
                let had_pending = conversation.pending_clarification().is_some();
                conversation.reset();
                TurnReply {
                    handler: None,
                    outcome: TurnOutcome::Dismissed,
                    reply: self.composer.dismissed(had_pending),
                }
            }
            RouteDecision::Clarify(request) => self.clarify(message, conversation, request).await,
            RouteDecision::Dispatch(route) => {
                let handler = route.handler;
                if let Err(e) = conversation.begin_handling(handler) {
                    tracing::error!(error = %e, "conversation refused handler start");
                    return TurnReply {
                        handler: Some(handler),
                        outcome: TurnOutcome::Failed,
                        reply: self.composer.service_unavailable(),
                    };
                }

                let outcome = {
                    let request = HandlerRequest::new(message, &route, conversation);
                    self.handlers.dispatch(&request).await
                };

                let (follow_up, outcome, reply) = match outcome {
                    Ok(HandlerOutcome::Completed(result)) => (None, TurnOutcome::Handled, self.composer.compose(&result)),
                    Ok(HandlerOutcome::FollowUp(pending)) => {
                        let reply = self.composer.question(&pending);
                        (Some(pending), TurnOutcome::ClarificationRequested, reply)
                    }
                    Err(e) => {
                        let err = AssistantError::from(e);
                        (None, err.outcome(), self.failure_reply(&err, handler))
                    }
                };

                if let Err(e) = conversation.finish_handling(follow_up) {
                    tracing::error!(error = %e, "conversation refused handler finish");
                    conversation.reset();
                }

                TurnReply {
                    handler: Some(handler),
                    outcome,
                    reply,
                }
            }
        }
    }

    async fn clarify(
        &self,
        message: &NormalizedMessage,
        conversation: &mut Conversation,
        request: ClarificationRequest,
    ) -> TurnReply {
        tracing::debug!(sender = %message.sender, reason = %request.reason, "asking for clarification");

        let reply = match (&request.reason, &self.ports.ai) {
            (AmbiguousIntentError::Unrecognized { .. }, Some(ai)) => self
                .friendly_fallback(ai.as_ref(), message, conversation)
                .await
                .unwrap_or_else(|| self.composer.clarification(&request)),
            _ => self.composer.clarification(&request),
        };

        let outcome = match conversation.await_clarification(request.pending) {
            Ok(()) => TurnOutcome::ClarificationRequested,
            Err(e) => {
                tracing::error!(error = %e, "conversation refused clarification");
                TurnOutcome::Failed
            }
        };

        TurnReply {
            handler: None,
            outcome,
            reply,
        }
    }

    /// Language-model reply for text nothing recognised.
    async fn friendly_fallback(
        &self,
        ai: &dyn AIProvider,
        message: &NormalizedMessage,
        conversation: &Conversation,
    ) -> Option<String> {
        let metadata = RequestMetadata::new(
            message.sender.clone(),
            conversation.id(),
            message.provider_message_id.as_str(),
        );
        let request = CompletionRequest::new(metadata)
            .with_system_prompt(FALLBACK_SYSTEM_PROMPT)
            .with_message(MessageRole::User, message.text.clone())
            .with_max_tokens(300);

        match ai.complete(request).await {
            Ok(response) if !response.content.trim().is_empty() => Some(response.content.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "fallback completion failed, using canned reply");
                None
            }
        }
    }

    fn failure_reply(&self, err: &AssistantError, handler: HandlerKind) -> String {
        match err {
            AssistantError::Validation(e) => {
                tracing::info!(handler = %handler, error = %e, "handler rejected input");
                self.composer.rejected(e)
            }
            AssistantError::Integrity(e) => {
                tracing::error!(handler = %handler, error = %e, "mutation rolled back");
                self.composer.not_applied()
            }
            other => {
                tracing::error!(handler = %handler, error = %other, "handler failed");
                self.composer.service_unavailable()
            }
        }
    }

    async fn deliver(&self, to: &UserId, reply: &str) {
        if let Err(e) = self.ports.sender.send(to, reply).await {
            tracing::error!(to = %to, error = %e, "reply delivery failed");
        }
    }
}
