//! Shared in-memory wiring for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use thuk::adapters::ai::MockAIProvider;
use thuk::adapters::media::FixedMedia;
use thuk::adapters::memory::{
    InMemoryCategoryRepository, InMemoryConversationStore, InMemoryLedger, InMemoryProcessedMessageStore,
};
use thuk::adapters::messaging::LoggingSender;
use thuk::application::{
    CategoryHandler, ExpenseHandler, HandlerSet, InboundMessage, MessageNormalizer, PipelinePorts,
    ProcessMessageHandler, QueryHandler, SplitHandler,
};
use thuk::domain::conversation::Conversation;
use thuk::domain::foundation::{Currency, DomainError, ProviderMessageId, UserId};
use thuk::domain::parsing::TextParser;
use thuk::domain::reply::ReplyComposer;
use thuk::domain::routing::IntentRouter;
use thuk::ports::{AIProvider, ConversationStore};

/// Conversation store that can let another writer save first.
///
/// When armed, the next `save` stores a bumped copy of the current state
/// before the caller's write, so the caller sees a version conflict.
pub struct RacingConversationStore {
    inner: Arc<InMemoryConversationStore>,
    armed: AtomicBool,
}

impl RacingConversationStore {
    pub fn new(inner: Arc<InMemoryConversationStore>) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
        }
    }

    pub fn race_next_save(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConversationStore for RacingConversationStore {
    async fn load(&self, user_id: &UserId) -> Result<Option<Conversation>, DomainError> {
        self.inner.load(user_id).await
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), DomainError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            if let Some(current) = self.inner.load(conversation.user_id()).await? {
                self.inner.save(&current).await?;
            }
        }
        self.inner.save(conversation).await
    }
}

pub struct TestApp {
    pub pipeline: Arc<ProcessMessageHandler>,
    pub ledger: Arc<InMemoryLedger>,
    pub conversations: Arc<InMemoryConversationStore>,
    pub racing: Arc<RacingConversationStore>,
    pub sender: Arc<LoggingSender>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_ai(None)
    }

    pub fn with_ai(ai: Option<Arc<MockAIProvider>>) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let categories = Arc::new(InMemoryCategoryRepository::new());
        let conversations = Arc::new(InMemoryConversationStore::new());
        let racing = Arc::new(RacingConversationStore::new(conversations.clone()));
        let sender = Arc::new(LoggingSender::new());
        let media = Arc::new(FixedMedia::new());

        let mut expense = ExpenseHandler::new(ledger.clone(), categories.clone());
        if let Some(ai) = &ai {
            expense = expense.with_ai(ai.clone());
        }

        let pipeline = ProcessMessageHandler::new(
            PipelinePorts {
                conversations: racing.clone(),
                processed: Arc::new(InMemoryProcessedMessageStore::new()),
                categories: categories.clone(),
                sender: sender.clone(),
                ai: ai.map(|a| a as Arc<dyn AIProvider>),
            },
            MessageNormalizer::new(media.clone(), media.clone(), media),
            IntentRouter::new(TextParser::new(Currency::Inr)),
            HandlerSet::new(
                expense,
                QueryHandler::new(ledger.clone()),
                SplitHandler::new(ledger.clone()),
                CategoryHandler::new(categories),
            ),
            ReplyComposer::default(),
        );

        Self {
            pipeline: Arc::new(pipeline),
            ledger,
            conversations,
            racing,
            sender,
        }
    }

    pub async fn conversation(&self, user: &UserId) -> Conversation {
        self.conversations
            .load(user)
            .await
            .unwrap()
            .expect("conversation should be stored")
    }
}

pub fn user(number: &str) -> UserId {
    UserId::new(format!("whatsapp:{}", number)).unwrap()
}

pub fn text(user: &UserId, id: &str, body: &str) -> InboundMessage {
    InboundMessage::text(ProviderMessageId::new(id).unwrap(), user.clone(), body)
}
