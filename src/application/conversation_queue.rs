//! Per-sender sequential processing.
//!
//! Each active sender gets an unbounded channel and one worker task. Jobs
//! for a sender run one at a time in arrival order; different senders run
//! concurrently. A worker exits after sitting idle and removes itself from
//! the map while holding the lock, so a job enqueued at that moment either
//! reaches the old worker or starts a new one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::handlers::{AssistantError, ProcessMessageHandler, ProcessMessageResult};
use super::normalizer::InboundMessage;
use crate::domain::foundation::UserId;

pub const DEFAULT_WORKER_IDLE: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Assistant(#[from] AssistantError),

    #[error("worker stopped before answering")]
    WorkerGone,
}

enum Job {
    /// Process and send the reply to the sender's chat.
    Reply(InboundMessage),
    /// Process and hand the result back to the caller.
    Respond(InboundMessage, oneshot::Sender<Result<ProcessMessageResult, AssistantError>>),
}

impl Job {
    fn sender(&self) -> &UserId {
        match self {
            Job::Reply(inbound) | Job::Respond(inbound, _) => &inbound.sender,
        }
    }
}

type Workers = Arc<Mutex<HashMap<UserId, mpsc::UnboundedSender<Job>>>>;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct ConversationQueue {
    pipeline: Arc<ProcessMessageHandler>,
    workers: Workers,
    idle: Duration,
}

impl ConversationQueue {
    pub fn new(pipeline: Arc<ProcessMessageHandler>) -> Self {
        Self {
            pipeline,
            workers: Arc::new(Mutex::new(HashMap::new())),
            idle: DEFAULT_WORKER_IDLE,
        }
    }

    /// How long a worker waits for another job before exiting.
    pub fn with_idle_timeout(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    /// Queues a message; the reply goes out through the message sender.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn enqueue(&self, inbound: InboundMessage) {
        self.push(Job::Reply(inbound));
    }

    /// Queues a message and waits for its result. Nothing is sent.
    pub async fn submit(&self, inbound: InboundMessage) -> Result<ProcessMessageResult, QueueError> {
        let (tx, rx) = oneshot::channel();
        self.push(Job::Respond(inbound, tx));
        rx.await.map_err(|_| QueueError::WorkerGone)?.map_err(QueueError::from)
    }

    /// Senders with a live worker.
    pub fn active_workers(&self) -> usize {
        locked(&self.workers).len()
    }

    fn push(&self, job: Job) {
        let key = job.sender().clone();
        let mut workers = locked(&self.workers);

        let job = match workers.get(&key) {
            Some(tx) => match tx.send(job) {
                Ok(()) => return,
                // The worker died; start a fresh one with the job.
                Err(mpsc::error::SendError(job)) => job,
            },
            None => job,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(job).is_err() {
            tracing::error!(sender = %key, "new worker channel closed before start");
            return;
        }
        workers.insert(key.clone(), tx);
        tracing::debug!(sender = %key, "worker started");

        let worker = Worker {
            key,
            rx,
            pipeline: self.pipeline.clone(),
            workers: self.workers.clone(),
            idle: self.idle,
        };
        tokio::spawn(worker.run());
    }
}

struct Worker {
    key: UserId,
    rx: mpsc::UnboundedReceiver<Job>,
    pipeline: Arc<ProcessMessageHandler>,
    workers: Workers,
    idle: Duration,
}

impl Worker {
    async fn run(mut self) {
        loop {
            let job = match tokio::time::timeout(self.idle, self.rx.recv()).await {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(_) => match self.retire() {
                    Some(job) => job,
                    None => break,
                },
            };
            self.process(job).await;
        }
        tracing::debug!(sender = %self.key, "worker stopped");
    }

    /// Leaves the map unless a job slipped in before the lock was taken.
    fn retire(&mut self) -> Option<Job> {
        let mut workers = locked(&self.workers);
        match self.rx.try_recv() {
            Ok(job) => Some(job),
            Err(_) => {
                workers.remove(&self.key);
                None
            }
        }
    }

    async fn process(&self, job: Job) {
        match job {
            Job::Reply(inbound) => {
                // Errors are logged and answered inside the pipeline.
                let _ = self.pipeline.handle_and_reply(inbound).await;
            }
            Job::Respond(inbound, reply_to) => {
                let result = self.pipeline.handle(inbound).await;
                if reply_to.send(result).is_err() {
                    tracing::debug!(sender = %self.key, "caller went away before the result");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::media::FixedMedia;
    use crate::adapters::memory::{
        InMemoryCategoryRepository, InMemoryConversationStore, InMemoryLedger, InMemoryProcessedMessageStore,
    };
    use crate::adapters::messaging::LoggingSender;
    use crate::application::handlers::{
        CategoryHandler, ExpenseHandler, HandlerSet, PipelinePorts, QueryHandler, SplitHandler,
    };
    use crate::application::normalizer::MessageNormalizer;
    use crate::domain::conversation::TurnOutcome;
    use crate::domain::foundation::{Currency, ProviderMessageId};
    use crate::domain::parsing::TextParser;
    use crate::domain::reply::ReplyComposer;
    use crate::domain::routing::IntentRouter;

    fn queue(sender: Arc<LoggingSender>, ledger: Arc<InMemoryLedger>) -> ConversationQueue {
        let categories = Arc::new(InMemoryCategoryRepository::new());
        let media = Arc::new(FixedMedia::new());
        let pipeline = ProcessMessageHandler::new(
            PipelinePorts {
                conversations: Arc::new(InMemoryConversationStore::new()),
                processed: Arc::new(InMemoryProcessedMessageStore::new()),
                categories: categories.clone(),
                sender,
                ai: None,
            },
            MessageNormalizer::new(media.clone(), media.clone(), media),
            IntentRouter::new(TextParser::new(Currency::Inr)),
            HandlerSet::new(
                ExpenseHandler::new(ledger.clone(), categories.clone()),
                QueryHandler::new(ledger.clone()),
                SplitHandler::new(ledger),
                CategoryHandler::new(categories),
            ),
            ReplyComposer::default(),
        );
        ConversationQueue::new(Arc::new(pipeline)).with_idle_timeout(Duration::from_millis(50))
    }

    fn msg(user: &str, id: &str, body: &str) -> InboundMessage {
        InboundMessage::text(ProviderMessageId::new(id).unwrap(), UserId::new(user).unwrap(), body)
    }

    #[tokio::test]
    async fn submit_returns_reply() {
        let q = queue(Arc::new(LoggingSender::new()), Arc::new(InMemoryLedger::new()));
        let result = q.submit(msg("+911111111111", "SM1", "Spent 500 on food")).await.unwrap();
        assert_eq!(result.outcome(), Some(TurnOutcome::Handled));
    }

    #[tokio::test]
    async fn same_sender_messages_run_in_arrival_order() {
        let sender = Arc::new(LoggingSender::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let q = queue(sender.clone(), ledger.clone());
        let user = "+912222222222";

        q.enqueue(msg(user, "SM1", "500"));
        q.enqueue(msg(user, "SM2", "1"));
        let last = q.submit(msg(user, "SM3", "how much did I spend today?")).await.unwrap();

        // The choice answer ran after the question, so the expense existed
        // before the summary was computed.
        assert_eq!(ledger.record_count().await, 1);
        assert_eq!(last.outcome(), Some(TurnOutcome::Handled));
        assert_eq!(sender.sent_to(&UserId::new(user).unwrap()).len(), 2);
    }

    #[tokio::test]
    async fn idle_workers_exit_and_restart() {
        let q = queue(Arc::new(LoggingSender::new()), Arc::new(InMemoryLedger::new()));
        q.submit(msg("+913333333333", "SM1", "help")).await.unwrap();
        assert_eq!(q.active_workers(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(q.active_workers(), 0);

        let result = q.submit(msg("+913333333333", "SM2", "help")).await.unwrap();
        assert_eq!(result.outcome(), Some(TurnOutcome::HelpShown));
    }
}
