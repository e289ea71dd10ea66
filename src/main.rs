//! thuk server binary.
//!
//! Loads configuration, connects to PostgreSQL, wires the adapters into the
//! message pipeline and serves the webhook.

use std::sync::Arc;

use sqlx::PgPool;
use tracing_subscriber::{fmt, EnvFilter};

use thuk::adapters::ai::{OpenAIConfig, OpenAIProvider};
use thuk::adapters::http::{app_router, WebhookState};
use thuk::adapters::media::{OpenAIVisionExtractor, TwilioMediaFetcher, UnconfiguredMedia, WhisperTranscriber};
use thuk::adapters::messaging::{LoggingSender, TwilioSender};
use thuk::adapters::postgres::{
    PostgresCategoryRepository, PostgresConversationStore, PostgresLedger, PostgresProcessedMessageStore,
};
use thuk::adapters::resilience::RetryPolicy;
use thuk::application::{
    CategoryHandler, ConversationQueue, ExpenseHandler, HandlerSet, MessageNormalizer, PipelinePorts,
    ProcessMessageHandler, QueryHandler, SplitHandler,
};
use thuk::config::AppConfig;
use thuk::domain::parsing::TextParser;
use thuk::domain::reply::ReplyComposer;
use thuk::domain::routing::IntentRouter;
use thuk::ports::{AIProvider, MediaFetcher, MessageSender, Transcriber, VisionExtractor};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    tracing::info!(environment = ?config.server.environment, "starting thuk");

    let pool = connect(&config).await?;
    let pipeline = build_pipeline(&config, pool)?;
    let queue = ConversationQueue::new(Arc::new(pipeline)).with_idle_timeout(config.assistant.worker_idle());

    let app = app_router(WebhookState::new(queue), config.server.request_timeout());
    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    tracing::info!("shut down");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    let builder = fmt().with_env_filter(filter).with_target(true);
    if config.server.use_json_logs() {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn connect(config: &AppConfig) -> Result<PgPool, BoxError> {
    let pool = config.database.pool_options().connect(&config.database.url).await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("migrations applied");
    }
    Ok(pool)
}

fn build_pipeline(config: &AppConfig, pool: PgPool) -> Result<ProcessMessageHandler, BoxError> {
    let retry = RetryPolicy::from_config(&config.ai);
    let ledger = Arc::new(PostgresLedger::new(pool.clone()));
    let categories = Arc::new(PostgresCategoryRepository::new(pool.clone()));

    let openai = OpenAIConfig::from_settings(&config.ai);
    let ai: Option<Arc<dyn AIProvider>> = openai
        .clone()
        .map(|c| Arc::new(OpenAIProvider::new(c)) as Arc<dyn AIProvider>);
    if ai.is_none() {
        tracing::warn!("no OpenAI key configured; category guessing, receipts and voice notes are disabled");
    }

    let (transcriber, vision) = match openai {
        Some(c) => (
            Arc::new(WhisperTranscriber::new(c.clone(), config.ai.transcription_model.clone())) as Arc<dyn Transcriber>,
            Arc::new(OpenAIVisionExtractor::new(c.with_model(config.ai.vision_model.clone()))) as Arc<dyn VisionExtractor>,
        ),
        None => (
            Arc::new(UnconfiguredMedia) as Arc<dyn Transcriber>,
            Arc::new(UnconfiguredMedia) as Arc<dyn VisionExtractor>,
        ),
    };

    let messaging = &config.messaging;
    let twilio = (
        TwilioSender::from_settings(messaging, retry),
        messaging.twilio_account_sid.clone(),
        messaging.twilio_auth_token.clone(),
    );
    let (fetcher, sender) = match twilio {
        (Some(sender), Some(sid), Some(token)) => (
            Arc::new(TwilioMediaFetcher::new(sid, token, retry)) as Arc<dyn MediaFetcher>,
            Arc::new(sender) as Arc<dyn MessageSender>,
        ),
        _ => {
            tracing::warn!("Twilio is not configured; replies are only logged");
            (
                Arc::new(UnconfiguredMedia) as Arc<dyn MediaFetcher>,
                Arc::new(LoggingSender::new()) as Arc<dyn MessageSender>,
            )
        }
    };

    let mut expense = ExpenseHandler::new(ledger.clone(), categories.clone());
    if let Some(ai) = &ai {
        expense = expense.with_ai(ai.clone());
    }

    let pipeline = ProcessMessageHandler::new(
        PipelinePorts {
            conversations: Arc::new(
                PostgresConversationStore::new(pool.clone()).with_turn_window(config.assistant.recent_turn_window),
            ),
            processed: Arc::new(PostgresProcessedMessageStore::new(pool)),
            categories: categories.clone(),
            sender,
            ai,
        },
        MessageNormalizer::new(fetcher, transcriber, vision).with_utc_offset(config.assistant.utc_offset()?),
        IntentRouter::new(TextParser::new(config.assistant.currency()?)),
        HandlerSet::new(
            expense,
            QueryHandler::new(ledger.clone()),
            SplitHandler::new(ledger),
            CategoryHandler::new(categories),
        ),
        ReplyComposer::new(config.assistant.locale()?),
    )
    .with_turn_window(config.assistant.recent_turn_window);

    Ok(pipeline)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
