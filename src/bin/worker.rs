use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

use plugin_verify::config::AppConfig;
use plugin_verify::db::{self, store::PgStore};
use plugin_verify::services::{
    analyzer::Analyzer,
    chunker::Chunker,
    llm::{ChatModel, OpenRouterClient},
    notifier::{NotificationFanout, WebhookSink},
    processor::VerificationProcessor,
    source::{R2SourceStore, SourceStore},
};

const POLL_INTERVAL_MS: u64 = 1000; // 1 second

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting plugin verification worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Initialize database
    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Initialize services
    tracing::info!("Initializing services");
    let sources: Arc<dyn SourceStore> = Arc::new(
        R2SourceStore::new(
            &config.source_bucket,
            &config.source_endpoint,
            &config.source_access_key,
            &config.source_secret_key,
        )
        .expect("Failed to initialize source storage client"),
    );

    let llm: Arc<dyn ChatModel> =
        Arc::new(OpenRouterClient::new(config.llm()).expect("Failed to initialize LLM client"));

    let fanout = config
        .notify_webhook_url
        .clone()
        .map(|endpoint| NotificationFanout::new(Arc::new(WebhookSink::new(endpoint))));

    let store = Arc::new(PgStore::new(db_pool));
    let processor = VerificationProcessor::new(
        store,
        sources,
        Analyzer::new(llm),
        Chunker::default(),
        fanout,
    );

    tracing::info!(batch_size = config.batch_size, "Worker ready, starting batch loop");

    // Main processing loop: one batch per pass, sleep when the queue is idle.
    loop {
        match processor.process_batch(config.batch_size).await {
            Ok(outcomes) if outcomes.is_empty() => {
                tracing::trace!("No jobs queued, sleeping");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
            Ok(outcomes) => {
                tracing::debug!(processed = outcomes.len(), "Batch processed");
            }
            Err(e) => {
                tracing::error!(error = %e, "Batch pass failed, will retry");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
        }
    }
}
