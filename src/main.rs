use std::sync::Arc;

use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use plugin_verify::app_state::AppState;
use plugin_verify::config::AppConfig;
use plugin_verify::db::{self, store::PgStore};
use plugin_verify::routes;
use plugin_verify::services::{
    analyzer::Analyzer,
    chunker::Chunker,
    llm::{ChatModel, OpenRouterClient},
    notifier::{NotificationFanout, WebhookSink},
    processor::VerificationProcessor,
    source::{R2SourceStore, SourceStore},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing plugin-verify server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!(
        "verification_jobs_total",
        "Total verification jobs enqueued"
    );
    metrics::describe_counter!(
        "verification_jobs_completed",
        "Total verification jobs completed"
    );
    metrics::describe_counter!(
        "verification_jobs_failed",
        "Total verification jobs that failed"
    );
    metrics::describe_counter!(
        "verification_checks_errored",
        "Total checks that ended in the error state"
    );
    metrics::describe_counter!(
        "verification_analysis_fallbacks_total",
        "Chunk analyses degraded to the fallback verdict"
    );
    metrics::describe_counter!(
        "verification_notifications_failed",
        "Completion notifications that could not be delivered"
    );
    metrics::describe_histogram!(
        "verification_processing_seconds",
        "Time to process one verification job"
    );
    metrics::describe_histogram!(
        "verification_llm_request_seconds",
        "Latency of one model call"
    );

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Initialize source storage client
    tracing::info!("Initializing source storage client");
    let sources: Arc<dyn SourceStore> = Arc::new(
        R2SourceStore::new(
            &config.source_bucket,
            &config.source_endpoint,
            &config.source_access_key,
            &config.source_secret_key,
        )
        .expect("Failed to initialize source storage client"),
    );

    // Initialize LLM client
    tracing::info!(model = %config.llm_model, "Initializing LLM client");
    let llm: Arc<dyn ChatModel> =
        Arc::new(OpenRouterClient::new(config.llm()).expect("Failed to initialize LLM client"));

    let fanout = config
        .notify_webhook_url
        .clone()
        .map(|endpoint| NotificationFanout::new(Arc::new(WebhookSink::new(endpoint))));

    let store = Arc::new(PgStore::new(db_pool.clone()));
    let processor = Arc::new(VerificationProcessor::new(
        store.clone(),
        sources,
        Analyzer::new(llm),
        Chunker::default(),
        fanout,
    ));

    // Create shared application state
    let state = AppState::new(db_pool, store, processor);

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/api/v1/plugins/{plugin_id}/verify",
            post(routes::verify::enqueue_verification),
        )
        .route(
            "/api/v1/plugins/{plugin_id}/checks",
            get(routes::verify::get_checks),
        )
        .route(
            "/api/v1/plugins/{plugin_id}/queue",
            get(routes::verify::get_queue_status),
        )
        .route("/api/v1/queue/process", post(routes::verify::process_batch))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1 MB limit

    tracing::info!("Starting plugin-verify on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
