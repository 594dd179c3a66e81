mod config;
mod db;
mod errors;
mod evaluation;
mod llm_client;
mod models;
mod routes;
mod state;
mod store;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::db::create_pool;
use crate::evaluation::judgment::JudgmentClient;
use crate::evaluation::orchestrator::Orchestrator;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{EvaluationStore, PgEvaluationStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting evaluator v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    let store: Arc<dyn EvaluationStore> = Arc::new(PgEvaluationStore::new(db));

    // Initialize the judgment oracle
    let llm = LlmClient::new(
        config.anthropic_api_key.clone(),
        config.oracle_base_url.clone(),
    )?;
    info!("Judgment oracle initialized (model: {})", llm_client::MODEL);

    let judgment_client = Arc::new(JudgmentClient::new(Arc::new(llm), config.judgment_timeout));
    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        judgment_client,
        config.max_concurrent_judgments,
    ));
    info!(
        max_concurrent = config.max_concurrent_judgments,
        timeout_secs = config.judgment_timeout.as_secs(),
        "Evaluation pipeline ready"
    );

    // Build app state
    let state = AppState {
        store,
        orchestrator,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
