mod config;
mod db;
mod dna;
mod errors;
mod llm_client;
mod models;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::dna::generation::LlmScenarioGenerator;
use crate::dna::scoring::OrdinalBucketScorer;
use crate::dna::session::SessionController;
use crate::dna::sink::PgResultSink;
use crate::dna::store::SessionStore;
use crate::llm_client::LlmClient;
use crate::models::listing::PgListingReader;
use crate::routes::build_router;
use crate::state::AppState;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Decision DNA API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url, config.database_max_connections).await?;

    // Initialize LLM client; the ladder enforces the per-call timeout, the
    // client timeout only guards against a hung connection.
    let llm = LlmClient::new(
        config.anthropic_api_key.clone(),
        config.dna.generation_timeout * 2,
    );
    let policy = config.dna.generation_policy();
    info!(
        "Scenario generation: tiers [{}], {} attempt(s) max, {:?} timeout",
        policy
            .tiers
            .iter()
            .map(|t| format!("{}={} x{}", t.name, t.model, t.attempts))
            .collect::<Vec<_>>()
            .join(", "),
        policy.max_attempts(),
        policy.timeout
    );

    let scorer = Arc::new(OrdinalBucketScorer::new(config.dna.bucket_boundaries()));
    let controller = SessionController::new(
        Arc::new(LlmScenarioGenerator::new(llm)),
        policy,
        scorer.clone(),
        Arc::new(PgResultSink::new(db.clone())),
    );

    // Evict finished, saved sessions once their retention has passed
    let sessions = Arc::new(SessionStore::new());
    {
        let sessions = sessions.clone();
        let retention = config.dna.finished_retention;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                sessions.sweep(retention).await;
            }
        });
    }

    // Build app state
    let state = AppState {
        controller,
        sessions,
        listings: Arc::new(PgListingReader::new(db)),
        scorer,
        dna: config.dna.clone(),
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
