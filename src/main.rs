//! Ballot Assistant server
//!
//! Serves the chat RPC and the ballot endpoints over HTTP.

use ballot_assistant::api::{create_router, AppState};
use ballot_assistant::config::AppConfig;
use ballot_assistant::db::Database;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ballot_assistant=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    let seed_users = config.load_seed_users()?;
    for user in &seed_users {
        db.upsert_user(user)?;
    }
    if !seed_users.is_empty() {
        tracing::info!(count = seed_users.len(), "Provisioned seed users");
    }

    let catalog = Arc::new(config.load_catalog()?);
    tracing::info!(
        ceremony = catalog.ceremony().unwrap_or("unnamed"),
        categories = catalog.total_categories(),
        "Catalog loaded"
    );

    let llm = config.llm.build_service()?;
    match &llm {
        Some(service) => tracing::info!(model = %service.model_id(), "Completion endpoint configured"),
        None => tracing::warn!("No completion endpoint configured. Set OPENAI_API_KEY or LLM_GATEWAY."),
    }

    let state = AppState::new(db, catalog, llm, config.turn_timeout);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Ballot assistant listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
