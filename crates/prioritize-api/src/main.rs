//! Prioritize API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use envconfig::Envconfig;
use prioritize_action_board::domain::repository::ActionBoardRepository;
use prioritize_action_board::infrastructure::{
    InMemoryActionBoardRepository, PgActionBoardRepository,
};
use prioritize_api::consumers::default_consumers;
use prioritize_api::error::AppError;
use prioritize_api::state::AppState;
use prioritize_core::clock::SystemClock;
use prioritize_core::config::EventSettings;
use prioritize_core::repository::EventStore;
use prioritize_event_store::{InMemoryEventStore, PgEventStore};
use prioritize_registry::{EventRegistry, spawn_sweeper};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Prioritize API server");

    // Read configuration from environment.
    let settings = EventSettings::init_from_env()
        .map_err(|e| AppError::Config(format!("invalid event settings: {e}")))?;
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .map_err(|e| AppError::Config(format!("PORT must be a valid u16: {e}")))?;

    let (store, action_boards) = build_stores().await?;

    let registry = Arc::new(EventRegistry::initialize(
        settings.clone(),
        store,
        Arc::new(SystemClock),
        default_consumers(),
    )?);
    tracing::info!(
        strategy = %settings.strategy,
        sweep_interval_ms = settings.sweep_interval_ms,
        "event registry ready"
    );

    let sweeper = settings
        .sweep_interval()
        .and_then(|interval| spawn_sweeper(Arc::clone(&registry), interval));

    let app = prioritize_api::app(AppState::new(registry, action_boards));

    // Start server.
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    tracing::info!("Prioritize API server stopped");

    Ok(())
}

/// Picks PostgreSQL when `DATABASE_URL` is set, in-memory stores otherwise.
async fn build_stores()
-> Result<(Arc<dyn EventStore>, Arc<dyn ActionBoardRepository>), AppError> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        tracing::warn!("DATABASE_URL not set; events and boards are kept in memory");
        return Ok((
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemoryActionBoardRepository::new()),
        ));
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;

    Ok((
        Arc::new(PgEventStore::new(pool.clone())),
        Arc::new(PgActionBoardRepository::new(pool)),
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
