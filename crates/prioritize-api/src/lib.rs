//! Prioritize — HTTP API.
//!
//! Exposes action boards and their subscriptions over HTTP and wires the
//! event registry to the consumers that deliver notifications.

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod consumers;
pub mod error;
pub mod routes;
pub mod state;

use state::AppState;

/// Builds the full application router.
pub fn app(app_state: AppState) -> Router {
    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/action-boards", routes::action_board::router())
        .nest("/api/v1/events", routes::events::router())
        .nest("/api/v1/listeners", routes::listeners::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
