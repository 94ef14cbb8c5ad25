//! Routes for registering and removing event listeners directly.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use prioritize_core::error::DomainError;
use prioritize_core::event::SourceType;
use prioritize_core::listener::{Destination, EventListener};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct CreateListenerRequest {
    /// Category of the watched object.
    pub source_type: SourceType,
    /// Identifier of the watched object.
    pub source_id: i64,
    /// Name of the watched property.
    pub property_name: String,
    /// Who gets notified.
    pub destination: Destination,
    /// Remove the listener after its first notification.
    #[serde(default)]
    pub one_shot: bool,
    /// Listener lifetime in milliseconds, `-1` for never. The configured
    /// default when absent.
    pub lifetime_ms: Option<i64>,
}

/// POST /
#[instrument(skip(state, request), fields(destination = %request.destination))]
async fn create_listener(
    State(state): State<AppState>,
    Json(request): Json<CreateListenerRequest>,
) -> Result<(StatusCode, Json<EventListener>), ApiError> {
    let registry = &state.registry;
    let listener = match request.lifetime_ms {
        Some(lifetime_ms) => {
            registry
                .create_event_listener(
                    request.source_type,
                    request.source_id,
                    request.destination,
                    &request.property_name,
                    lifetime_ms,
                    request.one_shot,
                )
                .await?
        }
        None => {
            registry
                .create_event_listener_with_default_lifetime(
                    request.source_type,
                    request.source_id,
                    request.destination,
                    &request.property_name,
                    request.one_shot,
                )
                .await?
        }
    };

    info!(listener_id = %listener.id(), "listener registered");

    Ok((StatusCode::CREATED, Json(listener)))
}

/// GET /{listener_id}
async fn get_listener(
    State(state): State<AppState>,
    Path(listener_id): Path<Uuid>,
) -> Result<Json<EventListener>, ApiError> {
    Ok(Json(state.registry.find_event_listener(listener_id).await?))
}

/// DELETE /{listener_id}
#[instrument(skip(state))]
async fn remove_listener(
    State(state): State<AppState>,
    Path(listener_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !state.registry.remove_event_listener(listener_id).await? {
        return Err(DomainError::ListenerNotFound(listener_id).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Returns the router for event listeners.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_listener))
        .route("/{listener_id}", get(get_listener).delete(remove_listener))
}
