//! Routes for action boards, their entries and subscribers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use prioritize_action_board::application::command_handlers;
use prioritize_action_board::application::query_handlers::{
    self, ActionBoardView, SubscriberView,
};
use prioritize_action_board::domain::commands;
use prioritize_core::error::DomainError;
use prioritize_core::listener::{Destination, DestinationCategory};
use prioritize_registry::DeliveryOutcome;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::events::describe;
use crate::state::AppState;

/// Request body for creating or editing a board.
#[derive(Debug, Deserialize)]
pub struct ActionBoardRequest {
    /// Board name.
    pub name: String,
    /// Board description.
    #[serde(default)]
    pub description: String,
    /// Owning object.
    #[serde(default)]
    pub owner: Option<Destination>,
}

/// Request body for POST /{board_id}/entries.
#[derive(Debug, Deserialize)]
pub struct PostEntryRequest {
    /// Entry headline.
    pub title: String,
    /// Entry body.
    #[serde(default)]
    pub message: String,
}

/// Request body for POST /{board_id}/subscribers.
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    /// Category of the subscriber.
    pub category: DestinationCategory,
    /// Identifier of the subscriber within its category.
    pub id: i64,
}

/// Response body returned after an entry is posted.
#[derive(Debug, Serialize)]
pub struct PostEntryResponse {
    /// The new entry.
    pub entry_id: Uuid,
    /// What happened to the notification: `dispatched`, `deferred`,
    /// `discarded` or `suppressed`.
    pub delivery: &'static str,
    /// Subscribers whose consumer accepted the notification.
    pub notified: usize,
}

impl From<(Uuid, DeliveryOutcome)> for PostEntryResponse {
    fn from((entry_id, outcome): (Uuid, DeliveryOutcome)) -> Self {
        let (delivery, report) = describe(outcome);
        Self {
            entry_id,
            delivery,
            notified: report.delivered,
        }
    }
}

/// Query parameters for GET /. Boards are looked up by name or by owner.
#[derive(Debug, Deserialize)]
pub struct FindActionBoardQuery {
    /// Exact board name.
    pub name: Option<String>,
    /// Category of the owning object.
    pub owner_category: Option<DestinationCategory>,
    /// Identifier of the owning object.
    pub owner_id: Option<i64>,
}

/// GET /?name=... or GET /?owner_category=...&owner_id=...
async fn find_action_boards(
    State(state): State<AppState>,
    Query(query): Query<FindActionBoardQuery>,
) -> Result<Json<Vec<ActionBoardView>>, ApiError> {
    let found = match (query.name, query.owner_category, query.owner_id) {
        (Some(name), None, None) => {
            query_handlers::get_action_board_by_name(&name, &*state.action_boards).await?
        }
        (None, Some(category), Some(id)) => {
            query_handlers::get_action_board_by_owner(
                Destination::new(category, id),
                &*state.action_boards,
            )
            .await?
        }
        _ => {
            return Err(DomainError::Validation(
                "query by name, or by owner_category and owner_id".into(),
            )
            .into());
        }
    };
    Ok(Json(found.into_iter().collect()))
}

/// POST /
#[instrument(skip(state, request), fields(name = %request.name))]
async fn create_action_board(
    State(state): State<AppState>,
    Json(request): Json<ActionBoardRequest>,
) -> Result<(StatusCode, Json<ActionBoardView>), ApiError> {
    let command = commands::CreateActionBoard {
        correlation_id: Uuid::new_v4(),
        name: request.name,
        description: request.description,
        owner: request.owner,
    };

    info!(correlation_id = %command.correlation_id, "handling create_action_board command");

    let board =
        command_handlers::handle_create_action_board(&command, &*state.action_boards).await?;

    Ok((StatusCode::CREATED, Json(board.into())))
}

/// GET /{board_id}
async fn get_action_board(
    State(state): State<AppState>,
    Path(board_id): Path<i64>,
) -> Result<Json<ActionBoardView>, ApiError> {
    let view = query_handlers::get_action_board_by_id(board_id, &*state.action_boards).await?;
    Ok(Json(view))
}

/// PUT /{board_id}
#[instrument(skip(state, request))]
async fn edit_action_board(
    State(state): State<AppState>,
    Path(board_id): Path<i64>,
    Json(request): Json<ActionBoardRequest>,
) -> Result<Json<ActionBoardView>, ApiError> {
    let command = commands::EditActionBoard {
        correlation_id: Uuid::new_v4(),
        board_id,
        name: request.name,
        description: request.description,
        owner: request.owner,
    };

    info!(correlation_id = %command.correlation_id, "handling edit_action_board command");

    let board =
        command_handlers::handle_edit_action_board(&command, &*state.action_boards).await?;

    Ok(Json(board.into()))
}

/// DELETE /{board_id}
#[instrument(skip(state))]
async fn remove_action_board(
    State(state): State<AppState>,
    Path(board_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let command = commands::RemoveActionBoard {
        correlation_id: Uuid::new_v4(),
        board_id,
    };

    info!(correlation_id = %command.correlation_id, "handling remove_action_board command");

    command_handlers::handle_remove_action_board(&command, &state.registry, &*state.action_boards)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /{board_id}/entries
#[instrument(skip(state, request))]
async fn post_entry(
    State(state): State<AppState>,
    Path(board_id): Path<i64>,
    Json(request): Json<PostEntryRequest>,
) -> Result<(StatusCode, Json<PostEntryResponse>), ApiError> {
    let command = commands::PostEntry {
        correlation_id: Uuid::new_v4(),
        board_id,
        title: request.title,
        message: request.message,
        source: None,
    };

    info!(correlation_id = %command.correlation_id, "handling post_entry command");

    let posted =
        command_handlers::handle_post_entry(&command, &state.registry, &*state.action_boards)
            .await?;

    Ok((
        StatusCode::CREATED,
        Json((posted.entry.id, posted.delivery).into()),
    ))
}

/// POST /{board_id}/subscribers
#[instrument(skip(state, request))]
async fn add_subscriber(
    State(state): State<AppState>,
    Path(board_id): Path<i64>,
    Json(request): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<SubscriberView>), ApiError> {
    let command = commands::AddSubscriber {
        correlation_id: Uuid::new_v4(),
        board_id,
        subscriber: Destination::new(request.category, request.id),
    };

    info!(correlation_id = %command.correlation_id, "handling add_subscriber command");

    let listener =
        command_handlers::handle_add_subscriber(&command, &state.registry, &*state.action_boards)
            .await?;

    Ok((StatusCode::CREATED, Json(SubscriberView::from(&listener))))
}

/// GET /{board_id}/subscribers
async fn list_subscribers(
    State(state): State<AppState>,
    Path(board_id): Path<i64>,
) -> Result<Json<Vec<SubscriberView>>, ApiError> {
    let views =
        query_handlers::list_subscribers(board_id, &state.registry, &*state.action_boards).await?;
    Ok(Json(views))
}

/// DELETE /{board_id}/subscribers/{listener_id}
#[instrument(skip(state))]
async fn remove_subscriber(
    State(state): State<AppState>,
    Path((board_id, listener_id)): Path<(i64, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let command = commands::RemoveSubscriber {
        correlation_id: Uuid::new_v4(),
        board_id,
        listener_id,
    };

    info!(correlation_id = %command.correlation_id, "handling remove_subscriber command");

    command_handlers::handle_remove_subscriber(&command, &state.registry, &*state.action_boards)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Returns the router for action boards.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_action_board).get(find_action_boards))
        .route(
            "/{board_id}",
            get(get_action_board)
                .put(edit_action_board)
                .delete(remove_action_board),
        )
        .route("/{board_id}/entries", post(post_entry))
        .route(
            "/{board_id}/subscribers",
            post(add_subscriber).get(list_subscribers),
        )
        .route(
            "/{board_id}/subscribers/{listener_id}",
            delete(remove_subscriber),
        )
}
