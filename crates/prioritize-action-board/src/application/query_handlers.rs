//! Query handlers for the Action Board context.
//!
//! This module contains query handlers that load boards and subscriptions
//! and return read-only view DTOs.

use chrono::{DateTime, Utc};
use prioritize_core::error::DomainError;
use prioritize_core::event::SourceType;
use prioritize_core::listener::{Destination, EventListener};
use prioritize_registry::EventRegistry;
use serde::Serialize;
use uuid::Uuid;

use crate::application::command_handlers::load_board;
use crate::domain::aggregates::{ActionBoard, ActionBoardEntry, ENTRIES_PROPERTY};
use crate::domain::repository::ActionBoardRepository;

/// Read-only view of an action board.
#[derive(Debug, Serialize)]
pub struct ActionBoardView {
    /// The board identifier.
    pub board_id: i64,
    /// The board name.
    pub name: String,
    /// The board description.
    pub description: String,
    /// The object owning the board.
    pub owner: Option<Destination>,
    /// Number of posted entries.
    pub entry_count: usize,
    /// Posted entries, oldest first.
    pub entries: Vec<ActionBoardEntry>,
}

impl From<ActionBoard> for ActionBoardView {
    fn from(board: ActionBoard) -> Self {
        Self {
            board_id: board.id,
            name: board.name,
            description: board.description,
            owner: board.owner,
            entry_count: board.entries.len(),
            entries: board.entries,
        }
    }
}

/// Read-only view of one subscription.
#[derive(Debug, Serialize)]
pub struct SubscriberView {
    /// The listener backing the subscription.
    pub listener_id: Uuid,
    /// Who gets notified.
    pub subscriber: Destination,
    /// Whether the subscription ends after one notification.
    pub one_shot: bool,
    /// Lifetime in milliseconds, `-1` for never.
    pub lifetime_ms: i64,
    /// When the subscription was made.
    pub created_at: DateTime<Utc>,
}

impl From<&EventListener> for SubscriberView {
    fn from(listener: &EventListener) -> Self {
        Self {
            listener_id: listener.id(),
            subscriber: listener.destination(),
            one_shot: listener.is_one_shot(),
            lifetime_ms: listener.lifetime_ms(),
            created_at: listener.created_at(),
        }
    }
}

/// Retrieves a board by id.
///
/// # Errors
///
/// Returns `DomainError::ActionBoardNotFound` if the board does not exist.
pub async fn get_action_board_by_id(
    board_id: i64,
    repo: &dyn ActionBoardRepository,
) -> Result<ActionBoardView, DomainError> {
    Ok(load_board(board_id, repo).await?.into())
}

/// Retrieves a board by name, or `None` if no board carries `name`.
///
/// # Errors
///
/// Returns the repository's error if the lookup fails.
pub async fn get_action_board_by_name(
    name: &str,
    repo: &dyn ActionBoardRepository,
) -> Result<Option<ActionBoardView>, DomainError> {
    Ok(repo.find_board_by_name(name).await?.map(ActionBoardView::from))
}

/// Retrieves the board owned by `owner`, or `None` if it owns none.
///
/// # Errors
///
/// Returns the repository's error if the lookup fails.
pub async fn get_action_board_by_owner(
    owner: Destination,
    repo: &dyn ActionBoardRepository,
) -> Result<Option<ActionBoardView>, DomainError> {
    Ok(repo
        .find_board_by_owner(owner)
        .await?
        .map(ActionBoardView::from))
}

/// Lists the current subscriptions of a board, oldest first.
///
/// # Errors
///
/// Returns `DomainError::ActionBoardNotFound` if the board does not exist.
pub async fn list_subscribers(
    board_id: i64,
    registry: &EventRegistry,
    repo: &dyn ActionBoardRepository,
) -> Result<Vec<SubscriberView>, DomainError> {
    let board = load_board(board_id, repo).await?;
    let listeners = registry
        .get_event_listeners_registered_for(SourceType::ActionBoard, board.id, ENTRIES_PROPERTY)
        .await?;
    Ok(listeners.iter().map(SubscriberView::from).collect())
}
