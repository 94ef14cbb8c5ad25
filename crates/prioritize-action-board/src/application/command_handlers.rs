//! Command handlers for the Action Board context.
//!
//! Each handler loads the board it works on, applies the change through the
//! repository and, where subscribers are involved, goes through the event
//! registry.

use prioritize_core::clock::Clock;
use prioritize_core::error::DomainError;
use prioritize_core::event::SourceType;
use prioritize_core::listener::{EventListener, NEVER_EXPIRES};
use prioritize_registry::{DeliveryOutcome, EventRegistry};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{ActionBoard, ActionBoardEntry, ENTRIES_PROPERTY, validate_name};
use crate::domain::commands::{
    AddSubscriber, CreateActionBoard, EditActionBoard, PostEntry, RemoveActionBoard, RemoveEntry,
    RemoveSubscriber,
};
use crate::domain::repository::ActionBoardRepository;

/// Result of a successful post.
#[derive(Debug, Clone)]
pub struct PostedEntry {
    /// The persisted entry.
    pub entry: ActionBoardEntry,
    /// What the registry did with the resulting event.
    pub delivery: DeliveryOutcome,
}

/// Loads a board or fails with `ActionBoardNotFound`.
///
/// # Errors
///
/// Returns `DomainError::ActionBoardNotFound` if the board does not exist,
/// or the repository's error if the lookup fails.
pub(crate) async fn load_board(
    board_id: i64,
    repo: &dyn ActionBoardRepository,
) -> Result<ActionBoard, DomainError> {
    repo.find_board_by_id(board_id)
        .await?
        .ok_or(DomainError::ActionBoardNotFound(board_id))
}

/// Handles the `CreateActionBoard` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the name is blank or taken.
#[instrument(skip(command, repo), fields(correlation_id = %command.correlation_id))]
pub async fn handle_create_action_board(
    command: &CreateActionBoard,
    repo: &dyn ActionBoardRepository,
) -> Result<ActionBoard, DomainError> {
    validate_name(&command.name)?;
    let board = repo
        .create_board(&command.name, &command.description, command.owner)
        .await?;
    info!(board_id = board.id, name = %board.name, "action board created");
    Ok(board)
}

/// Handles the `EditActionBoard` command.
///
/// # Errors
///
/// Returns `DomainError::ActionBoardNotFound` if the board does not exist,
/// or `DomainError::Validation` if the new name is blank or taken.
#[instrument(skip(command, repo), fields(correlation_id = %command.correlation_id, board_id = command.board_id))]
pub async fn handle_edit_action_board(
    command: &EditActionBoard,
    repo: &dyn ActionBoardRepository,
) -> Result<ActionBoard, DomainError> {
    let mut board = load_board(command.board_id, repo).await?;
    board.edit(&command.name, &command.description, command.owner)?;
    repo.update_board(&board).await?;
    info!("action board edited");
    Ok(board)
}

/// Handles the `RemoveActionBoard` command. Subscriptions to the board are
/// removed along with it.
///
/// # Errors
///
/// Returns `DomainError::ActionBoardNotFound` if the board does not exist.
#[instrument(skip(command, registry, repo), fields(correlation_id = %command.correlation_id, board_id = command.board_id))]
pub async fn handle_remove_action_board(
    command: &RemoveActionBoard,
    registry: &EventRegistry,
    repo: &dyn ActionBoardRepository,
) -> Result<(), DomainError> {
    let board = load_board(command.board_id, repo).await?;
    let subscribers = registry
        .get_event_listeners_registered_for(SourceType::ActionBoard, board.id, ENTRIES_PROPERTY)
        .await?;
    for subscriber in &subscribers {
        registry.remove_event_listener(subscriber.id()).await?;
    }
    if !repo.remove_board(board.id).await? {
        return Err(DomainError::ActionBoardNotFound(board.id));
    }
    info!(subscribers = subscribers.len(), "action board removed");
    Ok(())
}

/// Handles the `PostEntry` command: persists the entry, then raises an
/// `entries` event for the board so its subscribers are notified.
///
/// # Errors
///
/// Returns `DomainError::ActionBoardNotFound` if the board does not exist,
/// `DomainError::Validation` if the title is blank, or the registry's error
/// if the event cannot be matched against the listeners.
#[instrument(skip(command, registry, repo), fields(correlation_id = %command.correlation_id, board_id = command.board_id))]
pub async fn handle_post_entry(
    command: &PostEntry,
    registry: &EventRegistry,
    repo: &dyn ActionBoardRepository,
) -> Result<PostedEntry, DomainError> {
    if command.title.trim().is_empty() {
        return Err(DomainError::Validation(
            "entry title must not be blank".into(),
        ));
    }
    let board = load_board(command.board_id, repo).await?;

    let entry = ActionBoardEntry {
        id: Uuid::new_v4(),
        board_id: board.id,
        title: command.title.clone(),
        message: command.message.clone(),
        source: command.source.clone(),
        posted_at: registry.clock().now(),
    };
    repo.insert_entry(&entry).await?;

    let delivery = registry
        .raise_event(SourceType::ActionBoard, board.id, ENTRIES_PROPERTY, "", "", 0)
        .await?;
    info!(entry_id = %entry.id, ?delivery, "entry posted");
    Ok(PostedEntry { entry, delivery })
}

/// Handles the `RemoveEntry` command.
///
/// # Errors
///
/// Returns `DomainError::EntryNotFound` if no entry has the given id.
#[instrument(skip(command, repo), fields(correlation_id = %command.correlation_id, entry_id = %command.entry_id))]
pub async fn handle_remove_entry(
    command: &RemoveEntry,
    repo: &dyn ActionBoardRepository,
) -> Result<(), DomainError> {
    if !repo.remove_entry(command.entry_id).await? {
        return Err(DomainError::EntryNotFound(command.entry_id));
    }
    info!("entry removed");
    Ok(())
}

/// Handles the `AddSubscriber` command: registers a one-shot listener on the
/// board's entries that never expires by time.
///
/// # Errors
///
/// Returns `DomainError::ActionBoardNotFound` if the board does not exist.
#[instrument(skip(command, registry, repo), fields(correlation_id = %command.correlation_id, board_id = command.board_id))]
pub async fn handle_add_subscriber(
    command: &AddSubscriber,
    registry: &EventRegistry,
    repo: &dyn ActionBoardRepository,
) -> Result<EventListener, DomainError> {
    let board = load_board(command.board_id, repo).await?;
    let listener = registry
        .create_event_listener(
            SourceType::ActionBoard,
            board.id,
            command.subscriber,
            ENTRIES_PROPERTY,
            NEVER_EXPIRES,
            true,
        )
        .await?;
    info!(listener_id = %listener.id(), subscriber = %command.subscriber, "subscriber added");
    Ok(listener)
}

/// Handles the `RemoveSubscriber` command.
///
/// # Errors
///
/// Returns `DomainError::ActionBoardNotFound` if the board does not exist, or
/// `DomainError::ListenerNotFound` if no subscription of this board has the
/// given listener id.
#[instrument(skip(command, registry, repo), fields(correlation_id = %command.correlation_id, board_id = command.board_id))]
pub async fn handle_remove_subscriber(
    command: &RemoveSubscriber,
    registry: &EventRegistry,
    repo: &dyn ActionBoardRepository,
) -> Result<(), DomainError> {
    let board = load_board(command.board_id, repo).await?;
    let listener = registry.find_event_listener(command.listener_id).await?;
    if *listener.key() != board.entries_key()
        || !registry.remove_event_listener(listener.id()).await?
    {
        return Err(DomainError::ListenerNotFound(command.listener_id));
    }
    info!(listener_id = %command.listener_id, "subscriber removed");
    Ok(())
}
