//! Persistence abstraction for action boards and their entries.

use async_trait::async_trait;
use prioritize_core::error::DomainError;
use prioritize_core::listener::Destination;
use uuid::Uuid;

use super::aggregates::{ActionBoard, ActionBoardEntry};

/// Store for [`ActionBoard`]s. Boards are returned with their entries,
/// oldest first.
#[async_trait]
pub trait ActionBoardRepository: Send + Sync {
    /// Persists a new board and returns it with its assigned id.
    ///
    /// Fails with `DomainError::Validation` if the name is already taken.
    async fn create_board(
        &self,
        name: &str,
        description: &str,
        owner: Option<Destination>,
    ) -> Result<ActionBoard, DomainError>;

    /// Loads a board by id.
    async fn find_board_by_id(&self, board_id: i64) -> Result<Option<ActionBoard>, DomainError>;

    /// Loads a board by its name.
    async fn find_board_by_name(&self, name: &str) -> Result<Option<ActionBoard>, DomainError>;

    /// Loads the first board owned by `owner`.
    async fn find_board_by_owner(
        &self,
        owner: Destination,
    ) -> Result<Option<ActionBoard>, DomainError>;

    /// Saves name, description and owner of an existing board.
    ///
    /// Fails with `DomainError::ActionBoardNotFound` if the board is gone.
    async fn update_board(&self, board: &ActionBoard) -> Result<(), DomainError>;

    /// Deletes a board and its entries. Returns `false` if it did not exist.
    async fn remove_board(&self, board_id: i64) -> Result<bool, DomainError>;

    /// Persists an entry on its board.
    async fn insert_entry(&self, entry: &ActionBoardEntry) -> Result<(), DomainError>;

    /// Loads a single entry.
    async fn find_entry(&self, entry_id: Uuid) -> Result<Option<ActionBoardEntry>, DomainError>;

    /// Deletes an entry. Returns `false` if it did not exist.
    async fn remove_entry(&self, entry_id: Uuid) -> Result<bool, DomainError>;
}
