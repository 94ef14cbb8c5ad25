//! In-memory implementation of `ActionBoardRepository`.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use prioritize_core::error::DomainError;
use prioritize_core::listener::Destination;
use uuid::Uuid;

use crate::domain::aggregates::{ActionBoard, ActionBoardEntry};
use crate::domain::repository::ActionBoardRepository;

#[derive(Debug, Default)]
struct Boards {
    next_id: i64,
    boards: Vec<ActionBoard>,
}

/// Action board repository held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryActionBoardRepository {
    inner: Mutex<Boards>,
}

impl InMemoryActionBoardRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn boards(&self) -> Result<MutexGuard<'_, Boards>, DomainError> {
        self.inner.lock().map_err(|_| {
            DomainError::Infrastructure("in-memory action board repository lock poisoned".into())
        })
    }
}

#[async_trait]
impl ActionBoardRepository for InMemoryActionBoardRepository {
    async fn create_board(
        &self,
        name: &str,
        description: &str,
        owner: Option<Destination>,
    ) -> Result<ActionBoard, DomainError> {
        let mut inner = self.boards()?;
        if inner.boards.iter().any(|b| b.name == name) {
            return Err(DomainError::Validation(format!(
                "action board name already in use: {name}"
            )));
        }
        inner.next_id += 1;
        let board = ActionBoard::new(inner.next_id, name, description, owner);
        inner.boards.push(board.clone());
        Ok(board)
    }

    async fn find_board_by_id(&self, board_id: i64) -> Result<Option<ActionBoard>, DomainError> {
        Ok(self
            .boards()?
            .boards
            .iter()
            .find(|b| b.id == board_id)
            .cloned())
    }

    async fn find_board_by_name(&self, name: &str) -> Result<Option<ActionBoard>, DomainError> {
        Ok(self
            .boards()?
            .boards
            .iter()
            .find(|b| b.name == name)
            .cloned())
    }

    async fn find_board_by_owner(
        &self,
        owner: Destination,
    ) -> Result<Option<ActionBoard>, DomainError> {
        Ok(self
            .boards()?
            .boards
            .iter()
            .find(|b| b.owner == Some(owner))
            .cloned())
    }

    async fn update_board(&self, board: &ActionBoard) -> Result<(), DomainError> {
        let mut inner = self.boards()?;
        if inner
            .boards
            .iter()
            .any(|b| b.id != board.id && b.name == board.name)
        {
            return Err(DomainError::Validation(format!(
                "action board name already in use: {}",
                board.name
            )));
        }
        let stored = inner
            .boards
            .iter_mut()
            .find(|b| b.id == board.id)
            .ok_or(DomainError::ActionBoardNotFound(board.id))?;
        stored.name.clone_from(&board.name);
        stored.description.clone_from(&board.description);
        stored.owner = board.owner;
        Ok(())
    }

    async fn remove_board(&self, board_id: i64) -> Result<bool, DomainError> {
        let mut inner = self.boards()?;
        let before = inner.boards.len();
        inner.boards.retain(|b| b.id != board_id);
        Ok(inner.boards.len() < before)
    }

    async fn insert_entry(&self, entry: &ActionBoardEntry) -> Result<(), DomainError> {
        let mut inner = self.boards()?;
        let board = inner
            .boards
            .iter_mut()
            .find(|b| b.id == entry.board_id)
            .ok_or(DomainError::ActionBoardNotFound(entry.board_id))?;
        board.add_entry(entry.clone());
        Ok(())
    }

    async fn find_entry(&self, entry_id: Uuid) -> Result<Option<ActionBoardEntry>, DomainError> {
        Ok(self
            .boards()?
            .boards
            .iter()
            .flat_map(|b| b.entries.iter())
            .find(|e| e.id == entry_id)
            .cloned())
    }

    async fn remove_entry(&self, entry_id: Uuid) -> Result<bool, DomainError> {
        let mut inner = self.boards()?;
        Ok(inner
            .boards
            .iter_mut()
            .any(|b| b.remove_entry(entry_id).is_some()))
    }
}
