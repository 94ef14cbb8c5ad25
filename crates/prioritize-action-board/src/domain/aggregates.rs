//! Aggregate roots for the Action Board context.

use chrono::{DateTime, Utc};
use prioritize_core::error::DomainError;
use prioritize_core::event::{Event, SourceType, WatchKey};
use prioritize_core::listener::Destination;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Property name subscribers watch and posts raise events for.
pub const ENTRIES_PROPERTY: &str = "entries";

/// A board that collects entries and notifies its subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionBoard {
    /// Board identifier, assigned by the repository.
    pub id: i64,
    /// Unique display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// The object owning this board, if any.
    pub owner: Option<Destination>,
    /// Posted entries, oldest first.
    pub entries: Vec<ActionBoardEntry>,
}

impl ActionBoard {
    /// Creates a board with no entries.
    #[must_use]
    pub fn new(
        id: i64,
        name: impl Into<String>,
        description: impl Into<String>,
        owner: Option<Destination>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            owner,
            entries: Vec::new(),
        }
    }

    /// The key subscribers of this board listen on.
    #[must_use]
    pub fn entries_key(&self) -> WatchKey {
        WatchKey::new(SourceType::ActionBoard, self.id, ENTRIES_PROPERTY)
    }

    /// Replaces name, description and owner.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `name` is blank.
    pub fn edit(
        &mut self,
        name: &str,
        description: &str,
        owner: Option<Destination>,
    ) -> Result<(), DomainError> {
        validate_name(name)?;
        name.clone_into(&mut self.name);
        description.clone_into(&mut self.description);
        self.owner = owner;
        Ok(())
    }

    /// Appends an entry.
    pub fn add_entry(&mut self, entry: ActionBoardEntry) {
        self.entries.push(entry);
    }

    /// Removes an entry, returning it if it was on this board.
    pub fn remove_entry(&mut self, entry_id: Uuid) -> Option<ActionBoardEntry> {
        let index = self.entries.iter().position(|e| e.id == entry_id)?;
        Some(self.entries.remove(index))
    }
}

/// A message posted to a board. The optional source event records what
/// prompted the post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionBoardEntry {
    /// Entry identifier.
    pub id: Uuid,
    /// The board this entry belongs to.
    pub board_id: i64,
    /// Short headline.
    pub title: String,
    /// Entry body.
    pub message: String,
    /// The event this entry was posted for.
    pub source: Option<Event>,
    /// When the entry was posted.
    pub posted_at: DateTime<Utc>,
}

/// Checks that a board name is usable.
///
/// # Errors
///
/// Returns `DomainError::Validation` if `name` is blank.
pub fn validate_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::Validation(
            "action board name must not be blank".into(),
        ));
    }
    Ok(())
}
