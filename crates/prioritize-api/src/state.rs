//! Shared application state.

use std::fmt;
use std::sync::Arc;

use prioritize_action_board::domain::repository::ActionBoardRepository;
use prioritize_registry::EventRegistry;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The event registry subscriptions and posts go through.
    pub registry: Arc<EventRegistry>,
    /// Action board persistence.
    pub action_boards: Arc<dyn ActionBoardRepository>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(registry: Arc<EventRegistry>, action_boards: Arc<dyn ActionBoardRepository>) -> Self {
        Self {
            registry,
            action_boards,
        }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
