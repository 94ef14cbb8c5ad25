//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

use crate::listener::DestinationCategory;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No listener with the given identifier exists.
    #[error("event listener not found: {0}")]
    ListenerNotFound(Uuid),

    /// No stored event with the given identifier exists.
    #[error("event not found: {0}")]
    EventNotFound(Uuid),

    /// No action board with the given identifier exists.
    #[error("action board not found: {0}")]
    ActionBoardNotFound(i64),

    /// No action board entry with the given identifier exists.
    #[error("action board entry not found: {0}")]
    EntryNotFound(Uuid),

    /// A second, different consumer was registered for a destination category.
    #[error("a different consumer is already registered for destination category {0}")]
    DuplicateConsumer(DestinationCategory),

    /// A consumer failed to accept an event.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}
