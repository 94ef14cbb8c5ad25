//! Durable store abstraction for events and listeners.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::{Event, WatchKey};
use crate::listener::EventListener;

/// Store for [`Event`] and [`EventListener`] rows.
///
/// Implementations make each call atomic on its own; the registry brackets
/// multi-call operations itself. Listener queries return rows in creation
/// order and event queries in event-date order.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persists an event. `delivered` records whether it has already been
    /// handed to its listeners.
    async fn insert_event(&self, event: &Event, delivered: bool) -> Result<(), DomainError>;

    /// Loads a single event.
    async fn find_event(&self, event_id: Uuid) -> Result<Option<Event>, DomainError>;

    /// Loads every event whose lifetime is greater than zero.
    async fn find_events_with_limited_lifetime(&self) -> Result<Vec<Event>, DomainError>;

    /// Loads every event not yet delivered.
    async fn find_undelivered_events(&self) -> Result<Vec<Event>, DomainError>;

    /// Flags the given events as delivered. Unknown ids are ignored.
    async fn mark_events_delivered(&self, event_ids: &[Uuid]) -> Result<(), DomainError>;

    /// Deletes the given events and returns how many rows were removed.
    async fn remove_events(&self, event_ids: &[Uuid]) -> Result<u64, DomainError>;

    /// Persists a listener.
    async fn insert_listener(&self, listener: &EventListener) -> Result<(), DomainError>;

    /// Loads a single listener.
    async fn find_listener(&self, listener_id: Uuid) -> Result<Option<EventListener>, DomainError>;

    /// Loads every listener whose watch key equals `key`.
    async fn find_listeners_by_key(&self, key: &WatchKey)
    -> Result<Vec<EventListener>, DomainError>;

    /// Loads every listener whose lifetime is greater than zero.
    async fn find_listeners_with_limited_lifetime(&self) -> Result<Vec<EventListener>, DomainError>;

    /// Deletes the given listeners and returns how many rows were removed.
    async fn remove_listeners(&self, listener_ids: &[Uuid]) -> Result<u64, DomainError>;
}
