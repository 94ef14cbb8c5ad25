//! In-memory implementation of the `EventStore` trait.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use prioritize_core::error::DomainError;
use prioritize_core::event::{Event, WatchKey};
use prioritize_core::listener::EventListener;
use prioritize_core::repository::EventStore;

#[derive(Debug)]
struct EventRow {
    event: Event,
    delivered: bool,
}

#[derive(Debug, Default)]
struct Tables {
    events: Vec<EventRow>,
    listeners: Vec<EventListener>,
}

/// Event store held in process memory. Rows keep insertion order.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    tables: Mutex<Tables>,
}

impl InMemoryEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, DomainError> {
        self.tables
            .lock()
            .map_err(|_| DomainError::Infrastructure("in-memory event store lock poisoned".into()))
    }

    /// Number of stored events.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store lock is poisoned.
    pub fn event_count(&self) -> Result<usize, DomainError> {
        Ok(self.tables()?.events.len())
    }

    /// Number of stored listeners.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store lock is poisoned.
    pub fn listener_count(&self) -> Result<usize, DomainError> {
        Ok(self.tables()?.listeners.len())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn insert_event(&self, event: &Event, delivered: bool) -> Result<(), DomainError> {
        let mut tables = self.tables()?;
        if tables.events.iter().any(|row| row.event.id() == event.id()) {
            return Err(DomainError::Infrastructure(format!(
                "duplicate event id {}",
                event.id()
            )));
        }
        tables.events.push(EventRow {
            event: event.clone(),
            delivered,
        });
        Ok(())
    }

    async fn find_event(&self, event_id: Uuid) -> Result<Option<Event>, DomainError> {
        Ok(self
            .tables()?
            .events
            .iter()
            .find(|row| row.event.id() == event_id)
            .map(|row| row.event.clone()))
    }

    async fn find_events_with_limited_lifetime(&self) -> Result<Vec<Event>, DomainError> {
        Ok(self
            .tables()?
            .events
            .iter()
            .filter(|row| row.event.has_limited_lifetime())
            .map(|row| row.event.clone())
            .collect())
    }

    async fn find_undelivered_events(&self) -> Result<Vec<Event>, DomainError> {
        let mut events: Vec<Event> = self
            .tables()?
            .events
            .iter()
            .filter(|row| !row.delivered)
            .map(|row| row.event.clone())
            .collect();
        events.sort_by_key(Event::event_date);
        Ok(events)
    }

    async fn mark_events_delivered(&self, event_ids: &[Uuid]) -> Result<(), DomainError> {
        let mut tables = self.tables()?;
        for row in &mut tables.events {
            if event_ids.contains(&row.event.id()) {
                row.delivered = true;
            }
        }
        Ok(())
    }

    async fn remove_events(&self, event_ids: &[Uuid]) -> Result<u64, DomainError> {
        let mut tables = self.tables()?;
        let before = tables.events.len();
        tables
            .events
            .retain(|row| !event_ids.contains(&row.event.id()));
        Ok((before - tables.events.len()) as u64)
    }

    async fn insert_listener(&self, listener: &EventListener) -> Result<(), DomainError> {
        let mut tables = self.tables()?;
        if tables.listeners.iter().any(|l| l.id() == listener.id()) {
            return Err(DomainError::Infrastructure(format!(
                "duplicate listener id {}",
                listener.id()
            )));
        }
        tables.listeners.push(listener.clone());
        Ok(())
    }

    async fn find_listener(&self, listener_id: Uuid) -> Result<Option<EventListener>, DomainError> {
        Ok(self
            .tables()?
            .listeners
            .iter()
            .find(|l| l.id() == listener_id)
            .cloned())
    }

    async fn find_listeners_by_key(
        &self,
        key: &WatchKey,
    ) -> Result<Vec<EventListener>, DomainError> {
        Ok(self
            .tables()?
            .listeners
            .iter()
            .filter(|l| l.key() == key)
            .cloned()
            .collect())
    }

    async fn find_listeners_with_limited_lifetime(
        &self,
    ) -> Result<Vec<EventListener>, DomainError> {
        Ok(self
            .tables()?
            .listeners
            .iter()
            .filter(|l| l.has_limited_lifetime())
            .cloned()
            .collect())
    }

    async fn remove_listeners(&self, listener_ids: &[Uuid]) -> Result<u64, DomainError> {
        let mut tables = self.tables()?;
        let before = tables.listeners.len();
        tables.listeners.retain(|l| !listener_ids.contains(&l.id()));
        Ok((before - tables.listeners.len()) as u64)
    }
}
