//! Test stores — mock `EventStore` implementations for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use prioritize_core::error::DomainError;
use prioritize_core::event::{Event, WatchKey};
use prioritize_core::listener::EventListener;
use prioritize_core::repository::EventStore;
use uuid::Uuid;

fn connection_refused() -> DomainError {
    DomainError::Infrastructure("connection refused".into())
}

/// An event store that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventStore;

#[async_trait]
impl EventStore for FailingEventStore {
    async fn insert_event(&self, _event: &Event, _delivered: bool) -> Result<(), DomainError> {
        Err(connection_refused())
    }

    async fn find_event(&self, _event_id: Uuid) -> Result<Option<Event>, DomainError> {
        Err(connection_refused())
    }

    async fn find_events_with_limited_lifetime(&self) -> Result<Vec<Event>, DomainError> {
        Err(connection_refused())
    }

    async fn find_undelivered_events(&self) -> Result<Vec<Event>, DomainError> {
        Err(connection_refused())
    }

    async fn mark_events_delivered(&self, _event_ids: &[Uuid]) -> Result<(), DomainError> {
        Err(connection_refused())
    }

    async fn remove_events(&self, _event_ids: &[Uuid]) -> Result<u64, DomainError> {
        Err(connection_refused())
    }

    async fn insert_listener(&self, _listener: &EventListener) -> Result<(), DomainError> {
        Err(connection_refused())
    }

    async fn find_listener(&self, _listener_id: Uuid) -> Result<Option<EventListener>, DomainError> {
        Err(connection_refused())
    }

    async fn find_listeners_by_key(
        &self,
        _key: &WatchKey,
    ) -> Result<Vec<EventListener>, DomainError> {
        Err(connection_refused())
    }

    async fn find_listeners_with_limited_lifetime(
        &self,
    ) -> Result<Vec<EventListener>, DomainError> {
        Err(connection_refused())
    }

    async fn remove_listeners(&self, _listener_ids: &[Uuid]) -> Result<u64, DomainError> {
        Err(connection_refused())
    }
}

/// Wraps a working store and fails selected calls on demand. Useful for
/// testing what survives a store outage in the middle of an operation.
pub struct FlakyEventStore {
    inner: Arc<dyn EventStore>,
    lookups_left: AtomicUsize,
    removals_fail: AtomicBool,
}

impl FlakyEventStore {
    /// Creates a wrapper that passes every call through.
    #[must_use]
    pub fn new(inner: Arc<dyn EventStore>) -> Self {
        Self {
            inner,
            lookups_left: AtomicUsize::new(usize::MAX),
            removals_fail: AtomicBool::new(false),
        }
    }

    /// Lets `count` more listener lookups by key succeed, then fails the rest.
    pub fn fail_lookups_after(&self, count: usize) {
        self.lookups_left.store(count, Ordering::SeqCst);
    }

    /// Makes every listener removal fail.
    pub fn fail_listener_removals(&self) {
        self.removals_fail.store(true, Ordering::SeqCst);
    }

    /// Passes every call through again.
    pub fn recover(&self) {
        self.lookups_left.store(usize::MAX, Ordering::SeqCst);
        self.removals_fail.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventStore for FlakyEventStore {
    async fn insert_event(&self, event: &Event, delivered: bool) -> Result<(), DomainError> {
        self.inner.insert_event(event, delivered).await
    }

    async fn find_event(&self, event_id: Uuid) -> Result<Option<Event>, DomainError> {
        self.inner.find_event(event_id).await
    }

    async fn find_events_with_limited_lifetime(&self) -> Result<Vec<Event>, DomainError> {
        self.inner.find_events_with_limited_lifetime().await
    }

    async fn find_undelivered_events(&self) -> Result<Vec<Event>, DomainError> {
        self.inner.find_undelivered_events().await
    }

    async fn mark_events_delivered(&self, event_ids: &[Uuid]) -> Result<(), DomainError> {
        self.inner.mark_events_delivered(event_ids).await
    }

    async fn remove_events(&self, event_ids: &[Uuid]) -> Result<u64, DomainError> {
        self.inner.remove_events(event_ids).await
    }

    async fn insert_listener(&self, listener: &EventListener) -> Result<(), DomainError> {
        self.inner.insert_listener(listener).await
    }

    async fn find_listener(&self, listener_id: Uuid) -> Result<Option<EventListener>, DomainError> {
        self.inner.find_listener(listener_id).await
    }

    async fn find_listeners_by_key(
        &self,
        key: &WatchKey,
    ) -> Result<Vec<EventListener>, DomainError> {
        let allowed = self
            .lookups_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(connection_refused());
        }
        self.inner.find_listeners_by_key(key).await
    }

    async fn find_listeners_with_limited_lifetime(
        &self,
    ) -> Result<Vec<EventListener>, DomainError> {
        self.inner.find_listeners_with_limited_lifetime().await
    }

    async fn remove_listeners(&self, listener_ids: &[Uuid]) -> Result<u64, DomainError> {
        if self.removals_fail.load(Ordering::SeqCst) {
            return Err(connection_refused());
        }
        self.inner.remove_listeners(listener_ids).await
    }
}
