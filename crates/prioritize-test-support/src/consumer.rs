//! Test consumers — `EventConsumer` implementations for tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use prioritize_core::consumer::EventConsumer;
use prioritize_core::error::DomainError;
use prioritize_core::event::Event;
use prioritize_core::listener::Destination;

/// A consumer that records every `(destination, event)` pair it receives and
/// always succeeds.
#[derive(Debug, Default)]
pub struct RecordingConsumer {
    received: Mutex<Vec<(Destination, Event)>>,
}

impl RecordingConsumer {
    /// Create a consumer with nothing recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every delivery received, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn received(&self) -> Vec<(Destination, Event)> {
        self.received.lock().unwrap().clone()
    }

    /// Number of deliveries received so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

#[async_trait]
impl EventConsumer for RecordingConsumer {
    async fn consume_event(
        &self,
        destination: &Destination,
        event: &Event,
    ) -> Result<(), DomainError> {
        self.received
            .lock()
            .unwrap()
            .push((*destination, event.clone()));
        Ok(())
    }
}

/// A consumer that rejects every event. Useful for testing that one failing
/// destination does not block the others.
#[derive(Debug)]
pub struct FailingConsumer;

#[async_trait]
impl EventConsumer for FailingConsumer {
    async fn consume_event(
        &self,
        destination: &Destination,
        _event: &Event,
    ) -> Result<(), DomainError> {
        Err(DomainError::Delivery(format!("{destination} is unreachable")))
    }
}

/// A consumer that sleeps before accepting. Used to exercise delivery
/// timeouts.
#[derive(Debug)]
pub struct SlowConsumer(pub Duration);

#[async_trait]
impl EventConsumer for SlowConsumer {
    async fn consume_event(
        &self,
        _destination: &Destination,
        _event: &Event,
    ) -> Result<(), DomainError> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}
