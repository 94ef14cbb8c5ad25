//! Consumer abstraction: the receiving side of event delivery.

use async_trait::async_trait;

use crate::error::DomainError;
use crate::event::Event;
use crate::listener::Destination;

/// Handler able to deliver events to destinations of one category.
///
/// Registered once per [`DestinationCategory`](crate::listener::DestinationCategory)
/// at startup. Calls are not retried, so a handler that fails has lost the
/// event for that destination.
#[async_trait]
pub trait EventConsumer: Send + Sync {
    /// Delivers `event` to `destination`.
    async fn consume_event(&self, destination: &Destination, event: &Event)
    -> Result<(), DomainError>;
}
