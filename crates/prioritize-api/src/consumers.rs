//! Consumers that deliver notifications to users and documents.
//!
//! Delivery here means recording the notification in the service log; mail
//! or push transports plug in behind the same trait.

use std::sync::Arc;

use async_trait::async_trait;
use prioritize_core::consumer::EventConsumer;
use prioritize_core::error::DomainError;
use prioritize_core::event::Event;
use prioritize_core::listener::{Destination, DestinationCategory};
use tracing::info;

/// Writes every delivered event to the log, tagged with its category.
#[derive(Debug)]
pub struct LoggingConsumer {
    category: DestinationCategory,
}

impl LoggingConsumer {
    /// Creates a consumer for destinations of `category`.
    #[must_use]
    pub fn new(category: DestinationCategory) -> Self {
        Self { category }
    }
}

#[async_trait]
impl EventConsumer for LoggingConsumer {
    async fn consume_event(
        &self,
        destination: &Destination,
        event: &Event,
    ) -> Result<(), DomainError> {
        if destination.category != self.category {
            return Err(DomainError::Delivery(format!(
                "{} consumer cannot deliver to {destination}",
                self.category
            )));
        }
        info!(
            %destination,
            event_id = %event.id(),
            key = %event.key(),
            old_value = event.old_value(),
            new_value = event.new_value(),
            "notification delivered"
        );
        Ok(())
    }
}

/// The consumers the API server registers at startup.
#[must_use]
pub fn default_consumers() -> Vec<(DestinationCategory, Arc<dyn EventConsumer>)> {
    [DestinationCategory::User, DestinationCategory::Document]
        .into_iter()
        .map(|category| {
            (
                category,
                Arc::new(LoggingConsumer::new(category)) as Arc<dyn EventConsumer>,
            )
        })
        .collect()
}
