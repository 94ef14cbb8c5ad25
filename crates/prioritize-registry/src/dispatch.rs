//! Dispatch table: destination category to consumer.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use prioritize_core::consumer::EventConsumer;
use prioritize_core::error::DomainError;
use prioritize_core::listener::DestinationCategory;

/// Maps each [`DestinationCategory`] to the consumer that delivers events to
/// destinations of that category.
///
/// Populated once at startup and read-only afterwards.
#[derive(Clone, Default)]
pub struct DispatchTable {
    consumers: HashMap<DestinationCategory, Arc<dyn EventConsumer>>,
}

impl DispatchTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `consumer` for `category`.
    ///
    /// Registering the same consumer instance twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::DuplicateConsumer` if a different consumer is
    /// already registered for `category`.
    pub fn register(
        &mut self,
        category: DestinationCategory,
        consumer: Arc<dyn EventConsumer>,
    ) -> Result<(), DomainError> {
        match self.consumers.get(&category) {
            Some(existing) if Arc::ptr_eq(existing, &consumer) => Ok(()),
            Some(_) => Err(DomainError::DuplicateConsumer(category)),
            None => {
                self.consumers.insert(category, consumer);
                Ok(())
            }
        }
    }

    /// Chaining form of [`register`](Self::register).
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub fn with(
        mut self,
        category: DestinationCategory,
        consumer: Arc<dyn EventConsumer>,
    ) -> Result<Self, DomainError> {
        self.register(category, consumer)?;
        Ok(self)
    }

    /// The consumer for `category`, if one is registered.
    #[must_use]
    pub fn consumer_for(&self, category: DestinationCategory) -> Option<&Arc<dyn EventConsumer>> {
        self.consumers.get(&category)
    }

    /// Whether events for `category` can be delivered.
    #[must_use]
    pub fn is_routable(&self, category: DestinationCategory) -> bool {
        self.consumers.contains_key(&category)
    }

    /// Registered categories, in declaration order.
    #[must_use]
    pub fn categories(&self) -> Vec<DestinationCategory> {
        DestinationCategory::ALL
            .into_iter()
            .filter(|c| self.is_routable(*c))
            .collect()
    }

    /// Number of registered categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    /// Whether no consumer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("categories", &self.categories())
            .finish()
    }
}
