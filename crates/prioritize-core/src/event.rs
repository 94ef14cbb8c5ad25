//! Property-change events and their builder.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::DomainError;

/// Category of the object an event originates from.
///
/// Each variant is a producer domain with its own "fire events" switch in
/// [`EventSettings`](crate::config::EventSettings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// An action board (entries posted, boards edited).
    ActionBoard,
    /// A department of a company.
    Department,
    /// A document and its versions.
    Document,
    /// A resource, including MQTT-discovered devices.
    Resource,
    /// A project task.
    Task,
    /// A user account.
    User,
}

impl SourceType {
    /// Every source type, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::ActionBoard,
        Self::Department,
        Self::Document,
        Self::Resource,
        Self::Task,
        Self::User,
    ];

    /// Stable tag used for storage and logging.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ActionBoard => "action_board",
            Self::Department => "department",
            Self::Document => "document",
            Self::Resource => "resource",
            Self::Task => "task",
            Self::User => "user",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::Validation(format!("unknown source type: {s}")))
    }
}

/// The `(source type, source id, property name)` triple that an event is
/// raised for and that a listener watches. Matching is exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatchKey {
    /// Category of the source object.
    pub source_type: SourceType,
    /// Identifier of the source object, scoped within its type.
    pub source_id: i64,
    /// Name of the watched property.
    pub property_name: String,
}

impl WatchKey {
    /// Creates a new watch key.
    #[must_use]
    pub fn new(source_type: SourceType, source_id: i64, property_name: impl Into<String>) -> Self {
        Self {
            source_type,
            source_id,
            property_name: property_name.into(),
        }
    }
}

impl fmt::Display for WatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}.{}",
            self.source_type, self.source_id, self.property_name
        )
    }
}

/// A single property change on a single source object.
///
/// Fields are only reachable through accessors: the watch key and the event
/// date are fixed once the event is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    id: Uuid,
    event_date: DateTime<Utc>,
    key: WatchKey,
    old_value: String,
    new_value: String,
    lifetime_ms: i64,
}

impl Event {
    /// Rehydrates an event that was previously built and stored.
    #[must_use]
    pub fn restore(
        id: Uuid,
        event_date: DateTime<Utc>,
        key: WatchKey,
        old_value: String,
        new_value: String,
        lifetime_ms: i64,
    ) -> Self {
        Self {
            id,
            event_date,
            key,
            old_value,
            new_value,
            lifetime_ms,
        }
    }

    /// Unique event identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// When the event was built.
    #[must_use]
    pub fn event_date(&self) -> DateTime<Utc> {
        self.event_date
    }

    /// The triple this event was raised for.
    #[must_use]
    pub fn key(&self) -> &WatchKey {
        &self.key
    }

    /// Category of the source object.
    #[must_use]
    pub fn source_type(&self) -> SourceType {
        self.key.source_type
    }

    /// Identifier of the source object.
    #[must_use]
    pub fn source_id(&self) -> i64 {
        self.key.source_id
    }

    /// Name of the changed property.
    #[must_use]
    pub fn property_name(&self) -> &str {
        &self.key.property_name
    }

    /// Value before the change; may be empty.
    #[must_use]
    pub fn old_value(&self) -> &str {
        &self.old_value
    }

    /// Value after the change; may be empty.
    #[must_use]
    pub fn new_value(&self) -> &str {
        &self.new_value
    }

    /// Lifetime in milliseconds. Zero or negative means the event is never
    /// kept past the call that delivers it.
    #[must_use]
    pub fn lifetime_ms(&self) -> i64 {
        self.lifetime_ms
    }

    /// Whether the sweep tracks this event's lifetime.
    #[must_use]
    pub fn has_limited_lifetime(&self) -> bool {
        self.lifetime_ms > 0
    }

    /// Returns `true` once `event_date + lifetime <= now`. Events without a
    /// positive lifetime never expire through the sweep.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.has_limited_lifetime()
            && self
                .event_date
                .checked_add_signed(Duration::milliseconds(self.lifetime_ms))
                .is_some_and(|expires_at| expires_at <= now)
    }
}

/// Fluent constructor for [`Event`].
///
/// A builder is a plain value: obtain a fresh one per event. [`build`](Self::build)
/// consumes it and stamps the event date from the supplied clock.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    source_type: SourceType,
    source_id: i64,
    property_name: String,
    old_value: String,
    new_value: String,
    lifetime_ms: i64,
}

impl EventBuilder {
    /// Starts a new event for the given source object.
    #[must_use]
    pub fn new(source_type: SourceType, source_id: i64) -> Self {
        Self {
            source_type,
            source_id,
            property_name: String::new(),
            old_value: String::new(),
            new_value: String::new(),
            lifetime_ms: 0,
        }
    }

    /// Replaces the source object.
    #[must_use]
    pub fn source(mut self, source_type: SourceType, source_id: i64) -> Self {
        self.source_type = source_type;
        self.source_id = source_id;
        self
    }

    /// Sets the changed property's name.
    #[must_use]
    pub fn property_name(mut self, property_name: impl Into<String>) -> Self {
        self.property_name = property_name.into();
        self
    }

    /// Sets the value before the change.
    #[must_use]
    pub fn old_value(mut self, old_value: impl Into<String>) -> Self {
        self.old_value = old_value.into();
        self
    }

    /// Sets the value after the change.
    #[must_use]
    pub fn new_value(mut self, new_value: impl Into<String>) -> Self {
        self.new_value = new_value.into();
        self
    }

    /// Sets the lifetime in milliseconds.
    #[must_use]
    pub fn lifetime_ms(mut self, lifetime_ms: i64) -> Self {
        self.lifetime_ms = lifetime_ms;
        self
    }

    /// Finishes the event, assigning a fresh identity and `event_date = now`.
    #[must_use]
    pub fn build(self, clock: &dyn Clock) -> Event {
        Event {
            id: Uuid::new_v4(),
            event_date: clock.now(),
            key: WatchKey {
                source_type: self.source_type,
                source_id: self.source_id,
                property_name: self.property_name,
            },
            old_value: self.old_value,
            new_value: self.new_value,
            lifetime_ms: self.lifetime_ms,
        }
    }
}
