//! Event listeners and the destinations they notify.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::{SourceType, WatchKey};

/// Listener lifetime meaning "never expires".
pub const NEVER_EXPIRES: i64 = -1;

/// Category of a subscriber object. The dispatch table maps each category
/// to the consumer able to deliver events to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationCategory {
    /// A user account.
    User,
    /// A document.
    Document,
    /// A project task.
    Task,
    /// A resource or device.
    Resource,
    /// A department.
    Department,
    /// An action board.
    ActionBoard,
}

impl DestinationCategory {
    /// Every destination category, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::User,
        Self::Document,
        Self::Task,
        Self::Resource,
        Self::Department,
        Self::ActionBoard,
    ];

    /// Stable tag used for storage and logging.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Document => "document",
            Self::Task => "task",
            Self::Resource => "resource",
            Self::Department => "department",
            Self::ActionBoard => "action_board",
        }
    }
}

impl fmt::Display for DestinationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestinationCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| DomainError::Validation(format!("unknown destination category: {s}")))
    }
}

/// The subscriber object that receives delivered events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    /// Category used for consumer lookup.
    pub category: DestinationCategory,
    /// Identifier of the subscriber within its category.
    pub id: i64,
}

impl Destination {
    /// Creates a new destination.
    #[must_use]
    pub fn new(category: DestinationCategory, id: i64) -> Self {
        Self { category, id }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.category, self.id)
    }
}

/// A durable registration binding a watched triple to a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventListener {
    id: Uuid,
    destination: Destination,
    key: WatchKey,
    one_shot: bool,
    created_at: DateTime<Utc>,
    lifetime_ms: i64,
}

impl EventListener {
    /// Creates a listener with a fresh identity.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `lifetime_ms` is below
    /// [`NEVER_EXPIRES`].
    pub fn new(
        key: WatchKey,
        destination: Destination,
        lifetime_ms: i64,
        one_shot: bool,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if lifetime_ms < NEVER_EXPIRES {
            return Err(DomainError::Validation(format!(
                "listener lifetime must be >= {NEVER_EXPIRES}, got {lifetime_ms}"
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            destination,
            key,
            one_shot,
            created_at,
            lifetime_ms,
        })
    }

    /// Rehydrates a listener that was previously created and stored.
    #[must_use]
    pub fn restore(
        id: Uuid,
        key: WatchKey,
        destination: Destination,
        lifetime_ms: i64,
        one_shot: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            destination,
            key,
            one_shot,
            created_at,
            lifetime_ms,
        }
    }

    /// Unique listener identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The subscriber to notify.
    #[must_use]
    pub fn destination(&self) -> Destination {
        self.destination
    }

    /// The watched triple.
    #[must_use]
    pub fn key(&self) -> &WatchKey {
        &self.key
    }

    /// Category of the watched source.
    #[must_use]
    pub fn source_type(&self) -> SourceType {
        self.key.source_type
    }

    /// Identifier of the watched source.
    #[must_use]
    pub fn source_id(&self) -> i64 {
        self.key.source_id
    }

    /// Name of the watched property.
    #[must_use]
    pub fn property_name(&self) -> &str {
        &self.key.property_name
    }

    /// Whether the listener is removed after its first delivery.
    #[must_use]
    pub fn is_one_shot(&self) -> bool {
        self.one_shot
    }

    /// When the listener was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Lifetime in milliseconds; [`NEVER_EXPIRES`] for a permanent listener.
    #[must_use]
    pub fn lifetime_ms(&self) -> i64 {
        self.lifetime_ms
    }

    /// Whether the sweep tracks this listener's lifetime.
    #[must_use]
    pub fn has_limited_lifetime(&self) -> bool {
        self.lifetime_ms > 0
    }

    /// Returns `true` once `created_at + lifetime <= now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.has_limited_lifetime()
            && self
                .created_at
                .checked_add_signed(Duration::milliseconds(self.lifetime_ms))
                .is_some_and(|expires_at| expires_at <= now)
    }
}
