//! `PostgreSQL` implementation of the `EventStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use prioritize_core::error::DomainError;
use prioritize_core::event::{Event, SourceType, WatchKey};
use prioritize_core::listener::{Destination, DestinationCategory, EventListener};
use prioritize_core::repository::EventStore;

const EVENT_COLUMNS: &str =
    "event_id, event_date, source_type, source_id, property_name, old_value, new_value, lifetime_ms";

const LISTENER_COLUMNS: &str = "listener_id, destination_category, destination_id, source_type, \
     source_id, property_name, one_shot, created_at, lifetime_ms";

fn infrastructure(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(err.to_string())
}

fn event_from_row(row: &PgRow) -> Result<Event, DomainError> {
    let source_type: String = row.try_get("source_type").map_err(infrastructure)?;
    let event_date: DateTime<Utc> = row.try_get("event_date").map_err(infrastructure)?;
    Ok(Event::restore(
        row.try_get("event_id").map_err(infrastructure)?,
        event_date,
        WatchKey::new(
            source_type.parse::<SourceType>()?,
            row.try_get("source_id").map_err(infrastructure)?,
            row.try_get::<String, _>("property_name")
                .map_err(infrastructure)?,
        ),
        row.try_get("old_value").map_err(infrastructure)?,
        row.try_get("new_value").map_err(infrastructure)?,
        row.try_get("lifetime_ms").map_err(infrastructure)?,
    ))
}

fn listener_from_row(row: &PgRow) -> Result<EventListener, DomainError> {
    let source_type: String = row.try_get("source_type").map_err(infrastructure)?;
    let category: String = row
        .try_get("destination_category")
        .map_err(infrastructure)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(infrastructure)?;
    Ok(EventListener::restore(
        row.try_get("listener_id").map_err(infrastructure)?,
        WatchKey::new(
            source_type.parse::<SourceType>()?,
            row.try_get("source_id").map_err(infrastructure)?,
            row.try_get::<String, _>("property_name")
                .map_err(infrastructure)?,
        ),
        Destination::new(
            category.parse::<DestinationCategory>()?,
            row.try_get("destination_id").map_err(infrastructure)?,
        ),
        row.try_get("lifetime_ms").map_err(infrastructure)?,
        row.try_get("one_shot").map_err(infrastructure)?,
        created_at,
    ))
}

/// PostgreSQL-backed event store.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Creates a new `PgEventStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn insert_event(&self, event: &Event, delivered: bool) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO events (event_id, event_date, source_type, source_id, property_name, \
             old_value, new_value, lifetime_ms, delivered) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(event.id())
        .bind(event.event_date())
        .bind(event.source_type().as_str())
        .bind(event.source_id())
        .bind(event.property_name())
        .bind(event.old_value())
        .bind(event.new_value())
        .bind(event.lifetime_ms())
        .bind(delivered)
        .execute(&self.pool)
        .await
        .map_err(infrastructure)?;
        Ok(())
    }

    async fn find_event(&self, event_id: Uuid) -> Result<Option<Event>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE event_id = $1"
        ))
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;
        row.as_ref().map(event_from_row).transpose()
    }

    async fn find_events_with_limited_lifetime(&self) -> Result<Vec<Event>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE lifetime_ms > 0 ORDER BY event_date"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;
        rows.iter().map(event_from_row).collect()
    }

    async fn find_undelivered_events(&self) -> Result<Vec<Event>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE NOT delivered ORDER BY event_date"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;
        rows.iter().map(event_from_row).collect()
    }

    async fn mark_events_delivered(&self, event_ids: &[Uuid]) -> Result<(), DomainError> {
        if event_ids.is_empty() {
            return Ok(());
        }
        sqlx::query("UPDATE events SET delivered = TRUE WHERE event_id = ANY($1)")
            .bind(event_ids)
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;
        debug!(count = event_ids.len(), "events marked delivered");
        Ok(())
    }

    async fn remove_events(&self, event_ids: &[Uuid]) -> Result<u64, DomainError> {
        if event_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM events WHERE event_id = ANY($1)")
            .bind(event_ids)
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;
        debug!(
            requested = event_ids.len(),
            removed = result.rows_affected(),
            "events deleted"
        );
        Ok(result.rows_affected())
    }

    async fn insert_listener(&self, listener: &EventListener) -> Result<(), DomainError> {
        let destination = listener.destination();
        sqlx::query(
            "INSERT INTO event_listeners (listener_id, destination_category, destination_id, \
             source_type, source_id, property_name, one_shot, created_at, lifetime_ms) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(listener.id())
        .bind(destination.category.as_str())
        .bind(destination.id)
        .bind(listener.source_type().as_str())
        .bind(listener.source_id())
        .bind(listener.property_name())
        .bind(listener.is_one_shot())
        .bind(listener.created_at())
        .bind(listener.lifetime_ms())
        .execute(&self.pool)
        .await
        .map_err(infrastructure)?;
        Ok(())
    }

    async fn find_listener(&self, listener_id: Uuid) -> Result<Option<EventListener>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {LISTENER_COLUMNS} FROM event_listeners WHERE listener_id = $1"
        ))
        .bind(listener_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;
        row.as_ref().map(listener_from_row).transpose()
    }

    async fn find_listeners_by_key(
        &self,
        key: &WatchKey,
    ) -> Result<Vec<EventListener>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {LISTENER_COLUMNS} FROM event_listeners \
             WHERE source_type = $1 AND source_id = $2 AND property_name = $3 ORDER BY seq"
        ))
        .bind(key.source_type.as_str())
        .bind(key.source_id)
        .bind(key.property_name.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;
        rows.iter().map(listener_from_row).collect()
    }

    async fn find_listeners_with_limited_lifetime(
        &self,
    ) -> Result<Vec<EventListener>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {LISTENER_COLUMNS} FROM event_listeners WHERE lifetime_ms > 0 ORDER BY seq"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;
        rows.iter().map(listener_from_row).collect()
    }

    async fn remove_listeners(&self, listener_ids: &[Uuid]) -> Result<u64, DomainError> {
        if listener_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM event_listeners WHERE listener_id = ANY($1)")
            .bind(listener_ids)
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;
        debug!(
            requested = listener_ids.len(),
            removed = result.rows_affected(),
            "event listeners deleted"
        );
        Ok(result.rows_affected())
    }
}
