//! Prioritize event stores.
//!
//! [`InMemoryEventStore`] backs tests and single-process deployments;
//! [`PgEventStore`] persists to PostgreSQL using the workspace migrations.

pub mod memory;
pub mod pg_event_store;

pub use memory::InMemoryEventStore;
pub use pg_event_store::PgEventStore;
