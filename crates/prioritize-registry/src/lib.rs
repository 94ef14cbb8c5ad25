//! Prioritize — event registry.
//!
//! Keeps track of who listens for which property changes, matches raised
//! events against those listeners, hands them to the consumer registered for
//! each destination category, and sweeps out expired events and listeners.

pub mod dispatch;
pub mod registry;
pub mod sweeper;

pub use dispatch::DispatchTable;
pub use registry::{DeliveryOutcome, DeliveryReport, EventRegistry, SweepReport};
pub use sweeper::spawn_sweeper;
