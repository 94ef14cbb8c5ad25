//! Shared test doubles for the Prioritize notification engine.

mod clock;
mod consumer;
mod repository;

pub use clock::{FixedClock, ManualClock};
pub use consumer::{FailingConsumer, RecordingConsumer, SlowConsumer};
pub use repository::{FailingEventStore, FlakyEventStore};
