//! Background task that runs the expiry sweep on a fixed period.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::registry::EventRegistry;

/// Spawns a task that calls [`EventRegistry::process_events`] every
/// `interval`. Returns `None` without spawning when `interval` is zero.
///
/// Ticks missed while a sweep runs long are dropped. Abort the returned
/// handle to stop the sweeper.
#[must_use]
pub fn spawn_sweeper(registry: Arc<EventRegistry>, interval: Duration) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        info!("event sweeper disabled");
        return None;
    }

    info!(interval_ms = interval.as_millis(), "event sweeper started");
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let report = registry.process_events().await;
            if report.errors > 0 {
                warn!(errors = report.errors, "event sweep finished with errors");
            }
        }
    }))
}
