//! Clock abstraction for deterministic expiry checks.

use chrono::{DateTime, Utc};

/// Abstraction over system time. Event dates, listener creation times and
/// every sweep comparison read from this.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
