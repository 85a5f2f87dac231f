//! Time source for the orchestrator.

use chrono::{DateTime, Duration, Utc};
use tokio::time::Instant;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time that only ever moves forward.
///
/// Reads the wall clock once and then advances by tokio's monotonic clock,
/// so deadlines computed from `now()` agree with `tokio::time::sleep`, also
/// when tokio time is paused in tests.
#[derive(Debug, Clone)]
pub struct SystemClock {
    wall: DateTime<Utc>,
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            wall: Utc::now(),
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let since = Instant::now().saturating_duration_since(self.origin);
        self.wall + Duration::from_std(since).unwrap_or_else(|_| Duration::zero())
    }
}
