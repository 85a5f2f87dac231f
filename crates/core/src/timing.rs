//! Elapsed-time accounting shared by sessions and phase sessions.
//!
//! Elapsed time is kept in milliseconds so that repeated pause/resume folds
//! add up exactly. Budgets are whole seconds. While an entity is running,
//! `active_since` marks the start of the open interval that has not yet been
//! folded into `elapsed_ms`.

use chrono::{DateTime, Duration, Utc};

/// Milliseconds from `from` to `to`, never negative.
pub fn millis_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_milliseconds().max(0)
}

/// Converts a whole-second budget to milliseconds.
pub fn seconds_to_millis(seconds: i64) -> i64 {
    seconds.saturating_mul(1000)
}

/// Rounds milliseconds up to whole seconds, so a countdown only shows 0 once
/// the budget is really gone.
pub fn millis_to_seconds_ceil(ms: i64) -> i64 {
    if ms <= 0 {
        0
    } else {
        (ms + 999) / 1000
    }
}

/// Anything that spends a time budget.
pub trait Timed {
    fn budget_seconds(&self) -> i64;
    fn elapsed_ms(&self) -> i64;
    fn active_since(&self) -> Option<DateTime<Utc>>;

    fn budget_ms(&self) -> i64 {
        seconds_to_millis(self.budget_seconds())
    }

    /// Folded elapsed time plus the open interval, if running.
    fn total_elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        match self.active_since() {
            Some(since) => self.elapsed_ms() + millis_between(since, now),
            None => self.elapsed_ms(),
        }
    }

    /// `max(budget - totalElapsed, 0)`.
    fn remaining_ms(&self, now: DateTime<Utc>) -> i64 {
        (self.budget_ms() - self.total_elapsed_ms(now)).max(0)
    }

    /// Instant at which the budget runs out if nothing pauses it.
    /// `None` while not running.
    fn exhausted_at(&self) -> Option<DateTime<Utc>> {
        let since = self.active_since()?;
        let left = (self.budget_ms() - self.elapsed_ms()).max(0);
        Some(since + Duration::milliseconds(left))
    }
}
