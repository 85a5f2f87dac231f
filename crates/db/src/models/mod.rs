mod membership;
mod phase_session;
mod session;
mod template;

pub use membership::MembershipRow;
pub use phase_session::PhaseSessionRow;
pub use session::SessionRow;
pub use template::PhaseTemplateRow;

use chrono::{DateTime, TimeZone, Utc};

/// Timestamps are stored as Unix milliseconds.
pub(crate) fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

pub(crate) fn datetime_to_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}
