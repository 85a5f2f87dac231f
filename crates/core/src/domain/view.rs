use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::phase_session::PhaseSession;
use super::session::Session;
use super::status::PhaseStatus;
use crate::timing::{millis_to_seconds_ceil, Timed};

/// A phase session with its live clock evaluated at `computed_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct PhaseView {
    pub phase: PhaseSession,
    pub elapsed_seconds: i64,
    pub remaining_seconds: i64,
}

impl PhaseView {
    pub fn new(phase: &PhaseSession, now: DateTime<Utc>) -> Self {
        Self {
            elapsed_seconds: phase.total_elapsed_ms(now) / 1000,
            remaining_seconds: millis_to_seconds_ceil(phase.remaining_ms(now)),
            phase: phase.clone(),
        }
    }
}

/// Read model returned by status queries and every command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct SessionView {
    pub session: Session,
    pub elapsed_seconds: i64,
    pub remaining_seconds: i64,
    pub active_phase: Option<PhaseView>,
    pub phases: Vec<PhaseView>,
    pub computed_at: DateTime<Utc>,
}

impl SessionView {
    pub fn new(session: &Session, phases: &[PhaseSession], now: DateTime<Utc>) -> Self {
        let phases: Vec<PhaseView> = phases.iter().map(|p| PhaseView::new(p, now)).collect();
        let active_phase = phases
            .iter()
            .find(|p| matches!(p.phase.status, PhaseStatus::Active | PhaseStatus::Paused))
            .cloned();

        Self {
            elapsed_seconds: session.total_elapsed_ms(now) / 1000,
            remaining_seconds: millis_to_seconds_ceil(session.remaining_ms(now)),
            session: session.clone(),
            active_phase,
            phases,
            computed_at: now,
        }
    }
}
