use tempo_core::{PhaseSession, PhaseStatus};
use uuid::Uuid;

use super::{datetime_to_millis, millis_to_datetime};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PhaseSessionRow {
    pub id: String,
    pub session_id: String,
    pub phase_id: i64,
    pub position: i32,
    pub budget_seconds: i64,
    pub elapsed_ms: i64,
    pub status: String,
    pub active_since: Option<i64>,
    pub paused_at: Option<i64>,
    pub ended_at: Option<i64>,
}

impl PhaseSessionRow {
    pub fn into_domain(self) -> PhaseSession {
        PhaseSession {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            session_id: Uuid::parse_str(&self.session_id).unwrap_or_default(),
            phase_id: self.phase_id,
            position: self.position,
            budget_seconds: self.budget_seconds,
            elapsed_ms: self.elapsed_ms,
            status: PhaseStatus::parse(&self.status).unwrap_or_default(),
            active_since: self.active_since.map(millis_to_datetime),
            paused_at: self.paused_at.map(millis_to_datetime),
            ended_at: self.ended_at.map(millis_to_datetime),
        }
    }
}

impl From<&PhaseSession> for PhaseSessionRow {
    fn from(phase: &PhaseSession) -> Self {
        Self {
            id: phase.id.to_string(),
            session_id: phase.session_id.to_string(),
            phase_id: phase.phase_id,
            position: phase.position,
            budget_seconds: phase.budget_seconds,
            elapsed_ms: phase.elapsed_ms,
            status: phase.status.as_str().to_string(),
            active_since: phase.active_since.map(datetime_to_millis),
            paused_at: phase.paused_at.map(datetime_to_millis),
            ended_at: phase.ended_at.map(datetime_to_millis),
        }
    }
}
