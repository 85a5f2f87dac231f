use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::status::{check_transition, PhaseStatus};
use super::template::PhaseTemplate;
use crate::error::CoreError;
use crate::timing::{millis_between, Timed};

/// Live, timed instance of one ordered phase within a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct PhaseSession {
    pub id: Uuid,
    pub session_id: Uuid,
    pub phase_id: i64,
    /// Position copied from the phase template; phases run in ascending order.
    pub position: i32,
    pub budget_seconds: i64,
    pub elapsed_ms: i64,
    pub status: PhaseStatus,
    pub active_since: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl PhaseSession {
    pub fn from_template(session_id: Uuid, template: &PhaseTemplate) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            phase_id: template.phase_id,
            position: template.position,
            budget_seconds: template.budget_seconds,
            elapsed_ms: 0,
            status: PhaseStatus::default(),
            active_since: None,
            paused_at: None,
            ended_at: None,
        }
    }

    fn guard(&self, to: PhaseStatus) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::AlreadyCompleted(self.id));
        }
        check_transition(self.status.can_transition(to), self.status.as_str(), to.as_str())
    }

    fn fold(&mut self, now: DateTime<Utc>) {
        if let Some(since) = self.active_since.take() {
            self.elapsed_ms += millis_between(since, now);
        }
    }

    /// First activation of a pending phase.
    pub fn activate(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.guard(PhaseStatus::Active)?;
        if self.status != PhaseStatus::Pending {
            return Err(CoreError::InvalidStatusTransition {
                from: self.status.as_str().to_string(),
                to: "active".to_string(),
            });
        }
        self.status = PhaseStatus::Active;
        self.active_since = Some(now);
        self.paused_at = None;
        Ok(())
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.guard(PhaseStatus::Paused)?;
        self.fold(now);
        self.status = PhaseStatus::Paused;
        self.paused_at = Some(now);
        Ok(())
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.guard(PhaseStatus::Active)?;
        if self.status != PhaseStatus::Paused {
            return Err(CoreError::InvalidStatusTransition {
                from: self.status.as_str().to_string(),
                to: "active".to_string(),
            });
        }
        self.status = PhaseStatus::Active;
        self.active_since = Some(now);
        self.paused_at = None;
        Ok(())
    }

    /// Budget ran out at `at`. Only a running phase can expire.
    pub fn expire(&mut self, at: DateTime<Utc>) -> Result<(), CoreError> {
        self.guard(PhaseStatus::Completed)?;
        if self.status != PhaseStatus::Active {
            return Err(CoreError::InvalidStatusTransition {
                from: self.status.as_str().to_string(),
                to: "completed".to_string(),
            });
        }
        self.fold(at);
        self.elapsed_ms = self.elapsed_ms.max(self.budget_ms());
        self.status = PhaseStatus::Completed;
        self.ended_at = Some(at);
        Ok(())
    }

    /// Forced completion from any non-terminal status; keeps the time
    /// actually spent.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.guard(PhaseStatus::Completed)?;
        self.fold(now);
        self.status = PhaseStatus::Completed;
        self.ended_at = Some(now);
        Ok(())
    }
}

impl Timed for PhaseSession {
    fn budget_seconds(&self) -> i64 {
        self.budget_seconds
    }

    fn elapsed_ms(&self) -> i64 {
        self.elapsed_ms
    }

    fn active_since(&self) -> Option<DateTime<Utc>> {
        self.active_since
    }
}
