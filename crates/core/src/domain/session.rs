use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::status::{check_transition, SessionStatus};
use crate::error::CoreError;
use crate::timing::{millis_between, Timed};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Session {
    pub id: Uuid,
    pub game_format_id: i64,
    pub creator_id: i64,
    pub join_code: String,
    pub budget_seconds: i64,
    pub elapsed_ms: i64,
    pub status: SessionStatus,
    pub active_since: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        game_format_id: i64,
        creator_id: i64,
        join_code: impl Into<String>,
        budget_seconds: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            game_format_id,
            creator_id,
            join_code: join_code.into(),
            budget_seconds,
            elapsed_ms: 0,
            status: SessionStatus::default(),
            active_since: None,
            paused_at: None,
            ended_at: None,
            scheduled_start: None,
            created_at: now,
        }
    }

    pub fn with_scheduled_start(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_start = Some(at);
        self
    }

    fn guard(&self, to: SessionStatus) -> Result<(), CoreError> {
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

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.guard(SessionStatus::Active)?;
        if self.status != SessionStatus::Pending {
            return Err(CoreError::InvalidStatusTransition {
                from: self.status.as_str().to_string(),
                to: "active".to_string(),
            });
        }
        self.status = SessionStatus::Active;
        self.active_since = Some(now);
        self.paused_at = None;
        Ok(())
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.guard(SessionStatus::Paused)?;
        self.fold(now);
        self.status = SessionStatus::Paused;
        self.paused_at = Some(now);
        Ok(())
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.guard(SessionStatus::Active)?;
        if self.status != SessionStatus::Paused {
            return Err(CoreError::InvalidStatusTransition {
                from: self.status.as_str().to_string(),
                to: "active".to_string(),
            });
        }
        self.status = SessionStatus::Active;
        self.active_since = Some(now);
        self.paused_at = None;
        Ok(())
    }

    /// Completion always books the full budget as spent.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.guard(SessionStatus::Completed)?;
        self.fold(now);
        self.elapsed_ms = self.elapsed_ms.max(self.budget_ms());
        self.status = SessionStatus::Completed;
        self.ended_at = Some(now);
        Ok(())
    }

    pub fn extend(&mut self, additional_seconds: i64) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::AlreadyCompleted(self.id));
        }
        if additional_seconds <= 0 {
            return Err(CoreError::Validation(
                "additional_seconds must be positive".to_string(),
            ));
        }
        self.budget_seconds = self.budget_seconds.saturating_add(additional_seconds);
        Ok(())
    }
}

impl Timed for Session {
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
