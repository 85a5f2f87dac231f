use tempo_core::{Session, SessionStatus};
use uuid::Uuid;

use super::{datetime_to_millis, millis_to_datetime};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
    pub id: String,
    pub game_format_id: i64,
    pub creator_id: i64,
    pub join_code: String,
    pub budget_seconds: i64,
    pub elapsed_ms: i64,
    pub status: String,
    pub active_since: Option<i64>,
    pub paused_at: Option<i64>,
    pub ended_at: Option<i64>,
    pub scheduled_start: Option<i64>,
    pub created_at: i64,
}

impl SessionRow {
    pub fn into_domain(self) -> Session {
        Session {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            game_format_id: self.game_format_id,
            creator_id: self.creator_id,
            join_code: self.join_code,
            budget_seconds: self.budget_seconds,
            elapsed_ms: self.elapsed_ms,
            status: SessionStatus::parse(&self.status).unwrap_or_default(),
            active_since: self.active_since.map(millis_to_datetime),
            paused_at: self.paused_at.map(millis_to_datetime),
            ended_at: self.ended_at.map(millis_to_datetime),
            scheduled_start: self.scheduled_start.map(millis_to_datetime),
            created_at: millis_to_datetime(self.created_at),
        }
    }
}

impl From<&Session> for SessionRow {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.to_string(),
            game_format_id: session.game_format_id,
            creator_id: session.creator_id,
            join_code: session.join_code.clone(),
            budget_seconds: session.budget_seconds,
            elapsed_ms: session.elapsed_ms,
            status: session.status.as_str().to_string(),
            active_since: session.active_since.map(datetime_to_millis),
            paused_at: session.paused_at.map(datetime_to_millis),
            ended_at: session.ended_at.map(datetime_to_millis),
            scheduled_start: session.scheduled_start.map(datetime_to_millis),
            created_at: datetime_to_millis(session.created_at),
        }
    }
}
