use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct PlayerMembership {
    pub player_id: i64,
    pub session_id: Uuid,
    pub joined_at: DateTime<Utc>,
}

impl PlayerMembership {
    pub fn new(player_id: i64, session_id: Uuid, joined_at: DateTime<Utc>) -> Self {
        Self {
            player_id,
            session_id,
            joined_at,
        }
    }
}
