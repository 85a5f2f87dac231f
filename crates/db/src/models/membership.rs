use tempo_core::PlayerMembership;
use uuid::Uuid;

use super::millis_to_datetime;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MembershipRow {
    pub player_id: i64,
    pub session_id: String,
    pub joined_at: i64,
}

impl MembershipRow {
    pub fn into_domain(self) -> PlayerMembership {
        PlayerMembership {
            player_id: self.player_id,
            session_id: Uuid::parse_str(&self.session_id).unwrap_or_default(),
            joined_at: millis_to_datetime(self.joined_at),
        }
    }
}
