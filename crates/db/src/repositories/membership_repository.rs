use crate::error::DbError;
use crate::models::MembershipRow;
use sqlx::SqlitePool;
use tempo_core::PlayerMembership;
use uuid::Uuid;

#[derive(Clone)]
pub struct MembershipRepository {
    pool: SqlitePool,
}

impl MembershipRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns `false` when the player was already a member.
    pub async fn add(&self, membership: &PlayerMembership) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            INSERT INTO player_memberships (player_id, session_id, joined_at)
            VALUES (?, ?, ?)
            ON CONFLICT (player_id, session_id) DO NOTHING
            "#,
        )
        .bind(membership.player_id)
        .bind(membership.session_id.to_string())
        .bind(membership.joined_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn find_by_session(&self, session_id: Uuid) -> Result<Vec<PlayerMembership>, DbError> {
        let rows: Vec<MembershipRow> = sqlx::query_as(
            r#"
            SELECT player_id, session_id, joined_at
            FROM player_memberships
            WHERE session_id = ?
            ORDER BY joined_at ASC, player_id ASC
            "#,
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }
}
