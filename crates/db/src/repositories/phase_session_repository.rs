use crate::error::DbError;
use crate::models::PhaseSessionRow;
use sqlx::{SqliteConnection, SqlitePool};
use tempo_core::PhaseSession;
use uuid::Uuid;

#[derive(Clone)]
pub struct PhaseSessionRepository {
    pool: SqlitePool,
}

impl PhaseSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) async fn insert(conn: &mut SqliteConnection, phase: &PhaseSession) -> Result<(), DbError> {
        let row = PhaseSessionRow::from(phase);

        sqlx::query(
            r#"
            INSERT INTO phase_sessions (id, session_id, phase_id, position, budget_seconds, elapsed_ms, status, active_since, paused_at, ended_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.session_id)
        .bind(row.phase_id)
        .bind(row.position)
        .bind(row.budget_seconds)
        .bind(row.elapsed_ms)
        .bind(&row.status)
        .bind(row.active_since)
        .bind(row.paused_at)
        .bind(row.ended_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// All phases of a session in position order.
    pub async fn find_by_session(&self, session_id: Uuid) -> Result<Vec<PhaseSession>, DbError> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_for_session(&mut conn, session_id).await
    }

    pub(crate) async fn fetch_for_session(
        conn: &mut SqliteConnection,
        session_id: Uuid,
    ) -> Result<Vec<PhaseSession>, DbError> {
        let rows: Vec<PhaseSessionRow> = sqlx::query_as(
            r#"
            SELECT id, session_id, phase_id, position, budget_seconds, elapsed_ms, status, active_since, paused_at, ended_at
            FROM phase_sessions
            WHERE session_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(session_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    pub(crate) async fn update_in(conn: &mut SqliteConnection, phase: &PhaseSession) -> Result<(), DbError> {
        let row = PhaseSessionRow::from(phase);

        let result = sqlx::query(
            r#"
            UPDATE phase_sessions
            SET elapsed_ms = ?, status = ?, active_since = ?, paused_at = ?, ended_at = ?
            WHERE id = ? AND status != 'completed'
            "#,
        )
        .bind(row.elapsed_ms)
        .bind(&row.status)
        .bind(row.active_since)
        .bind(row.paused_at)
        .bind(row.ended_at)
        .bind(&row.id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let exists: Option<(String,)> =
            sqlx::query_as("SELECT status FROM phase_sessions WHERE id = ?")
                .bind(&row.id)
                .fetch_optional(&mut *conn)
                .await?;

        match exists {
            Some(_) => Err(DbError::Terminal(phase.id)),
            None => Err(DbError::PhaseSessionNotFound(phase.id)),
        }
    }
}
