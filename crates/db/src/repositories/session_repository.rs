use crate::error::DbError;
use crate::models::SessionRow;
use sqlx::{SqliteConnection, SqlitePool};
use tempo_core::Session;
use uuid::Uuid;

#[derive(Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[cfg(test)]
    pub(crate) async fn create(&self, session: &Session) -> Result<Session, DbError> {
        let mut conn = self.pool.acquire().await?;
        Self::insert(&mut conn, session).await?;
        Ok(session.clone())
    }

    pub(crate) async fn insert(conn: &mut SqliteConnection, session: &Session) -> Result<(), DbError> {
        let row = SessionRow::from(session);

        let result = sqlx::query(
            r#"
            INSERT INTO sessions (id, game_format_id, creator_id, join_code, budget_seconds, elapsed_ms, status, active_since, paused_at, ended_at, scheduled_start, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(row.game_format_id)
        .bind(row.creator_id)
        .bind(&row.join_code)
        .bind(row.budget_seconds)
        .bind(row.elapsed_ms)
        .bind(&row.status)
        .bind(row.active_since)
        .bind(row.paused_at)
        .bind(row.ended_at)
        .bind(row.scheduled_start)
        .bind(row.created_at)
        .execute(&mut *conn)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e))
                if e.is_unique_violation() && e.message().contains("join_code") =>
            {
                Err(DbError::JoinCodeTaken(row.join_code))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Session>, DbError> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    pub(crate) async fn fetch(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Session>, DbError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, game_format_id, creator_id, join_code, budget_seconds, elapsed_ms, status, active_since, paused_at, ended_at, scheduled_start, created_at
            FROM sessions
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(|r| r.into_domain()))
    }

    pub async fn find_by_join_code(&self, join_code: &str) -> Result<Option<Session>, DbError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, game_format_id, creator_id, join_code, budget_seconds, elapsed_ms, status, active_since, paused_at, ended_at, scheduled_start, created_at
            FROM sessions
            WHERE join_code = ?
            "#,
        )
        .bind(join_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_domain()))
    }

    pub async fn find_all(&self) -> Result<Vec<Session>, DbError> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, game_format_id, creator_id, join_code, budget_seconds, elapsed_ms, status, active_since, paused_at, ended_at, scheduled_start, created_at
            FROM sessions
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    pub async fn find_by_creator(&self, creator_id: i64) -> Result<Vec<Session>, DbError> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, game_format_id, creator_id, join_code, budget_seconds, elapsed_ms, status, active_since, paused_at, ended_at, scheduled_start, created_at
            FROM sessions
            WHERE creator_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(creator_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    /// Sessions that are not completed yet, oldest first.
    pub async fn find_open(&self) -> Result<Vec<Session>, DbError> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, game_format_id, creator_id, join_code, budget_seconds, elapsed_ms, status, active_since, paused_at, ended_at, scheduled_start, created_at
            FROM sessions
            WHERE status != 'completed'
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    #[cfg(test)]
    pub(crate) async fn update(&self, session: &Session) -> Result<Session, DbError> {
        let mut conn = self.pool.acquire().await?;
        Self::update_in(&mut conn, session).await?;
        Ok(session.clone())
    }

    /// Writes the mutable fields. The join code is never rewritten and a
    /// completed row is never touched again.
    pub(crate) async fn update_in(conn: &mut SqliteConnection, session: &Session) -> Result<(), DbError> {
        let row = SessionRow::from(session);

        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET budget_seconds = ?, elapsed_ms = ?, status = ?, active_since = ?, paused_at = ?, ended_at = ?, scheduled_start = ?
            WHERE id = ? AND status != 'completed'
            "#,
        )
        .bind(row.budget_seconds)
        .bind(row.elapsed_ms)
        .bind(&row.status)
        .bind(row.active_since)
        .bind(row.paused_at)
        .bind(row.ended_at)
        .bind(row.scheduled_start)
        .bind(&row.id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let exists: Option<(String,)> = sqlx::query_as("SELECT status FROM sessions WHERE id = ?")
            .bind(&row.id)
            .fetch_optional(&mut *conn)
            .await?;

        match exists {
            Some(_) => Err(DbError::Terminal(session.id)),
            None => Err(DbError::SessionNotFound(session.id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::setup_test_db;
    use chrono::{Duration, Utc};
    use tempo_core::SessionStatus;

    #[tokio::test]
    async fn test_create_and_find_session() {
        let pool = setup_test_db().await;
        let repo = SessionRepository::new(pool);

        let session = Session::new(1, 9, "JOIN0001", 300, Utc::now());
        let created = repo.create(&session).await.unwrap();
        assert_eq!(created.join_code, "JOIN0001");

        let found = repo.find_by_id(session.id).await.unwrap().unwrap();
        assert_eq!(found.budget_seconds, 300);
        assert_eq!(found.status, SessionStatus::Pending);

        let by_code = repo.find_by_join_code("JOIN0001").await.unwrap().unwrap();
        assert_eq!(by_code.id, session.id);
        assert!(repo.find_by_join_code("NOPE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_join_code_is_reported() {
        let pool = setup_test_db().await;
        let repo = SessionRepository::new(pool);

        repo.create(&Session::new(1, 1, "SAMECODE", 60, Utc::now()))
            .await
            .unwrap();
        let err = repo
            .create(&Session::new(1, 2, "SAMECODE", 60, Utc::now()))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::JoinCodeTaken(code) if code == "SAMECODE"));
    }

    #[tokio::test]
    async fn test_update_round_trips_timing_fields() {
        let pool = setup_test_db().await;
        let repo = SessionRepository::new(pool);

        let t0 = Utc::now();
        let mut session = Session::new(1, 1, "TIMING01", 60, t0);
        repo.create(&session).await.unwrap();

        session.start(t0).unwrap();
        session.pause(t0 + Duration::milliseconds(2500)).unwrap();
        repo.update(&session).await.unwrap();

        let found = repo.find_by_id(session.id).await.unwrap().unwrap();
        assert_eq!(found.status, SessionStatus::Paused);
        assert_eq!(found.elapsed_ms, 2500);
        assert!(found.active_since.is_none());
        assert_eq!(
            found.paused_at.map(|t| t.timestamp_millis()),
            Some((t0 + Duration::milliseconds(2500)).timestamp_millis())
        );
    }

    #[tokio::test]
    async fn test_completed_session_is_frozen() {
        let pool = setup_test_db().await;
        let repo = SessionRepository::new(pool);

        let t0 = Utc::now();
        let mut session = Session::new(1, 1, "FROZEN01", 60, t0);
        repo.create(&session).await.unwrap();
        session.start(t0).unwrap();
        session.complete(t0).unwrap();
        repo.update(&session).await.unwrap();

        session.budget_seconds = 999;
        let err = repo.update(&session).await.unwrap_err();
        assert!(matches!(err, DbError::Terminal(id) if id == session.id));

        let found = repo.find_by_id(session.id).await.unwrap().unwrap();
        assert_eq!(found.budget_seconds, 60);
    }

    #[tokio::test]
    async fn test_find_open_and_creator() {
        let pool = setup_test_db().await;
        let repo = SessionRepository::new(pool);
        let t0 = Utc::now();

        let mut done = Session::new(1, 5, "DONE0001", 60, t0);
        repo.create(&done).await.unwrap();
        done.start(t0).unwrap();
        done.complete(t0).unwrap();
        repo.update(&done).await.unwrap();
        repo.create(&Session::new(1, 5, "PENDNG01", 60, t0)).await.unwrap();
        repo.create(&Session::new(1, 6, "OTHER001", 60, t0)).await.unwrap();

        let open = repo.find_open().await.unwrap();
        assert_eq!(open.len(), 2);
        assert!(open.iter().all(|s| s.id != done.id));

        assert_eq!(repo.find_by_creator(5).await.unwrap().len(), 2);
        assert_eq!(repo.find_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_missing_session() {
        let pool = setup_test_db().await;
        let repo = SessionRepository::new(pool);

        let session = Session::new(1, 1, "GHOST001", 60, Utc::now());
        let err = repo.update(&session).await.unwrap_err();
        assert!(matches!(err, DbError::SessionNotFound(_)));
    }
}
