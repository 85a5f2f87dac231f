//! The durable store seen by the orchestrator.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tempo_core::{PhaseSession, PlayerMembership, Session};
use uuid::Uuid;

use crate::error::DbError;
use crate::repositories::{
    MembershipRepository, PhaseSessionRepository, SessionRepository,
};

/// Persistence seam for sessions, their phases and memberships.
///
/// Writes are all-or-nothing: either every record passed to a call is
/// stored or none is. Completed records are never rewritten; attempting to
/// yields [`DbError::Terminal`].
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores a new session together with its phases.
    async fn insert_session(&self, session: &Session, phases: &[PhaseSession]) -> Result<(), DbError>;

    /// Stores a session and the phases that changed alongside it.
    async fn save(&self, session: &Session, phases: &[PhaseSession]) -> Result<(), DbError>;

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>, DbError>;

    async fn find_session_by_join_code(&self, join_code: &str) -> Result<Option<Session>, DbError>;

    /// Newest first, optionally only one creator's sessions.
    async fn list_sessions(&self, creator_id: Option<i64>) -> Result<Vec<Session>, DbError>;

    /// Every session that is not completed.
    async fn open_sessions(&self) -> Result<Vec<Session>, DbError>;

    /// Phases of a session in position order.
    async fn find_phases(&self, session_id: Uuid) -> Result<Vec<PhaseSession>, DbError>;

    /// Returns whether a new membership row was written.
    async fn add_member(&self, membership: &PlayerMembership) -> Result<bool, DbError>;

    async fn members(&self, session_id: Uuid) -> Result<Vec<PlayerMembership>, DbError>;

    async fn load(&self, id: Uuid) -> Result<Option<(Session, Vec<PhaseSession>)>, DbError> {
        match self.find_session(id).await? {
            Some(session) => {
                let phases = self.find_phases(id).await?;
                Ok(Some((session, phases)))
            }
            None => Ok(None),
        }
    }
}

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    sessions: SessionRepository,
    phases: PhaseSessionRepository,
    memberships: MembershipRepository,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            sessions: SessionRepository::new(pool.clone()),
            phases: PhaseSessionRepository::new(pool.clone()),
            memberships: MembershipRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn insert_session(&self, session: &Session, phases: &[PhaseSession]) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        SessionRepository::insert(&mut tx, session).await?;
        for phase in phases {
            PhaseSessionRepository::insert(&mut tx, phase).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn save(&self, session: &Session, phases: &[PhaseSession]) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        // Phases first: a session completing in this call would otherwise
        // be frozen before its phases are written.
        for phase in phases {
            PhaseSessionRepository::update_in(&mut tx, phase).await?;
        }
        SessionRepository::update_in(&mut tx, session).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>, DbError> {
        self.sessions.find_by_id(id).await
    }

    /// Reads the session and its phases from one snapshot.
    async fn load(&self, id: Uuid) -> Result<Option<(Session, Vec<PhaseSession>)>, DbError> {
        let mut tx = self.pool.begin().await?;
        let Some(session) = SessionRepository::fetch(&mut tx, id).await? else {
            return Ok(None);
        };
        let phases = PhaseSessionRepository::fetch_for_session(&mut tx, id).await?;
        tx.commit().await?;
        Ok(Some((session, phases)))
    }

    async fn find_session_by_join_code(&self, join_code: &str) -> Result<Option<Session>, DbError> {
        self.sessions.find_by_join_code(join_code).await
    }

    async fn list_sessions(&self, creator_id: Option<i64>) -> Result<Vec<Session>, DbError> {
        match creator_id {
            Some(creator_id) => self.sessions.find_by_creator(creator_id).await,
            None => self.sessions.find_all().await,
        }
    }

    async fn open_sessions(&self) -> Result<Vec<Session>, DbError> {
        self.sessions.find_open().await
    }

    async fn find_phases(&self, session_id: Uuid) -> Result<Vec<PhaseSession>, DbError> {
        self.phases.find_by_session(session_id).await
    }

    async fn add_member(&self, membership: &PlayerMembership) -> Result<bool, DbError> {
        self.memberships.add(membership).await
    }

    async fn members(&self, session_id: Uuid) -> Result<Vec<PlayerMembership>, DbError> {
        self.memberships.find_by_session(session_id).await
    }
}
