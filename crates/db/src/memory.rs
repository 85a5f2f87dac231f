//! In-memory [`SessionStore`] used by tests and simulated-time scenarios.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tempo_core::{PhaseSession, PhaseStatus, PlayerMembership, Session, SessionStatus};
use uuid::Uuid;

use crate::error::DbError;
use crate::store::SessionStore;

#[derive(Default)]
struct Tables {
    sessions: HashMap<Uuid, Session>,
    phases: HashMap<Uuid, PhaseSession>,
    memberships: Vec<PlayerMembership>,
}

/// Applies the same guards as the SQLite store: unique join codes,
/// completed records frozen, all-or-nothing writes.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail until switched back off.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_writable(&self) -> Result<(), DbError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DbError::Sqlx(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, session: &Session, phases: &[PhaseSession]) -> Result<(), DbError> {
        self.check_writable()?;
        let mut tables = self.tables();

        if tables.sessions.values().any(|s| s.join_code == session.join_code) {
            return Err(DbError::JoinCodeTaken(session.join_code.clone()));
        }
        tables.sessions.insert(session.id, session.clone());
        for phase in phases {
            tables.phases.insert(phase.id, phase.clone());
        }
        Ok(())
    }

    async fn save(&self, session: &Session, phases: &[PhaseSession]) -> Result<(), DbError> {
        self.check_writable()?;
        let mut tables = self.tables();

        // Validate everything before touching anything.
        match tables.sessions.get(&session.id) {
            None => return Err(DbError::SessionNotFound(session.id)),
            Some(s) if s.status == SessionStatus::Completed => {
                return Err(DbError::Terminal(session.id))
            }
            Some(_) => {}
        }
        for phase in phases {
            match tables.phases.get(&phase.id) {
                None => return Err(DbError::PhaseSessionNotFound(phase.id)),
                Some(p) if p.status == PhaseStatus::Completed => {
                    return Err(DbError::Terminal(phase.id))
                }
                Some(_) => {}
            }
        }

        for phase in phases {
            tables.phases.insert(phase.id, phase.clone());
        }
        if let Some(stored) = tables.sessions.get_mut(&session.id) {
            let join_code = std::mem::take(&mut stored.join_code);
            *stored = session.clone();
            stored.join_code = join_code;
        }
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>, DbError> {
        Ok(self.tables().sessions.get(&id).cloned())
    }

    async fn load(&self, id: Uuid) -> Result<Option<(Session, Vec<PhaseSession>)>, DbError> {
        let tables = self.tables();
        let Some(session) = tables.sessions.get(&id).cloned() else {
            return Ok(None);
        };
        let mut phases: Vec<PhaseSession> = tables
            .phases
            .values()
            .filter(|p| p.session_id == id)
            .cloned()
            .collect();
        phases.sort_by_key(|p| p.position);
        Ok(Some((session, phases)))
    }

    async fn find_session_by_join_code(&self, join_code: &str) -> Result<Option<Session>, DbError> {
        Ok(self
            .tables()
            .sessions
            .values()
            .find(|s| s.join_code == join_code)
            .cloned())
    }

    async fn list_sessions(&self, creator_id: Option<i64>) -> Result<Vec<Session>, DbError> {
        let mut sessions: Vec<Session> = self
            .tables()
            .sessions
            .values()
            .filter(|s| creator_id.map_or(true, |c| s.creator_id == c))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn open_sessions(&self) -> Result<Vec<Session>, DbError> {
        let mut sessions: Vec<Session> = self
            .tables()
            .sessions
            .values()
            .filter(|s| s.status != SessionStatus::Completed)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }

    async fn find_phases(&self, session_id: Uuid) -> Result<Vec<PhaseSession>, DbError> {
        let mut phases: Vec<PhaseSession> = self
            .tables()
            .phases
            .values()
            .filter(|p| p.session_id == session_id)
            .cloned()
            .collect();
        phases.sort_by_key(|p| p.position);
        Ok(phases)
    }

    async fn add_member(&self, membership: &PlayerMembership) -> Result<bool, DbError> {
        self.check_writable()?;
        let mut tables = self.tables();

        if !tables.sessions.contains_key(&membership.session_id) {
            return Err(DbError::SessionNotFound(membership.session_id));
        }
        let exists = tables.memberships.iter().any(|m| {
            m.player_id == membership.player_id && m.session_id == membership.session_id
        });
        if exists {
            return Ok(false);
        }
        tables.memberships.push(membership.clone());
        Ok(true)
    }

    async fn members(&self, session_id: Uuid) -> Result<Vec<PlayerMembership>, DbError> {
        let mut members: Vec<PlayerMembership> = self
            .tables()
            .memberships
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.player_id.cmp(&b.player_id)));
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempo_core::PhaseTemplate;

    fn fixture(code: &str) -> (Session, Vec<PhaseSession>) {
        let session = Session::new(1, 1, code, 10, Utc::now());
        let phases = vec![
            PhaseSession::from_template(session.id, &PhaseTemplate::new(1, 2, 2, "B", 5)),
            PhaseSession::from_template(session.id, &PhaseTemplate::new(1, 1, 1, "A", 5)),
        ];
        (session, phases)
    }

    #[tokio::test]
    async fn test_join_code_unique() {
        let store = MemoryStore::new();
        let (a, a_phases) = fixture("SAME");
        let (b, b_phases) = fixture("SAME");

        store.insert_session(&a, &a_phases).await.unwrap();
        let err = store.insert_session(&b, &b_phases).await.unwrap_err();
        assert!(matches!(err, DbError::JoinCodeTaken(_)));
        assert!(store.find_session(b.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_phases_come_back_in_order() {
        let store = MemoryStore::new();
        let (session, phases) = fixture("ORDER");
        store.insert_session(&session, &phases).await.unwrap();

        let loaded = store.find_phases(session.id).await.unwrap();
        assert_eq!(loaded[0].position, 1);
        assert_eq!(loaded[1].position, 2);
    }

    #[tokio::test]
    async fn test_save_rejects_completed_without_partial_write() {
        let store = MemoryStore::new();
        let (mut session, mut phases) = fixture("FROZEN");
        store.insert_session(&session, &phases).await.unwrap();

        let now = Utc::now();
        phases[0].complete(now).unwrap();
        store.save(&session, &phases[..1]).await.unwrap();

        session.extend(5).unwrap();
        let err = store.save(&session, &phases).await.unwrap_err();
        assert!(matches!(err, DbError::Terminal(_)));
        assert_eq!(store.find_session(session.id).await.unwrap().unwrap().budget_seconds, 10);
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let store = MemoryStore::new();
        let (session, phases) = fixture("FAIL");
        store.set_fail_writes(true);
        assert!(store.insert_session(&session, &phases).await.is_err());

        store.set_fail_writes(false);
        store.insert_session(&session, &phases).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_member_once() {
        let store = MemoryStore::new();
        let (session, phases) = fixture("JOIN");
        store.insert_session(&session, &phases).await.unwrap();

        let m = PlayerMembership::new(5, session.id, Utc::now());
        assert!(store.add_member(&m).await.unwrap());
        assert!(!store.add_member(&m).await.unwrap());
        assert_eq!(store.members(session.id).await.unwrap().len(), 1);
    }
}
