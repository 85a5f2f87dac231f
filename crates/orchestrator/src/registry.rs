//! Player membership.
//!
//! Joining never takes the session lane: the store's unique key on
//! `(player_id, session_id)` is what keeps concurrent joins idempotent.

use events::{Event, EventEnvelope};
use serde::{Deserialize, Serialize};
use tempo_core::{PlayerMembership, Session, SessionStatus, Timed};
use tracing::info;
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::orchestrator::SessionOrchestrator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct JoinResult {
    pub session_id: Uuid,
    pub player_id: i64,
    pub status: SessionStatus,
    pub remaining_seconds: i64,
    /// `false` when the player was already a member.
    pub joined: bool,
}

impl SessionOrchestrator {
    /// Joins a session by its join code.
    pub async fn join(&self, join_code: &str, player_id: i64) -> Result<JoinResult> {
        let join_code = join_code.trim();
        let session = self
            .inner
            .store
            .find_session_by_join_code(join_code)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("join code {}", join_code)))?;
        self.admit(session, player_id).await
    }

    /// Adds a player to a session by id.
    pub async fn add_player(&self, session_id: Uuid, player_id: i64) -> Result<JoinResult> {
        let session = self
            .inner
            .store
            .find_session(session_id)
            .await?
            .ok_or_else(|| OrchestratorError::session_not_found(session_id))?;
        self.admit(session, player_id).await
    }

    /// Members of a session in join order.
    pub async fn players(&self, session_id: Uuid) -> Result<Vec<PlayerMembership>> {
        if self.inner.store.find_session(session_id).await?.is_none() {
            return Err(OrchestratorError::session_not_found(session_id));
        }
        Ok(self.inner.store.members(session_id).await?)
    }

    async fn admit(&self, session: Session, player_id: i64) -> Result<JoinResult> {
        if session.status == SessionStatus::Completed {
            return Err(OrchestratorError::SessionClosed(session.id));
        }

        let now = self.now();
        let membership = PlayerMembership::new(player_id, session.id, now);
        let joined = self.inner.store.add_member(&membership).await?;

        if joined {
            info!(session_id = %session.id, player_id, "Player joined");
            self.inner.event_bus.publish(EventEnvelope::at(
                Event::PlayerJoined {
                    session_id: session.id,
                    player_id,
                },
                now,
            ));
        }

        Ok(JoinResult {
            session_id: session.id,
            player_id,
            status: session.status,
            remaining_seconds: tempo_core::timing::millis_to_seconds_ceil(session.remaining_ms(now)),
            joined,
        })
    }
}
