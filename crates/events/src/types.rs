//! Event types for the Tempo event system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempo_core::{PhaseStatus, SessionStatus};
use utoipa::ToSchema;
use uuid::Uuid;

/// Envelope wrapping all events with metadata
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// Position in the bus's publish order, assigned on publish
    #[serde(default)]
    pub sequence: u64,
    /// When the transition happened
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: Event,
}

impl EventEnvelope {
    /// Create a new event envelope stamped with the current wall clock
    pub fn new(event: Event) -> Self {
        Self::at(event, Utc::now())
    }

    /// Create an envelope for a transition that happened at `timestamp`
    pub fn at(event: Event, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            timestamp,
            event,
        }
    }
}

/// One event per state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    #[serde(rename = "session.created")]
    SessionCreated {
        session_id: Uuid,
        status: SessionStatus,
        join_code: String,
    },

    #[serde(rename = "session.started")]
    SessionStarted {
        session_id: Uuid,
        status: SessionStatus,
    },

    #[serde(rename = "session.paused")]
    SessionPaused {
        session_id: Uuid,
        status: SessionStatus,
    },

    #[serde(rename = "session.resumed")]
    SessionResumed {
        session_id: Uuid,
        status: SessionStatus,
    },

    #[serde(rename = "session.completed")]
    SessionCompleted {
        session_id: Uuid,
        status: SessionStatus,
    },

    /// Total budget was increased
    #[serde(rename = "session.extended")]
    SessionExtended {
        session_id: Uuid,
        status: SessionStatus,
        budget_seconds: i64,
    },

    #[serde(rename = "phase.started")]
    PhaseStarted {
        session_id: Uuid,
        phase_session_id: Uuid,
        position: i32,
        status: PhaseStatus,
    },

    #[serde(rename = "phase.completed")]
    PhaseCompleted {
        session_id: Uuid,
        phase_session_id: Uuid,
        position: i32,
        status: PhaseStatus,
    },

    #[serde(rename = "player.joined")]
    PlayerJoined {
        session_id: Uuid,
        player_id: i64,
    },
}

impl Event {
    /// The room this event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            Event::SessionCreated { session_id, .. }
            | Event::SessionStarted { session_id, .. }
            | Event::SessionPaused { session_id, .. }
            | Event::SessionResumed { session_id, .. }
            | Event::SessionCompleted { session_id, .. }
            | Event::SessionExtended { session_id, .. }
            | Event::PhaseStarted { session_id, .. }
            | Event::PhaseCompleted { session_id, .. }
            | Event::PlayerJoined { session_id, .. } => *session_id,
        }
    }

    pub fn phase_session_id(&self) -> Option<Uuid> {
        match self {
            Event::PhaseStarted {
                phase_session_id, ..
            }
            | Event::PhaseCompleted {
                phase_session_id, ..
            } => Some(*phase_session_id),
            _ => None,
        }
    }

    /// Wire name of the event, as used in the `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Event::SessionCreated { .. } => "session.created",
            Event::SessionStarted { .. } => "session.started",
            Event::SessionPaused { .. } => "session.paused",
            Event::SessionResumed { .. } => "session.resumed",
            Event::SessionCompleted { .. } => "session.completed",
            Event::SessionExtended { .. } => "session.extended",
            Event::PhaseStarted { .. } => "phase.started",
            Event::PhaseCompleted { .. } => "phase.completed",
            Event::PlayerJoined { .. } => "player.joined",
        }
    }
}
