use db::DbError;
use tempo_core::CoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Session already completed: {0}")]
    AlreadyCompleted(Uuid),

    #[error("Game format {0} has no usable phases")]
    InvalidFormat(i64),

    #[error("Session is closed: {0}")]
    SessionClosed(Uuid),

    /// A deadline fired that no longer matches durable state.
    #[error("Stale deadline")]
    Stale,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[source] DbError),

    #[error("Template lookup failed: {0}")]
    Templates(String),
}

impl OrchestratorError {
    pub fn session_not_found(id: Uuid) -> Self {
        Self::NotFound(format!("session {}", id))
    }

    pub fn invalid_transition(from: &str, to: &str) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl From<CoreError> for OrchestratorError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidStatusTransition { from, to } => Self::InvalidTransition { from, to },
            CoreError::AlreadyCompleted(id) => Self::AlreadyCompleted(id),
            CoreError::Validation(msg) => Self::Validation(msg),
        }
    }
}

impl From<DbError> for OrchestratorError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Terminal(id) => Self::AlreadyCompleted(id),
            DbError::SessionNotFound(id) => Self::session_not_found(id),
            other => Self::Database(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
