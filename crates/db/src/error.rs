use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Phase session not found: {0}")]
    PhaseSessionNotFound(Uuid),

    #[error("Join code already in use: {0}")]
    JoinCodeTaken(String),

    /// A write targeted a record that is already completed.
    #[error("Record is completed and cannot change: {0}")]
    Terminal(Uuid),
}
