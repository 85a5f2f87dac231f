use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Already completed: {0}")]
    AlreadyCompleted(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),
}
