use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orchestrator::OrchestratorError;
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Orchestrator(OrchestratorError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Orchestrator(err) => orchestrator_status(err),
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

fn orchestrator_status(err: OrchestratorError) -> (StatusCode, &'static str, String) {
    let message = err.to_string();
    match err {
        OrchestratorError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", message),
        OrchestratorError::InvalidTransition { .. } => {
            (StatusCode::CONFLICT, "invalid_transition", message)
        }
        OrchestratorError::AlreadyCompleted(_) => {
            (StatusCode::CONFLICT, "already_completed", message)
        }
        OrchestratorError::SessionClosed(_) => (StatusCode::CONFLICT, "session_closed", message),
        OrchestratorError::InvalidFormat(_) => (StatusCode::BAD_REQUEST, "invalid_format", message),
        OrchestratorError::Validation(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", message)
        }
        OrchestratorError::Stale => (StatusCode::CONFLICT, "stale", message),
        OrchestratorError::Database(e) => {
            tracing::error!(error = ?e, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "database_error",
                "Database error occurred".to_string(),
            )
        }
        OrchestratorError::Templates(e) => {
            tracing::error!(error = %e, "Template lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Template lookup failed".to_string(),
            )
        }
    }
}

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        AppError::Orchestrator(err)
    }
}
