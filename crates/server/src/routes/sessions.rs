use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempo_core::{Session, SessionView};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct CreateSessionRequest {
    pub game_format_id: i64,
    pub creator_id: i64,
    /// Total budget of the session in seconds
    pub budget_seconds: i64,
    /// Start automatically at this instant. Past instants start immediately.
    #[serde(default)]
    pub scheduled_start: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ExtendSessionRequest {
    pub additional_seconds: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListSessionsQuery {
    /// Only sessions created by this user
    pub creator_id: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/api/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionView),
        (status = 400, description = "Unknown game format"),
        (status = 422, description = "Invalid budget")
    ),
    tag = "sessions"
)]
pub async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let view = state
        .orchestrator
        .create(
            payload.game_format_id,
            payload.creator_id,
            payload.budget_seconds,
            payload.scheduled_start,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[utoipa::path(
    get,
    path = "/api/sessions",
    params(ListSessionsQuery),
    responses(
        (status = 200, description = "Sessions, newest first", body = Vec<Session>)
    ),
    tag = "sessions"
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<Session>>, AppError> {
    let sessions = state.orchestrator.list(query.creator_id).await?;
    Ok(Json(sessions))
}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Live session status", body = SessionView),
        (status = 404, description = "Session not found")
    ),
    tag = "sessions"
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.orchestrator.status(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/start",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session started", body = SessionView),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session is not pending")
    ),
    tag = "sessions"
)]
pub async fn start_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.orchestrator.start(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/pause",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session paused", body = SessionView),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session is not active")
    ),
    tag = "sessions"
)]
pub async fn pause_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.orchestrator.pause(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/resume",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session resumed", body = SessionView),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session is not paused")
    ),
    tag = "sessions"
)]
pub async fn resume_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.orchestrator.resume(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/complete",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session completed", body = SessionView),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session is pending or already completed")
    ),
    tag = "sessions"
)]
pub async fn complete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.orchestrator.complete(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/extend",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    request_body = ExtendSessionRequest,
    responses(
        (status = 200, description = "Budget extended", body = SessionView),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session already completed"),
        (status = 422, description = "Non-positive extension")
    ),
    tag = "sessions"
)]
pub async fn extend_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ExtendSessionRequest>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(
        state
            .orchestrator
            .extend(id, payload.additional_seconds)
            .await?,
    ))
}
