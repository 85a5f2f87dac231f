use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use orchestrator::JoinResult;
use serde::{Deserialize, Serialize};
use tempo_core::PlayerMembership;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct JoinSessionRequest {
    pub join_code: String,
    pub player_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct AddPlayerRequest {
    pub player_id: i64,
}

/// 201 for a new membership, 200 when the player was already in.
fn join_status(result: &JoinResult) -> StatusCode {
    if result.joined {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

#[utoipa::path(
    post,
    path = "/api/sessions/join",
    request_body = JoinSessionRequest,
    responses(
        (status = 201, description = "Player joined", body = JoinResult),
        (status = 200, description = "Player was already a member", body = JoinResult),
        (status = 400, description = "Empty join code"),
        (status = 404, description = "Unknown join code"),
        (status = 409, description = "Session already completed")
    ),
    tag = "players"
)]
pub async fn join_session(
    State(state): State<AppState>,
    Json(payload): Json<JoinSessionRequest>,
) -> Result<(StatusCode, Json<JoinResult>), AppError> {
    if payload.join_code.trim().is_empty() {
        return Err(AppError::BadRequest("join_code is required".to_string()));
    }

    let result = state
        .orchestrator
        .join(&payload.join_code, payload.player_id)
        .await?;
    Ok((join_status(&result), Json(result)))
}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/players",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    request_body = AddPlayerRequest,
    responses(
        (status = 201, description = "Player added", body = JoinResult),
        (status = 200, description = "Player was already a member", body = JoinResult),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session already completed")
    ),
    tag = "players"
)]
pub async fn add_player(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddPlayerRequest>,
) -> Result<(StatusCode, Json<JoinResult>), AppError> {
    let result = state.orchestrator.add_player(id, payload.player_id).await?;
    Ok((join_status(&result), Json(result)))
}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}/players",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Members in join order", body = Vec<PlayerMembership>),
        (status = 404, description = "Session not found")
    ),
    tag = "players"
)]
pub async fn list_players(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PlayerMembership>>, AppError> {
    Ok(Json(state.orchestrator.players(id).await?))
}
