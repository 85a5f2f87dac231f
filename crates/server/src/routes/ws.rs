use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;

use websocket::WsState;

use crate::state::AppState;

/// Upgrades to a WebSocket that streams session rooms chosen with
/// `subscribe` messages.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    tracing::debug!("WebSocket upgrade requested");
    let ws_state = Arc::new(WsState::new(state.event_bus.clone()));
    websocket::ws_handler(ws, State(ws_state)).await
}
