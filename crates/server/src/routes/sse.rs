use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::stream::StreamExt;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub const SSE_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

fn envelope_to_sse_event(envelope: &events::EventEnvelope) -> Result<Event, Infallible> {
    let data = serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string());

    Ok(Event::default()
        .id(envelope.sequence.to_string())
        .event(envelope.event.kind())
        .data(data))
}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}/events",
    params(
        ("id" = Uuid, Path, description = "Session ID"),
    ),
    responses(
        (status = 200, description = "SSE stream of the session's events"),
        (status = 404, description = "Session not found"),
    ),
    tag = "events"
)]
pub async fn session_events_stream(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    // Subscribe before the existence check so nothing published in between
    // is missed.
    let rx = state.event_bus.subscribe_room(id).into_inner();
    state.orchestrator.status(id).await?;

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(envelope) if envelope.event.session_id() == id => {
                Some(envelope_to_sse_event(&envelope))
            }
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(n)) => {
                tracing::warn!(session_id = %id, missed = n, "SSE client lagged");
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(SSE_KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    ))
}
