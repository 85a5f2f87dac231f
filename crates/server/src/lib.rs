pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tempo API",
        version = "0.1.0",
        description = "Timed multi-phase sessions with pause, resume and automatic phase advance"
    ),
    paths(
        routes::health_check,
        routes::create_session,
        routes::list_sessions,
        routes::get_session,
        routes::start_session,
        routes::pause_session,
        routes::resume_session,
        routes::complete_session,
        routes::extend_session,
        routes::join_session,
        routes::add_player,
        routes::list_players,
        routes::sse::session_events_stream,
    ),
    components(schemas(
        routes::HealthResponse,
        routes::CreateSessionRequest,
        routes::ExtendSessionRequest,
        routes::JoinSessionRequest,
        routes::AddPlayerRequest,
        orchestrator::JoinResult,
        tempo_core::Session,
        tempo_core::SessionStatus,
        tempo_core::PhaseSession,
        tempo_core::PhaseStatus,
        tempo_core::PhaseView,
        tempo_core::SessionView,
        tempo_core::PlayerMembership,
        events::EventEnvelope,
        events::Event,
    )),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sessions", description = "Session lifecycle endpoints"),
        (name = "players", description = "Join and membership endpoints"),
        (name = "events", description = "Real-time event streaming (SSE)"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
        .route("/health", get(routes::health_check))
        .route(
            "/api/sessions",
            get(routes::list_sessions).post(routes::create_session),
        )
        .route("/api/sessions/join", post(routes::join_session))
        .route("/api/sessions/{id}", get(routes::get_session))
        .route("/api/sessions/{id}/start", post(routes::start_session))
        .route("/api/sessions/{id}/pause", post(routes::pause_session))
        .route("/api/sessions/{id}/resume", post(routes::resume_session))
        .route("/api/sessions/{id}/complete", post(routes::complete_session))
        .route("/api/sessions/{id}/extend", post(routes::extend_session))
        .route(
            "/api/sessions/{id}/players",
            get(routes::list_players).post(routes::add_player),
        )
        .route(
            "/api/sessions/{id}/events",
            get(routes::sse::session_events_stream),
        )
        .route("/ws", get(routes::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
