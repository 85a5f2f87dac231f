use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use db::{PhaseTemplateRepository, SqliteStore};
use events::EventBus;
use orchestrator::SessionOrchestrator;
use serde_json::{json, Value};
use server::{create_router, state::AppState};
use tempfile::TempDir;
use tempo_core::PhaseTemplate;

/// Format 1 has two long phases, format 2 a single one-second phase.
async fn setup_test_server() -> (TestServer, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite:{}", db_path.display());

    let pool = db::create_pool(&db_url).await.expect("Failed to create pool");
    db::run_migrations(&pool).await.expect("Failed to run migrations");

    let templates = PhaseTemplateRepository::new(pool.clone());
    templates
        .replace_format(
            1,
            &[
                PhaseTemplate::new(1, 10, 1, "Warmup", 300),
                PhaseTemplate::new(1, 11, 2, "Main", 600),
            ],
        )
        .await
        .expect("Failed to seed templates");
    templates
        .replace_format(2, &[PhaseTemplate::new(2, 20, 1, "Sprint", 1)])
        .await
        .expect("Failed to seed templates");

    let orchestrator = SessionOrchestrator::new(
        Arc::new(SqliteStore::new(pool)),
        Arc::new(templates),
        EventBus::new(),
    );
    let app = create_router(AppState::new(orchestrator));
    let server = TestServer::new(app).expect("Failed to create test server");

    (server, temp_dir)
}

async fn create_session(server: &TestServer, format: i64, creator: i64) -> Value {
    let response = server
        .post("/api/sessions")
        .json(&json!({
            "game_format_id": format,
            "creator_id": creator,
            "budget_seconds": 1200
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

fn session_id(view: &Value) -> String {
    view["session"]["id"].as_str().unwrap().to_string()
}

mod health {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint() {
        let (server, _temp_dir) = setup_test_server().await;

        let response = server.get("/health").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_openapi_document_lists_session_routes() {
        let (server, _temp_dir) = setup_test_server().await;

        let response = server.get("/api/openapi.json").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert!(body["paths"]["/api/sessions"].is_object());
        assert!(body["paths"]["/api/sessions/{id}/pause"].is_object());
        assert!(body["paths"]["/api/sessions/join"].is_object());
    }
}

mod sessions {
    use super::*;

    #[tokio::test]
    async fn test_create_returns_pending_view() {
        let (server, _temp_dir) = setup_test_server().await;

        let body = create_session(&server, 1, 7).await;

        assert_eq!(body["session"]["status"], "pending");
        assert_eq!(body["session"]["creator_id"], 7);
        assert_eq!(body["remaining_seconds"], 1200);
        assert_eq!(body["phases"].as_array().unwrap().len(), 2);
        assert_eq!(body["phases"][0]["phase"]["status"], "pending");
        assert_eq!(body["session"]["join_code"].as_str().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_format() {
        let (server, _temp_dir) = setup_test_server().await;

        let response = server
            .post("/api/sessions")
            .json(&json!({
                "game_format_id": 99,
                "creator_id": 1,
                "budget_seconds": 60
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"], "invalid_format");
    }

    #[tokio::test]
    async fn test_create_rejects_non_positive_budget() {
        let (server, _temp_dir) = setup_test_server().await;

        let response = server
            .post("/api/sessions")
            .json(&json!({
                "game_format_id": 1,
                "creator_id": 1,
                "budget_seconds": 0
            }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let (server, _temp_dir) = setup_test_server().await;
        let id = session_id(&create_session(&server, 1, 1).await);

        let response = server.post(&format!("/api/sessions/{}/start", id)).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["session"]["status"], "active");
        assert_eq!(body["active_phase"]["phase"]["status"], "active");
        assert_eq!(body["active_phase"]["phase"]["position"], 1);

        let response = server.post(&format!("/api/sessions/{}/pause", id)).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["session"]["status"], "paused");
        assert_eq!(body["active_phase"]["phase"]["status"], "paused");

        let response = server.post(&format!("/api/sessions/{}/resume", id)).await;
        response.assert_status_ok();

        let response = server
            .post(&format!("/api/sessions/{}/extend", id))
            .json(&json!({ "additional_seconds": 60 }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["session"]["budget_seconds"], 1260);

        let response = server.post(&format!("/api/sessions/{}/complete", id)).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["session"]["status"], "completed");
        assert_eq!(body["remaining_seconds"], 0);
        for phase in body["phases"].as_array().unwrap() {
            assert_eq!(phase["phase"]["status"], "completed");
        }
    }

    #[tokio::test]
    async fn test_second_complete_conflicts() {
        let (server, _temp_dir) = setup_test_server().await;
        let id = session_id(&create_session(&server, 1, 1).await);
        server.post(&format!("/api/sessions/{}/start", id)).await;
        server
            .post(&format!("/api/sessions/{}/complete", id))
            .await
            .assert_status_ok();

        let response = server.post(&format!("/api/sessions/{}/complete", id)).await;

        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["error"], "already_completed");
    }

    #[tokio::test]
    async fn test_pause_pending_conflicts() {
        let (server, _temp_dir) = setup_test_server().await;
        let id = session_id(&create_session(&server, 1, 1).await);

        let response = server.post(&format!("/api/sessions/{}/pause", id)).await;

        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["error"], "invalid_transition");
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let (server, _temp_dir) = setup_test_server().await;
        let id = uuid::Uuid::new_v4();

        server
            .get(&format!("/api/sessions/{}", id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .post(&format!("/api/sessions/{}/start", id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .get(&format!("/api/sessions/{}/events", id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_filters_by_creator() {
        let (server, _temp_dir) = setup_test_server().await;
        create_session(&server, 1, 5).await;
        create_session(&server, 1, 5).await;
        create_session(&server, 1, 6).await;

        let all: Value = server.get("/api/sessions").await.json();
        assert_eq!(all.as_array().unwrap().len(), 3);

        let mine: Value = server
            .get("/api/sessions")
            .add_query_param("creator_id", 5)
            .await
            .json();
        assert_eq!(mine.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_single_phase_session_completes_on_its_own() {
        let (server, _temp_dir) = setup_test_server().await;
        let id = session_id(&create_session(&server, 2, 1).await);
        server
            .post(&format!("/api/sessions/{}/start", id))
            .await
            .assert_status_ok();

        tokio::time::sleep(Duration::from_millis(2500)).await;

        let body: Value = server.get(&format!("/api/sessions/{}", id)).await.json();
        assert_eq!(body["session"]["status"], "completed");
        assert_eq!(body["phases"][0]["phase"]["status"], "completed");
        assert_eq!(body["phases"][0]["phase"]["elapsed_ms"], 1000);
    }
}

mod players {
    use super::*;

    #[tokio::test]
    async fn test_join_by_code_is_idempotent() {
        let (server, _temp_dir) = setup_test_server().await;
        let created = create_session(&server, 1, 1).await;
        let id = session_id(&created);
        let code = created["session"]["join_code"].as_str().unwrap();

        let response = server
            .post("/api/sessions/join")
            .json(&json!({ "join_code": code, "player_id": 42 }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["joined"], true);
        assert_eq!(body["session_id"], id.as_str());

        let response = server
            .post(&format!("/api/sessions/{}/players", id))
            .json(&json!({ "player_id": 42 }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["joined"], false);

        let players: Value = server
            .get(&format!("/api/sessions/{}/players", id))
            .await
            .json();
        assert_eq!(players.as_array().unwrap().len(), 1);
        assert_eq!(players[0]["player_id"], 42);
    }

    #[tokio::test]
    async fn test_join_errors() {
        let (server, _temp_dir) = setup_test_server().await;

        server
            .post("/api/sessions/join")
            .json(&json!({ "join_code": "NOPE0000", "player_id": 1 }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .post("/api/sessions/join")
            .json(&json!({ "join_code": "  ", "player_id": 1 }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let created = create_session(&server, 1, 1).await;
        let id = session_id(&created);
        server.post(&format!("/api/sessions/{}/start", id)).await;
        server.post(&format!("/api/sessions/{}/complete", id)).await;

        let response = server
            .post("/api/sessions/join")
            .json(&json!({
                "join_code": created["session"]["join_code"],
                "player_id": 1
            }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["error"], "session_closed");
    }
}
