//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws` (one quiz session per connection)
/// - Stateless API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/levels", get(http::http_levels))
        .route("/api/v1/words", get(http::http_get_words))
        .route("/api/v1/rules", get(http::http_get_rules))
        .route("/api/v1/speech", post(http::http_post_speech))
        .route("/api/v1/evaluate", post(http::http_post_evaluate))
        .route("/api/v1/share", post(http::http_post_share))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::collaborator::GenerationCollaborator;
    use crate::config::AgentConfig;
    use crate::mock::MockCollaborator;
    use crate::seeds::{bundled_words, default_rules};
    use crate::session::SessionState;

    fn app(mock: Option<MockCollaborator>) -> Router {
        let collab = mock.map(|m| Arc::new(m) as Arc<dyn GenerationCollaborator>);
        build_router(Arc::new(AppState::from_parts(AgentConfig::default(), collab)))
    }

    async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_generation() {
        let (status, body) = call(app(None), get("/api/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true, "generation": false}));
    }

    #[tokio::test]
    async fn levels_list_all_six() {
        let (_, body) = call(app(None), get("/api/v1/levels")).await;
        assert_eq!(body["levels"], json!(["A1", "A2", "B1", "B2", "C1", "C2"]));
        assert_eq!(body["default"], "B1");
    }

    #[tokio::test]
    async fn static_words_skip_exclusions() {
        let (status, body) = call(app(None), get("/api/v1/words?difficulty=a2&exclude=walked,%20played")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["difficulty"], "A2");
        assert_eq!(body["origin"], "static");
        let words: Vec<&str> = body["words"].as_array().unwrap().iter().map(|w| w["word"].as_str().unwrap()).collect();
        assert_eq!(words.len(), 8);
        assert!(!words.contains(&"walked"));
        assert!(!words.contains(&"played"));
    }

    #[tokio::test]
    async fn failed_generation_serves_the_bank() {
        let (_, body) = call(app(Some(MockCollaborator::new().with_words(vec![]))), get("/api/v1/words")).await;
        assert_eq!(body["origin"], "fallback");
        assert_eq!(body["words"].as_array().unwrap().len(), bundled_words().len());
    }

    #[tokio::test]
    async fn unknown_difficulty_is_rejected() {
        let (status, body) = call(app(None), get("/api/v1/words?difficulty=Z9")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Z9"));
    }

    #[tokio::test]
    async fn rules_fall_back_to_defaults() {
        let (_, body) = call(app(None), get("/api/v1/rules")).await;
        assert_eq!(body["origin"], "default");
        assert_eq!(body["rules"].as_array().unwrap().len(), default_rules().len());
    }

    #[tokio::test]
    async fn speech_unavailable_without_collaborator() {
        let (status, body) = call(app(None), post_json("/api/v1/speech", json!({"text": "walked"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"available": false}));
    }

    #[tokio::test]
    async fn evaluate_threads_client_state() {
        let state = SessionState::new(bundled_words()[..2].to_vec());
        let (status, body) =
            call(app(None), post_json("/api/v1/evaluate", json!({"state": state, "choice": "/t/"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["correct"], true);
        assert_eq!(body["finished"], false);
        assert_eq!(body["state"]["currentIndex"], 1);
        assert_eq!(body["state"]["score"], 1);

        let (_, body) = call(app(None), post_json("/api/v1/evaluate", json!({"state": body["state"], "choice": "t"}))).await;
        assert_eq!(body["correct"], false);
        assert_eq!(body["finished"], true);
        assert_eq!(body["state"]["mode"], "results");
    }

    #[tokio::test]
    async fn evaluate_past_the_end_is_unprocessable() {
        let mut state = SessionState::new(bundled_words()[..1].to_vec());
        state.current_index = 1;
        let (status, _) = call(app(None), post_json("/api/v1/evaluate", json!({"state": state, "choice": "d"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = call(app(None), post_json("/api/v1/evaluate", json!({"state": state, "choice": "x"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn evaluate_rejects_a_finished_state_with_spare_items() {
        let mut state = SessionState::new(bundled_words()[..2].to_vec());
        state.total_questions = 1;
        state.current_index = 1;
        state.score = 1;
        state.mode = crate::domain::Mode::Results;
        let (status, body) = call(app(None), post_json("/api/v1/evaluate", json!({"state": state, "choice": "d"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("index 1"));
    }

    #[tokio::test]
    async fn share_builds_a_mail_link() {
        let state = SessionState::new(bundled_words()[..1].to_vec());
        let (status, body) =
            call(app(None), post_json("/api/v1/share", json!({"state": state, "difficulty": "C1"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subject"], "My English Pronunciation Practice");
        assert!(body["body"].as_str().unwrap().contains("(Level C1)"));
        assert!(body["url"].as_str().unwrap().starts_with("https://mail.google.com/"));
    }
}
