#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use thematic_api::config::ServerConfig;
use thematic_api::router::build_app_router;
use thematic_api::state::AppState;
use thematic_db::models::text_cell::{CreateTextCell, TextCell};
use thematic_db::MemoryStore;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        min_annotatable_confidence: 0.7,
    }
}

/// Build the full application router over `store`, with the same
/// middleware stack production uses.
pub fn build_test_app(store: Arc<MemoryStore>) -> Router {
    build_app_router(AppState::new(store, test_config()))
}

/// Insert an unclassified cell whose column header is `question`.
pub async fn seed_cell(
    store: &MemoryStore,
    document_id: i64,
    row_index: i32,
    question: &str,
    text: &str,
) -> TextCell {
    store
        .insert_cell(CreateTextCell {
            document_id,
            sheet_name: Some("Risposte".to_string()),
            row_index,
            column_index: 0,
            column_name: Some(question.to_string()),
            text_content: text.to_string(),
        })
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn put_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body)).await
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
