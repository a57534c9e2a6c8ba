use axum::{response::IntoResponse, Json};
use serde_json::json;

/// Liveness probe; unauthenticated by design.
pub async fn health() -> axum::response::Response {
    Json(json!({ "status": "UP" })).into_response()
}
