//! Health endpoints

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use crate::handlers::AppState;

/// `GET /api/health`: liveness only, no dependencies touched
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": crate::VERSION }))
}

/// `GET /api/health/ready`: database and Redis reachability
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.services.health_check().await;
    let code = if status.is_healthy() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (code, Json(json!({
        "status": if status.is_healthy() { "ok" } else { "degraded" },
        "database": status.database_healthy,
        "redis": status.redis_healthy,
        "issues": status.get_issues(),
    })))
}
