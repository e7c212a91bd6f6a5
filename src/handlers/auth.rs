//! Account registration and login handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use crate::handlers::{ok, AppState};
use crate::middleware::AuthUser;
use crate::models::{LoginRequest, RegisterRequest};
use crate::utils::errors::Result;

/// `POST /api/auth/register`
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let response = state.services.auth_service.register(request).await?;
    Ok((StatusCode::CREATED, ok(response)))
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let response = state.services.auth_service.login(request).await?;
    Ok(ok(response))
}

/// `GET /api/auth/me`
pub async fn me(State(state): State<AppState>, AuthUser(auth): AuthUser) -> Result<impl IntoResponse> {
    let user = state.services.user_service.get_user(auth.user_id).await?;
    Ok(ok(user))
}
