//! Admin user management

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use crate::handlers::{ok, AppState};
use crate::middleware::AdminUser;
use crate::models::{Pagination, UpdateUserRequest};
use crate::utils::errors::Result;

/// `GET /api/admin/users`
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse> {
    let users = state.services.user_service.list_users(pagination).await?;
    Ok(ok(users))
}

/// `PUT /api/admin/users/:id`
pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse> {
    let user = state.services.user_service.update_user(id, request, admin.user_id).await?;
    Ok(ok(user))
}
