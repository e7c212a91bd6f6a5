//! Admin event and category management

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use crate::handlers::{ok, AppState};
use crate::middleware::AdminUser;
use crate::models::{
    CreateCategoryRequest, CreateEventRequest, EventQuery, Pagination, UpdateCategoryRequest,
    UpdateEventRequest,
};
use crate::utils::errors::Result;

/// `GET /api/admin/events`
pub async fn list_events(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<EventQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse> {
    let events = state.services.event_service.list_all(&query, pagination).await?;
    Ok(ok(events))
}

/// `POST /api/admin/events`
pub async fn create_event(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(request): Json<CreateEventRequest>,
) -> Result<impl IntoResponse> {
    let event = state.services.event_service.create(request, admin.user_id).await?;
    Ok((StatusCode::CREATED, ok(event)))
}

/// `PUT /api/admin/events/:id`
pub async fn update_event(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateEventRequest>,
) -> Result<impl IntoResponse> {
    let event = state.services.event_service.update(id, request, admin.user_id).await?;
    Ok(ok(event))
}

/// `DELETE /api/admin/events/:id`
pub async fn delete_event(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.services.event_service.delete(id, admin.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/admin/categories`
pub async fn create_category(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(request): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse> {
    let category = state.services.event_service.create_category(request, admin.user_id).await?;
    Ok((StatusCode::CREATED, ok(category)))
}

/// `PUT /api/admin/categories/:id`
pub async fn update_category(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateCategoryRequest>,
) -> Result<impl IntoResponse> {
    let category = state.services.event_service.update_category(id, request, admin.user_id).await?;
    Ok(ok(category))
}

/// `DELETE /api/admin/categories/:id`
pub async fn delete_category(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.services.event_service.delete_category(id, admin.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
