//! Public event and category handlers

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use crate::handlers::{ok, AppState};
use crate::models::{EventQuery, Pagination};
use crate::utils::errors::Result;

/// `GET /api/events`
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse> {
    let events = state.services.event_service.list_published(&query, pagination).await?;
    Ok(ok(events))
}

/// `GET /api/events/:id`
pub async fn get_event(State(state): State<AppState>, Path(id): Path<i64>) -> Result<impl IntoResponse> {
    let event = state.services.event_service.get_published(id).await?;
    Ok(ok(event))
}

/// `GET /api/categories`
pub async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let categories = state.services.event_service.list_categories().await?;
    Ok(ok(categories))
}
