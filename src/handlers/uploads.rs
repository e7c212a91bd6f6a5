//! Serving uploaded event images

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use crate::handlers::AppState;
use crate::utils::errors::{MaabaraError, Result};

/// `GET /uploads/:file`
pub async fn serve_upload(State(state): State<AppState>, Path(file): Path<String>) -> Result<impl IntoResponse> {
    let (content_type, bytes) = state.services.upload_service.read_image(&file).await.map_err(|e| match e {
        MaabaraError::Io(_) | MaabaraError::InvalidInput(_) => MaabaraError::FileNotFound(file.clone()),
        other => other,
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        bytes,
    ))
}
