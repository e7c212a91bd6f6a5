//! Dashboard statistics, diagnostics and uploads

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use crate::handlers::{ok, AppState};
use crate::middleware::AdminUser;
use crate::utils::errors::{MaabaraError, Result};
use crate::utils::logging::log_admin_action;

/// `GET /api/admin/stats`
pub async fn stats(State(state): State<AppState>, AdminUser(_admin): AdminUser) -> Result<impl IntoResponse> {
    let stats = state.services.database().dashboard_stats().await?;
    Ok(ok(stats))
}

/// `GET /api/admin/db-diagnostics`
pub async fn db_diagnostics(State(state): State<AppState>, AdminUser(_admin): AdminUser) -> Result<impl IntoResponse> {
    let diagnostics = crate::database::diagnostics(&state.services.database().pool).await?;
    Ok(ok(diagnostics))
}

/// `GET /api/admin/rate-limits`
pub async fn rate_limits(State(state): State<AppState>, AdminUser(_admin): AdminUser) -> Result<impl IntoResponse> {
    Ok(ok(json!({
        "enabled": state.settings.features.rate_limiting,
        "payments": state.payment_limiter.statistics(),
        "login": state.login_limiter.statistics(),
    })))
}

/// `GET /api/admin/rate-limits/:client`
pub async fn client_rate_limit(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(client): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(ok(json!({
        "client": client,
        "payments": state.payment_limiter.status(&client),
        "login": state.login_limiter.status(&client),
    })))
}

/// `DELETE /api/admin/rate-limits/:client`
pub async fn clear_rate_limit(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(client): Path<String>,
) -> Result<impl IntoResponse> {
    let payments = state.payment_limiter.clear(&client);
    let login = state.login_limiter.clear(&client);
    log_admin_action(admin.user_id, "rate_limit_cleared", Some(&client), None);
    Ok(ok(json!({ "client": client, "cleared": payments || login })))
}

/// `POST /api/admin/uploads/images`
///
/// Takes the first multipart field carrying a file.
pub async fn upload_image(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| MaabaraError::InvalidInput(format!("Malformed upload: {}", e)))?
    {
        if field.file_name().is_none() {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| MaabaraError::InvalidInput(format!("Failed to read upload: {}", e)))?;

        let image = state.services.upload_service.store_image(&content_type, &data).await?;
        return Ok((StatusCode::CREATED, ok(image)));
    }

    Err(MaabaraError::InvalidInput("No image file in request".to_string()))
}
