//! Admin settings handlers
//!
//! Secrets are masked in every response; sending a masked value back keeps
//! the stored secret.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use crate::handlers::{ok, ok_with_message, AppState};
use crate::middleware::AdminUser;
use crate::models::settings::PutSettingRequest;
use crate::models::{GmailSettings, MpesaSettings};
use crate::utils::errors::Result;
use crate::utils::logging::log_admin_action;

/// `GET /api/admin/settings`
pub async fn list_settings(State(state): State<AppState>, AdminUser(_admin): AdminUser) -> Result<impl IntoResponse> {
    let settings = state.services.settings_service.list().await?;
    Ok(ok(settings))
}

/// `GET /api/admin/settings/gmail`
pub async fn get_gmail(State(state): State<AppState>, AdminUser(_admin): AdminUser) -> Result<impl IntoResponse> {
    let settings = state.services.settings_service.gmail_settings().await?;
    Ok(ok(settings.masked()))
}

/// `PUT /api/admin/settings/gmail`
pub async fn put_gmail(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(update): Json<GmailSettings>,
) -> Result<impl IntoResponse> {
    let saved = state.services.settings_service.update_gmail_settings(update, admin.user_id).await?;
    log_admin_action(admin.user_id, "settings_updated", Some("gmail"), None);
    Ok(ok(saved))
}

/// `POST /api/admin/settings/gmail/test`
pub async fn test_gmail(State(state): State<AppState>, AdminUser(_admin): AdminUser) -> Result<impl IntoResponse> {
    let connected = state.services.email_service.test_connection().await?;
    let message = if connected { "SMTP connection succeeded" } else { "SMTP server rejected the connection" };
    Ok(ok_with_message(connected, message))
}

/// `GET /api/admin/settings/mpesa`
pub async fn get_mpesa(State(state): State<AppState>, AdminUser(_admin): AdminUser) -> Result<impl IntoResponse> {
    let settings = state.services.settings_service.mpesa_settings().await?;
    Ok(ok(settings.masked()))
}

/// `PUT /api/admin/settings/mpesa`
pub async fn put_mpesa(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(update): Json<MpesaSettings>,
) -> Result<impl IntoResponse> {
    let saved = state.services.settings_service.update_mpesa_settings(update, admin.user_id).await?;
    log_admin_action(admin.user_id, "settings_updated", Some("mpesa"), None);
    Ok(ok(saved))
}

/// `GET /api/admin/settings/:key`
pub async fn get_setting(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(key): Path<String>,
) -> Result<impl IntoResponse> {
    let setting = state.services.settings_service.get(&key).await?;
    Ok(ok(setting))
}

/// `PUT /api/admin/settings/:key`
pub async fn put_setting(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(key): Path<String>,
    Json(request): Json<PutSettingRequest>,
) -> Result<impl IntoResponse> {
    let setting = state.services.settings_service.put(&key, request.value, admin.user_id).await?;
    log_admin_action(admin.user_id, "settings_updated", Some(&key), None);
    Ok(ok(setting))
}
