//! Admin booking and certificate handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use crate::handlers::admin::{csv_response, export_name, pdf_response};
use crate::handlers::{ok, ok_with_message, AppState};
use crate::middleware::AdminUser;
use crate::models::booking::{CertificateOverrideRequest, UpdateAttendanceRequest, UpdateBookingStatusRequest};
use crate::models::{BookingFilter, Pagination};
use crate::utils::errors::Result;
use crate::utils::logging::log_admin_action;

/// `GET /api/admin/bookings`
pub async fn list_bookings(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(filter): Query<BookingFilter>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse> {
    let bookings = state.services.booking_service.list(&filter, pagination).await?;
    Ok(ok(bookings))
}

/// `PUT /api/admin/bookings/:id/status`
pub async fn update_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateBookingStatusRequest>,
) -> Result<impl IntoResponse> {
    let booking = state.services.booking_service.update_status(id, request.status).await?;
    log_admin_action(admin.user_id, "booking_status", Some(&booking.reference), Some(&request.status.to_string()));
    Ok(ok(booking))
}

/// `PUT /api/admin/bookings/:id/attendance`
pub async fn update_attendance(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateAttendanceRequest>,
) -> Result<impl IntoResponse> {
    let booking = state.services.booking_service.record_attendance(id, request.attendance_status).await?;
    log_admin_action(admin.user_id, "booking_attendance", Some(&booking.reference), Some(&request.attendance_status.to_string()));
    Ok(ok(booking))
}

/// `PUT /api/admin/bookings/:id/certificate`
pub async fn set_certificate_override(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(request): Json<CertificateOverrideRequest>,
) -> Result<impl IntoResponse> {
    let booking = state.services.booking_service
        .set_certificate_override(id, request.certificate_enabled)
        .await?;
    log_admin_action(admin.user_id, "certificate_override", Some(&booking.reference), Some(&request.certificate_enabled.to_string()));
    Ok(ok(booking))
}

/// `GET /api/admin/bookings/export.csv`
pub async fn export_csv(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(filter): Query<BookingFilter>,
) -> Result<impl IntoResponse> {
    let rows = state.services.booking_service.list_all(&filter).await?;
    let body = state.services.export_service.bookings_csv(&rows);
    Ok(csv_response(&export_name("bookings", "csv"), body))
}

/// `GET /api/admin/bookings/export.pdf`
pub async fn export_pdf(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(filter): Query<BookingFilter>,
) -> Result<impl IntoResponse> {
    let rows = state.services.booking_service.list_all(&filter).await?;
    let export = state.services.export_service.bookings_pdf(&rows)?;
    Ok(pdf_response(&export_name("bookings", "pdf"), export.bytes))
}

/// `POST /api/admin/bookings/:id/certificate/issue`
pub async fn issue_certificate(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let certificate = state.services.certificate_service.issue(id).await?;
    log_admin_action(admin.user_id, "certificate_issued", Some(&certificate.certificate_number), None);
    Ok((StatusCode::CREATED, ok(certificate)))
}

/// `GET /api/admin/bookings/:id/certificate-eligibility`
pub async fn certificate_eligibility(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let eligibility = state.services.certificate_service.check_eligibility(id).await?;
    Ok(ok(eligibility))
}

/// `POST /api/admin/certificates/:id/email`
pub async fn email_certificate(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let certificate = state.services.certificate_service.email_certificate(id).await?;
    log_admin_action(admin.user_id, "certificate_emailed", Some(&certificate.certificate_number), Some(&certificate.recipient_email));
    Ok(ok_with_message(certificate, "Certificate sent"))
}
