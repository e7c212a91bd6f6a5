//! Public booking handlers

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use crate::handlers::{content_disposition, ok, AppState};
use crate::middleware::{AuthUser, MaybeAuthUser};
use crate::models::CreateBookingRequest;
use crate::services::certificate::certificate_filename;
use crate::utils::errors::Result;

/// `POST /api/bookings`
///
/// A bearer token, when sent, links the booking to the account.
pub async fn create_booking(
    State(state): State<AppState>,
    MaybeAuthUser(auth): MaybeAuthUser,
    Json(request): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse> {
    let booking = state.services.booking_service
        .create_booking(request, auth.map(|a| a.user_id))
        .await?;
    Ok((StatusCode::CREATED, ok(booking)))
}

/// `GET /api/bookings/:reference`
pub async fn get_booking(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse> {
    let booking = state.services.booking_service.get_by_reference(&reference).await?;
    Ok(ok(booking))
}

/// `GET /api/bookings/mine`
pub async fn my_bookings(State(state): State<AppState>, AuthUser(auth): AuthUser) -> Result<impl IntoResponse> {
    let bookings = state.services.booking_service.list_for_user(auth.user_id).await?;
    Ok(ok(bookings))
}

/// `GET /api/bookings/:reference/certificate-eligibility`
pub async fn certificate_eligibility(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse> {
    let eligibility = state.services.certificate_service
        .check_eligibility_by_reference(&reference)
        .await?;
    Ok(ok(eligibility))
}

/// `GET /api/bookings/:reference/certificate`
///
/// Issues the certificate on first request when the booking qualifies and
/// returns the PDF as a download.
pub async fn download_own_certificate(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse> {
    let booking = state.services.booking_service.get_by_reference(&reference).await?;
    let certificate = state.services.certificate_service.issue(booking.id).await?;
    let bytes = state.services.certificate_service.render_pdf(&certificate)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&certificate_filename(&certificate), true)),
        ],
        bytes,
    ))
}
