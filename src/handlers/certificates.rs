//! Certificate download handler

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use crate::handlers::{content_disposition, AppState};
use crate::middleware::MaybeAuthUser;
use crate::models::certificate::DownloadQuery;
use crate::services::certificate::certificate_filename;
use crate::utils::errors::{MaabaraError, Result};

/// `GET /api/certificates/:id?download=true&reference=…`
///
/// Admins and the account that made the booking may fetch any certificate;
/// anyone else has to present the booking reference.
pub async fn get_certificate(
    State(state): State<AppState>,
    MaybeAuthUser(auth): MaybeAuthUser,
    Path(id): Path<i64>,
    Query(query): Query<DownloadQuery>,
) -> Result<impl IntoResponse> {
    let certificate = state.services.certificate_service.get(id).await?;
    let booking = state.services.booking_service.get(certificate.booking_id).await?;

    let allowed = auth.as_ref().is_some_and(|a| a.is_admin() || booking.user_id == Some(a.user_id))
        || query.reference.as_deref().is_some_and(|r| r.eq_ignore_ascii_case(&booking.reference));

    if !allowed {
        // Same answer as a missing certificate so ids cannot be enumerated
        return Err(MaabaraError::CertificateNotFound { certificate_id: id });
    }

    let bytes = state.services.certificate_service.render_pdf(&certificate)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&certificate_filename(&certificate), query.download)),
        ],
        bytes,
    ))
}
