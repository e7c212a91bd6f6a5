//! M-Pesa payment handlers

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, warn};
use crate::handlers::{ok, AppState};
use crate::middleware::MaybeAuthUser;
use crate::models::InitiatePaymentRequest;
use crate::utils::errors::{MaabaraError, Result};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub token: Option<String>,
}

/// Compare without short-circuiting on the first differing byte
fn tokens_match(given: &str, expected: &str) -> bool {
    given.len() == expected.len()
        && given.bytes().zip(expected.bytes()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

/// `POST /api/payments/mpesa/initiate`
pub async fn initiate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<InitiatePaymentRequest>,
) -> Result<impl IntoResponse> {
    let key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    let payment = state.services.payment_service
        .initiate(request.booking_id, &request.phone, key)
        .await?;

    Ok((StatusCode::ACCEPTED, ok(payment)))
}

/// `GET /api/payments/:id/status?reference=…`
///
/// Same access rule as certificates: admins, the booking's account, or the
/// booking reference. Every refusal looks like a missing payment.
pub async fn status(
    State(state): State<AppState>,
    MaybeAuthUser(auth): MaybeAuthUser,
    Path(id): Path<i64>,
    Query(query): Query<StatusQuery>,
) -> Result<impl IntoResponse> {
    let not_found = MaabaraError::PaymentNotFound { payment_id: id };
    if auth.is_none() && query.reference.is_none() {
        return Err(not_found);
    }

    let payment = state.services.payment_service.get(id).await?;
    let booking = state.services.booking_service.get(payment.booking_id).await?;

    let allowed = auth.as_ref().is_some_and(|a| a.is_admin() || booking.user_id == Some(a.user_id))
        || query.reference.as_deref().is_some_and(|r| r.eq_ignore_ascii_case(&booking.reference));

    if !allowed {
        return Err(not_found);
    }

    let payment = state.services.payment_service.refresh_status(id).await?;
    Ok(ok(payment))
}

/// `POST /api/payments/mpesa/callback?token=…`
///
/// Daraja retries anything but an acknowledgement, so once the token checks
/// out the answer is always "Accepted", even when processing fails.
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let expected = state.services.settings_service.callback_token();
    if !query.token.as_deref().is_some_and(|token| tokens_match(token, expected)) {
        warn!("M-Pesa callback with invalid token");
        return Err(MaabaraError::Unauthorized("Invalid callback token".to_string()));
    }

    let payload: Value = serde_json::from_slice(&body)
        .unwrap_or_else(|_| json!({ "raw": String::from_utf8_lossy(&body) }));

    if let Err(e) = state.services.payment_service.handle_callback(payload).await {
        error!(error = %e, "Failed to process M-Pesa callback");
    }

    Ok(Json(json!({ "ResultCode": 0, "ResultDesc": "Accepted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("s3cret-token", "s3cret-token"));
        assert!(!tokens_match("s3cret-tokem", "s3cret-token"));
        assert!(!tokens_match("s3cret", "s3cret-token"));
        assert!(!tokens_match("", "s3cret-token"));
    }
}
