//! Payment service implementation
//!
//! Reconciles M-Pesa STK payments. A payment starts `pending` and moves
//! exactly once into `completed`, `failed` or `cancelled`, driven by the
//! Daraja callback, a status query or expiry. Every transition locks the
//! payment row, and a completed payment confirms its booking in the same
//! transaction.

use std::time::Duration;
use chrono::Utc;
use serde::Serialize;
use sqlx::{Postgres, Transaction};
use tokio::task::JoinHandle;
use tracing::{info, warn, error, debug};
use crate::config::MpesaConfig;
use crate::database::repositories::{BookingRepository, PaymentRepository};
use crate::models::{
    BookingStatus, NewPayment, Pagination, Payment, PaymentFilter, PaymentResolution, PaymentRow,
    PaymentStatus,
};
use crate::services::mpesa::{callback_url_with_token, MpesaClient, StkCallbackEnvelope, StkPushRequest, StkQueryOutcome};
use crate::services::settings::SettingsService;
use crate::utils::errors::{MaabaraError, MpesaError, Result};
use crate::utils::helpers::normalize_phone;
use crate::utils::logging::{log_payment_transition, log_api_error};

const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;
const RECONCILE_BATCH_SIZE: i64 = 100;

/// Summary of one reconciler sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub checked: usize,
    pub resolved: usize,
    pub expired: usize,
    pub errors: usize,
}

/// Result description stored when a successful payment paid too little
pub fn short_payment_description(paid: i64, expected: i64) -> String {
    format!("Amount paid (KES {}) is less than the amount due (KES {})", paid, expected)
}

#[derive(Clone)]
pub struct PaymentService {
    payments: PaymentRepository,
    bookings: BookingRepository,
    mpesa: MpesaClient,
    settings: SettingsService,
    query_after_seconds: i64,
    expire_after_seconds: i64,
}

impl PaymentService {
    pub fn new(
        payments: PaymentRepository,
        bookings: BookingRepository,
        mpesa: MpesaClient,
        settings: SettingsService,
        config: &MpesaConfig,
    ) -> Self {
        Self {
            payments,
            bookings,
            mpesa,
            settings,
            query_after_seconds: config.query_after_seconds,
            expire_after_seconds: config.expire_after_seconds,
        }
    }

    pub async fn get(&self, id: i64) -> Result<Payment> {
        self.payments.find_by_id(id).await?
            .ok_or(MaabaraError::PaymentNotFound { payment_id: id })
    }

    pub async fn list(&self, filter: &PaymentFilter, pagination: Pagination) -> Result<Vec<PaymentRow>> {
        self.payments.list(filter, pagination.limit(), pagination.offset()).await
    }

    /// Every payment matching the filter, for exports
    pub async fn list_all(&self, filter: &PaymentFilter) -> Result<Vec<PaymentRow>> {
        self.payments.list(filter, i64::MAX, 0).await
    }

    /// Start an STK push for a booking
    ///
    /// Repeating a request with the same idempotency key returns the payment
    /// it created. A booking that already has a payment in flight gets that
    /// payment back instead of a second prompt on the phone.
    pub async fn initiate(&self, booking_id: i64, phone: &str, idempotency_key: Option<&str>) -> Result<Payment> {
        let phone = normalize_phone(phone)?;

        let key = match idempotency_key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) if key.len() > MAX_IDEMPOTENCY_KEY_LEN => {
                return Err(MaabaraError::InvalidInput("Idempotency key is too long".to_string()));
            }
            Some(key) => key.to_string(),
            None => uuid::Uuid::new_v4().to_string(),
        };

        if let Some(existing) = self.payments.find_by_idempotency_key(&key).await? {
            return self.replay(existing, booking_id);
        }

        let booking = self.bookings.find_by_id(booking_id).await?
            .ok_or_else(|| MaabaraError::BookingNotFound(booking_id.to_string()))?;

        match booking.status {
            BookingStatus::Cancelled => {
                return Err(MaabaraError::Conflict("Booking has been cancelled".to_string()));
            }
            BookingStatus::Confirmed => {
                return Err(MaabaraError::Conflict("Booking is already confirmed".to_string()));
            }
            BookingStatus::Pending => {}
        }

        if booking.total_amount <= 0 {
            return Err(MaabaraError::InvalidInput("Booking has nothing to pay".to_string()));
        }

        if let Some(in_flight) = self.payments.find_pending_for_booking(booking_id).await? {
            debug!(payment_id = in_flight.id, booking_id = booking_id, "Returning in-flight payment");
            return Ok(in_flight);
        }

        let credentials = self.settings.mpesa_settings().await?;
        if !credentials.is_complete() {
            return Err(MpesaError::NotConfigured.into());
        }
        let callback_url = callback_url_with_token(&credentials.callback_url, self.settings.callback_token())?;

        let payment = match self.payments.create(NewPayment {
            booking_id,
            phone: phone.clone(),
            amount: booking.total_amount,
            idempotency_key: key.clone(),
        }).await {
            Ok(payment) => payment,
            // A concurrent request won the insert, either with the same key
            // or with another pending payment for this booking
            Err(e) if e.is_unique_violation() => {
                if let Some(existing) = self.payments.find_by_idempotency_key(&key).await? {
                    return self.replay(existing, booking_id);
                }
                let in_flight = self.payments.find_pending_for_booking(booking_id).await?
                    .ok_or(e)?;
                debug!(payment_id = in_flight.id, booking_id = booking_id, "Lost the race to a concurrent payment");
                return Ok(in_flight);
            }
            Err(e) => return Err(e),
        };

        let request = StkPushRequest {
            amount: payment.amount,
            phone,
            account_reference: booking.reference.clone(),
            description: "Event ticket".to_string(),
            callback_url,
        };

        match self.mpesa.stk_push(&credentials, &request).await {
            Ok(accepted) => {
                let payment = self.payments
                    .set_request_ids(payment.id, &accepted.merchant_request_id, &accepted.checkout_request_id)
                    .await?;
                info!(payment_id = payment.id, booking_id = booking_id, checkout_request_id = %accepted.checkout_request_id, "Payment initiated");
                Ok(payment)
            }
            Err(e) => {
                log_api_error("mpesa_stk_push", &e.to_string(), Some(&format!("payment_id={}", payment.id)));
                self.fail(payment.id, &format!("STK push failed: {}", e)).await?;
                Err(e.into())
            }
        }
    }

    fn replay(&self, existing: Payment, booking_id: i64) -> Result<Payment> {
        if existing.booking_id != booking_id {
            return Err(MaabaraError::Conflict(
                "Idempotency key was already used for another booking".to_string()
            ));
        }
        debug!(payment_id = existing.id, "Replaying idempotent payment request");
        Ok(existing)
    }

    /// Apply a Daraja callback
    ///
    /// The raw payload is always stored first. Unknown checkout ids and
    /// malformed bodies are acknowledged and ignored; callbacks for payments
    /// that already reached a final state change nothing.
    pub async fn handle_callback(&self, payload: serde_json::Value) -> Result<Option<Payment>> {
        let checkout_request_id = payload
            .pointer("/Body/stkCallback/CheckoutRequestID")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        self.payments.record_callback(checkout_request_id.as_deref(), &payload).await?;

        let envelope: StkCallbackEnvelope = match serde_json::from_value(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed M-Pesa callback");
                return Ok(None);
            }
        };

        let callback = envelope.body.stk_callback;
        let resolution = match callback.resolution() {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!(checkout_request_id = %callback.checkout_request_id, error = %e, "Ignoring unreadable M-Pesa callback");
                return Ok(None);
            }
        };

        let mut tx = self.payments.begin().await?;
        let Some(payment) = self.payments.lock_by_checkout_id(&mut tx, &callback.checkout_request_id).await? else {
            warn!(checkout_request_id = %callback.checkout_request_id, "Callback for unknown checkout request");
            return Ok(None);
        };

        if payment.status.is_terminal() {
            debug!(payment_id = payment.id, status = %payment.status, "Duplicate callback ignored");
            return Ok(Some(payment));
        }

        let updated = self.apply_resolution(&mut tx, &payment, &resolution).await?;
        tx.commit().await?;

        Ok(Some(updated))
    }

    /// Current state of a payment, querying M-Pesa when the callback is overdue
    pub async fn refresh_status(&self, payment_id: i64) -> Result<Payment> {
        let payment = self.get(payment_id).await?;

        if payment.status.is_terminal()
            || payment.checkout_request_id.is_none()
            || payment.age_seconds(Utc::now()) < self.query_after_seconds
        {
            return Ok(payment);
        }

        self.reconcile(payment).await
    }

    /// Query M-Pesa for one pending payment and apply the answer
    async fn reconcile(&self, payment: Payment) -> Result<Payment> {
        let Some(checkout_request_id) = payment.checkout_request_id.as_deref() else {
            return self.expire_if_overdue(payment, "STK push was never accepted").await;
        };

        let credentials = self.settings.mpesa_settings().await?;

        match self.mpesa.stk_query(&credentials, checkout_request_id).await {
            Ok(StkQueryOutcome::Resolved(resolution)) => {
                let mut tx = self.payments.begin().await?;
                let locked = self.payments.lock_by_id(&mut tx, payment.id).await?
                    .ok_or(MaabaraError::PaymentNotFound { payment_id: payment.id })?;

                if locked.status.is_terminal() {
                    return Ok(locked);
                }

                let updated = self.apply_resolution(&mut tx, &locked, &resolution).await?;
                tx.commit().await?;
                Ok(updated)
            }
            Ok(StkQueryOutcome::Pending) => {
                self.expire_if_overdue(payment, "Payment request expired without a response").await
            }
            Err(MpesaError::NotConfigured) => Err(MpesaError::NotConfigured.into()),
            Err(e) => {
                warn!(payment_id = payment.id, error = %e, "STK status query failed");
                self.expire_if_overdue(payment, "Payment could not be confirmed before it expired").await
            }
        }
    }

    async fn expire_if_overdue(&self, payment: Payment, reason: &str) -> Result<Payment> {
        if payment.age_seconds(Utc::now()) < self.expire_after_seconds {
            return Ok(payment);
        }
        self.fail(payment.id, reason).await
    }

    /// Mark a pending payment failed without an M-Pesa result code
    async fn fail(&self, payment_id: i64, reason: &str) -> Result<Payment> {
        let mut tx = self.payments.begin().await?;
        let payment = self.payments.lock_by_id(&mut tx, payment_id).await?
            .ok_or(MaabaraError::PaymentNotFound { payment_id })?;

        if payment.status.is_terminal() {
            return Ok(payment);
        }

        let updated = self.payments
            .resolve_in(&mut tx, payment_id, PaymentStatus::Failed, None, reason, None)
            .await?;
        tx.commit().await?;

        log_payment_transition(payment_id, &payment.status.to_string(), &updated.status.to_string(), None);
        Ok(updated)
    }

    /// Write the outcome for a locked pending payment
    async fn apply_resolution(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        payment: &Payment,
        resolution: &PaymentResolution,
    ) -> Result<Payment> {
        let target = resolution.target_status(payment.amount);
        if !payment.status.can_transition_to(target) {
            return Err(MaabaraError::InvalidStateTransition {
                from: payment.status.to_string(),
                to: target.to_string(),
            });
        }

        let description = match resolution.amount {
            Some(paid) if target == PaymentStatus::Failed && resolution.result_code == 0 => {
                warn!(payment_id = payment.id, paid = paid, expected = payment.amount, "Short M-Pesa payment");
                short_payment_description(paid, payment.amount)
            }
            _ => resolution.result_desc.clone(),
        };

        let updated = self.payments.resolve_in(
            tx,
            payment.id,
            target,
            Some(resolution.result_code),
            &description,
            resolution.mpesa_receipt.as_deref(),
        ).await?;

        if target == PaymentStatus::Completed && !self.bookings.confirm_in(tx, payment.booking_id).await? {
            warn!(payment_id = payment.id, booking_id = payment.booking_id, "Payment completed but booking was no longer pending");
        }

        log_payment_transition(payment.id, &payment.status.to_string(), &target.to_string(), Some(resolution.result_code));
        Ok(updated)
    }

    /// Query or expire every pending payment whose callback is overdue
    pub async fn reconcile_stale(&self) -> Result<ReconcileReport> {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.query_after_seconds);
        let stale = self.payments.list_stale_pending(cutoff, RECONCILE_BATCH_SIZE).await?;

        let mut report = ReconcileReport::default();
        for payment in stale {
            report.checked += 1;
            let id = payment.id;
            match self.reconcile(payment).await {
                Ok(updated) if updated.status == PaymentStatus::Pending => {}
                Ok(updated) if updated.result_code.is_none() => report.expired += 1,
                Ok(_) => report.resolved += 1,
                Err(e) => {
                    report.errors += 1;
                    error!(payment_id = id, error = %e, "Failed to reconcile payment");
                }
            }
        }

        Ok(report)
    }

    /// Run [`reconcile_stale`](Self::reconcile_stale) on a fixed interval
    pub fn spawn_reconciler(self, every: Duration) -> JoinHandle<()> {
        info!("Started payment reconciler with interval {:?}", every);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                match self.reconcile_stale().await {
                    Ok(report) if report.checked > 0 => {
                        info!(
                            checked = report.checked,
                            resolved = report.resolved,
                            expired = report.expired,
                            errors = report.errors,
                            "Payment reconciliation sweep finished"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => error!("Payment reconciliation sweep failed: {}", e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_payment_description() {
        assert_eq!(
            short_payment_description(500, 1500),
            "Amount paid (KES 500) is less than the amount due (KES 1500)"
        );
    }

    #[test]
    fn test_report_defaults_to_zero() {
        let report = ReconcileReport::default();
        assert_eq!(report.checked + report.resolved + report.expired + report.errors, 0);
    }
}
