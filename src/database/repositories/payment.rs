//! Payment repository implementation

use sqlx::{PgPool, Postgres, Transaction};
use chrono::{DateTime, Utc};
use crate::models::payment::{Payment, PaymentRow, PaymentFilter, PaymentStatus, NewPayment, PaymentCallback};
use crate::utils::errors::MaabaraError;

const PAYMENT_COLUMNS: &str = "id, booking_id, phone, amount, status, idempotency_key, merchant_request_id, checkout_request_id, mpesa_receipt, result_code, result_desc, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Begin a transaction for a payment state change
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, MaabaraError> {
        Ok(self.pool.begin().await?)
    }

    /// Create a pending payment
    pub async fn create(&self, payment: NewPayment) -> Result<Payment, MaabaraError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (booking_id, phone, amount, status, idempotency_key, created_at, updated_at)
            VALUES ($1, $2, $3, 'pending', $4, $5, $5)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment.booking_id)
        .bind(payment.phone)
        .bind(payment.amount)
        .bind(payment.idempotency_key)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Find payment by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Payment>, MaabaraError> {
        let payment = sqlx::query_as::<_, Payment>(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    /// Find payment by client idempotency key
    pub async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Payment>, MaabaraError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE idempotency_key = $1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Most recent pending payment for a booking, if any
    pub async fn find_pending_for_booking(&self, booking_id: i64) -> Result<Option<Payment>, MaabaraError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE booking_id = $1 AND status = 'pending'
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Store the ids M-Pesa assigned to an accepted STK push
    pub async fn set_request_ids(&self, id: i64, merchant_request_id: &str, checkout_request_id: &str) -> Result<Payment, MaabaraError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments
            SET merchant_request_id = $2, checkout_request_id = $3, updated_at = $4
            WHERE id = $1
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(merchant_request_id)
        .bind(checkout_request_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(MaabaraError::PaymentNotFound { payment_id: id })?;

        Ok(payment)
    }

    /// Lock a payment row by id for a state change
    pub async fn lock_by_id(&self, tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<Option<Payment>, MaabaraError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(payment)
    }

    /// Lock a payment row by checkout request id for a state change
    pub async fn lock_by_checkout_id(&self, tx: &mut Transaction<'_, Postgres>, checkout_request_id: &str) -> Result<Option<Payment>, MaabaraError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE checkout_request_id = $1 FOR UPDATE"
        ))
        .bind(checkout_request_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(payment)
    }

    /// Write a terminal status; the row must already be locked
    pub async fn resolve_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        status: PaymentStatus,
        result_code: Option<i32>,
        result_desc: &str,
        mpesa_receipt: Option<&str>,
    ) -> Result<Payment, MaabaraError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments
            SET status = $2, result_code = $3, result_desc = $4,
                mpesa_receipt = COALESCE($5, mpesa_receipt), updated_at = $6
            WHERE id = $1
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .bind(result_code)
        .bind(result_desc)
        .bind(mpesa_receipt)
        .bind(Utc::now())
        .fetch_one(&mut **tx)
        .await?;

        Ok(payment)
    }

    /// List payments joined with booking and event, filtered
    pub async fn list(&self, filter: &PaymentFilter, limit: i64, offset: i64) -> Result<Vec<PaymentRow>, MaabaraError> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT p.id, p.booking_id, b.reference AS booking_reference, b.event_id, e.title AS event_title,
                   b.attendee_name, p.phone, p.amount, p.status, p.mpesa_receipt, p.result_desc, p.created_at
            FROM payments p
            INNER JOIN bookings b ON b.id = p.booking_id
            INNER JOIN events e ON e.id = b.event_id
            WHERE ($1::payment_status IS NULL OR p.status = $1)
              AND ($2::BIGINT IS NULL OR b.event_id = $2)
              AND ($3::BIGINT IS NULL OR p.booking_id = $3)
            ORDER BY p.created_at DESC
            LIMIT $4 OFFSET $5
            "#
        )
        .bind(filter.status)
        .bind(filter.event_id)
        .bind(filter.booking_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Pending payments created before `cutoff`, oldest first
    pub async fn list_stale_pending(&self, cutoff: DateTime<Utc>, limit: i64) -> Result<Vec<Payment>, MaabaraError> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE status = 'pending' AND created_at < $1
            ORDER BY created_at ASC
            LIMIT $2
            "#
        ))
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Append a raw callback payload to the audit log
    pub async fn record_callback(&self, checkout_request_id: Option<&str>, payload: &serde_json::Value) -> Result<PaymentCallback, MaabaraError> {
        let callback = sqlx::query_as::<_, PaymentCallback>(
            r#"
            INSERT INTO payment_callbacks (checkout_request_id, payload, received_at)
            VALUES ($1, $2, $3)
            RETURNING id, checkout_request_id, payload, received_at
            "#
        )
        .bind(checkout_request_id)
        .bind(payload)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(callback)
    }

    /// Number of completed payments and their total
    pub async fn completed_totals(&self) -> Result<(i64, i64), MaabaraError> {
        let totals: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(amount), 0)::BIGINT FROM payments WHERE status = 'completed'"
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(totals)
    }
}
