//! Booking repository implementation

use sqlx::{PgPool, Postgres, Transaction};
use chrono::Utc;
use crate::models::booking::{Booking, BookingRow, BookingFilter, BookingStatus, AttendanceStatus, NewBooking};
use crate::utils::errors::MaabaraError;

const BOOKING_COLUMNS: &str = "id, reference, event_id, user_id, attendee_name, attendee_email, attendee_phone, quantity, total_amount, status, attendance_status, certificate_enabled, created_at, updated_at";

/// Per-status booking counts
#[derive(Debug, Clone, Copy, Default, sqlx::FromRow)]
pub struct BookingCounts {
    pub total: i64,
    pub pending: i64,
    pub confirmed: i64,
    pub cancelled: i64,
}

#[derive(Debug, Clone)]
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a booking inside the caller's transaction
    pub async fn create_in(&self, tx: &mut Transaction<'_, Postgres>, booking: NewBooking) -> Result<Booking, MaabaraError> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            r#"
            INSERT INTO bookings (reference, event_id, user_id, attendee_name, attendee_email, attendee_phone, quantity, total_amount, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(booking.reference)
        .bind(booking.event_id)
        .bind(booking.user_id)
        .bind(booking.attendee_name)
        .bind(booking.attendee_email)
        .bind(booking.attendee_phone)
        .bind(booking.quantity)
        .bind(booking.total_amount)
        .bind(booking.status)
        .bind(Utc::now())
        .fetch_one(&mut **tx)
        .await?;

        Ok(booking)
    }

    /// Find booking by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Booking>, MaabaraError> {
        let booking = sqlx::query_as::<_, Booking>(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(booking)
    }

    /// Find booking by its public reference
    pub async fn find_by_reference(&self, reference: &str) -> Result<Option<Booking>, MaabaraError> {
        let booking = sqlx::query_as::<_, Booking>(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE reference = $1"))
            .bind(reference.trim().to_uppercase())
            .fetch_optional(&self.pool)
            .await?;

        Ok(booking)
    }

    /// List bookings joined with their event, filtered
    pub async fn list(&self, filter: &BookingFilter, limit: i64, offset: i64) -> Result<Vec<BookingRow>, MaabaraError> {
        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT b.id, b.reference, b.event_id, e.title AS event_title, b.attendee_name, b.attendee_email,
                   b.attendee_phone, b.quantity, b.total_amount, b.status, b.attendance_status,
                   b.certificate_enabled, b.created_at
            FROM bookings b
            INNER JOIN events e ON e.id = b.event_id
            WHERE ($1::booking_status IS NULL OR b.status = $1)
              AND ($2::attendance_status IS NULL OR b.attendance_status = $2)
              AND ($3::BIGINT IS NULL OR b.event_id = $3)
              AND ($4::TEXT IS NULL OR b.attendee_name ILIKE $4 OR b.attendee_email ILIKE $4
                   OR b.attendee_phone ILIKE $4 OR b.reference ILIKE $4)
            ORDER BY b.created_at DESC
            LIMIT $5 OFFSET $6
            "#
        )
        .bind(filter.status)
        .bind(filter.attendance_status)
        .bind(filter.event_id)
        .bind(filter.search_pattern())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Bookings made by a signed-in user
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<BookingRow>, MaabaraError> {
        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT b.id, b.reference, b.event_id, e.title AS event_title, b.attendee_name, b.attendee_email,
                   b.attendee_phone, b.quantity, b.total_amount, b.status, b.attendance_status,
                   b.certificate_enabled, b.created_at
            FROM bookings b
            INNER JOIN events e ON e.id = b.event_id
            WHERE b.user_id = $1
            ORDER BY e.starts_at DESC
            "#
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Set booking status
    /// Move a booking from `from` to `to`
    ///
    /// Returns `None` when the booking is no longer in `from`, so a concurrent
    /// change is never overwritten.
    pub async fn update_status(
        &self,
        id: i64,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<Option<Booking>, MaabaraError> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "UPDATE bookings SET status = $2, updated_at = $3 WHERE id = $1 AND status = $4 RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(id)
        .bind(to)
        .bind(Utc::now())
        .bind(from)
        .fetch_optional(&self.pool)
        .await?;

        Ok(booking)
    }

    /// Confirm a pending booking inside the caller's transaction
    ///
    /// Returns `false` when the booking was no longer pending.
    pub async fn confirm_in(&self, tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<bool, MaabaraError> {
        let result = sqlx::query(
            "UPDATE bookings SET status = 'confirmed', updated_at = $2 WHERE id = $1 AND status = 'pending'"
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Record attendance
    pub async fn update_attendance(&self, id: i64, attendance_status: AttendanceStatus) -> Result<Booking, MaabaraError> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "UPDATE bookings SET attendance_status = $2, updated_at = $3 WHERE id = $1 RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(id)
        .bind(attendance_status)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| MaabaraError::BookingNotFound(id.to_string()))?;

        Ok(booking)
    }

    /// Set the manual certificate override
    pub async fn set_certificate_enabled(&self, id: i64, enabled: bool) -> Result<Booking, MaabaraError> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "UPDATE bookings SET certificate_enabled = $2, updated_at = $3 WHERE id = $1 RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(id)
        .bind(enabled)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| MaabaraError::BookingNotFound(id.to_string()))?;

        Ok(booking)
    }

    /// Booking counts by status
    pub async fn counts(&self) -> Result<BookingCounts, MaabaraError> {
        let counts = sqlx::query_as::<_, BookingCounts>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                   COUNT(*) FILTER (WHERE status = 'confirmed') AS confirmed,
                   COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled
            FROM bookings
            "#
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(counts)
    }
}
