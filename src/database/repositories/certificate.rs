//! Certificate repository implementation

use sqlx::PgPool;
use chrono::Utc;
use crate::models::certificate::{Certificate, NewCertificate};
use crate::utils::errors::MaabaraError;

const CERTIFICATE_COLUMNS: &str = "id, booking_id, certificate_number, recipient_name, recipient_email, event_title, event_date, cpd_points, issued_at, emailed_at";

#[derive(Debug, Clone)]
pub struct CertificateRepository {
    pool: PgPool,
}

impl CertificateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a certificate, or return the one already issued for the booking
    pub async fn create_or_get(&self, certificate: NewCertificate) -> Result<Certificate, MaabaraError> {
        let inserted = sqlx::query_as::<_, Certificate>(&format!(
            r#"
            INSERT INTO certificates (booking_id, certificate_number, recipient_name, recipient_email, event_title, event_date, cpd_points, issued_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (booking_id) DO NOTHING
            RETURNING {CERTIFICATE_COLUMNS}
            "#
        ))
        .bind(certificate.booking_id)
        .bind(certificate.certificate_number)
        .bind(certificate.recipient_name)
        .bind(certificate.recipient_email)
        .bind(certificate.event_title)
        .bind(certificate.event_date)
        .bind(certificate.cpd_points)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(certificate) => Ok(certificate),
            None => self
                .find_by_booking(certificate.booking_id)
                .await?
                .ok_or_else(|| MaabaraError::BookingNotFound(certificate.booking_id.to_string())),
        }
    }

    /// Find certificate by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Certificate>, MaabaraError> {
        let certificate = sqlx::query_as::<_, Certificate>(&format!(
            "SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(certificate)
    }

    /// Find the certificate issued for a booking
    pub async fn find_by_booking(&self, booking_id: i64) -> Result<Option<Certificate>, MaabaraError> {
        let certificate = sqlx::query_as::<_, Certificate>(&format!(
            "SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE booking_id = $1"
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(certificate)
    }

    /// Record that the certificate was emailed
    pub async fn mark_emailed(&self, id: i64) -> Result<Certificate, MaabaraError> {
        let certificate = sqlx::query_as::<_, Certificate>(&format!(
            "UPDATE certificates SET emailed_at = $2 WHERE id = $1 RETURNING {CERTIFICATE_COLUMNS}"
        ))
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(MaabaraError::CertificateNotFound { certificate_id: id })?;

        Ok(certificate)
    }

    /// Count issued certificates
    pub async fn count(&self) -> Result<i64, MaabaraError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM certificates")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
