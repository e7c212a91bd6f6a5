//! Certificate model and eligibility rule

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use super::booking::AttendanceStatus;

/// A booking qualifies for a certificate when an admin has switched the
/// override on, or when the attendee is recorded as fully attended.
pub fn is_eligible(certificate_enabled: bool, attendance_status: AttendanceStatus) -> bool {
    certificate_enabled || attendance_status == AttendanceStatus::Attended
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Certificate {
    pub id: i64,
    pub booking_id: i64,
    pub certificate_number: String,
    pub recipient_name: String,
    pub recipient_email: String,
    pub event_title: String,
    pub event_date: DateTime<Utc>,
    pub cpd_points: Option<i32>,
    pub issued_at: DateTime<Utc>,
    pub emailed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewCertificate {
    pub booking_id: i64,
    pub certificate_number: String,
    pub recipient_name: String,
    pub recipient_email: String,
    pub event_title: String,
    pub event_date: DateTime<Utc>,
    pub cpd_points: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityResponse {
    pub booking_id: i64,
    pub eligible: bool,
    pub attendance_status: AttendanceStatus,
    pub certificate_enabled: bool,
    pub certificate_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    pub download: bool,
    pub reference: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligibility_truth_table() {
        for attendance in AttendanceStatus::ALL {
            // Override always qualifies
            assert!(is_eligible(true, attendance), "override with {}", attendance);

            let expected = attendance == AttendanceStatus::Attended;
            assert_eq!(is_eligible(false, attendance), expected, "no override with {}", attendance);
        }
    }

    #[test]
    fn test_partial_attendance_needs_override() {
        assert!(!is_eligible(false, AttendanceStatus::Partial));
        assert!(is_eligible(true, AttendanceStatus::Partial));
    }
}
