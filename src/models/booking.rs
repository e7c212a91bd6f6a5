//! Booking model

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Pending => write!(f, "pending"),
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("Unknown booking status: {}", other)),
        }
    }
}

impl BookingStatus {
    /// Cancelled bookings are final; everything else may still move.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        match (self, next) {
            (BookingStatus::Pending, BookingStatus::Confirmed) => true,
            (BookingStatus::Pending, BookingStatus::Cancelled) => true,
            (BookingStatus::Confirmed, BookingStatus::Cancelled) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "attendance_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Attended,
    Partial,
    Absent,
    Unverified,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 4] = [
        AttendanceStatus::Attended,
        AttendanceStatus::Partial,
        AttendanceStatus::Absent,
        AttendanceStatus::Unverified,
    ];
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttendanceStatus::Attended => write!(f, "attended"),
            AttendanceStatus::Partial => write!(f, "partial"),
            AttendanceStatus::Absent => write!(f, "absent"),
            AttendanceStatus::Unverified => write!(f, "unverified"),
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attended" => Ok(AttendanceStatus::Attended),
            "partial" => Ok(AttendanceStatus::Partial),
            "absent" => Ok(AttendanceStatus::Absent),
            "unverified" => Ok(AttendanceStatus::Unverified),
            other => Err(format!("Unknown attendance status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: i64,
    pub reference: String,
    pub event_id: i64,
    pub user_id: Option<i64>,
    pub attendee_name: String,
    pub attendee_email: String,
    pub attendee_phone: String,
    pub quantity: i32,
    pub total_amount: i64,
    pub status: BookingStatus,
    pub attendance_status: AttendanceStatus,
    pub certificate_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Booking joined with the event title, used by admin listings and exports
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BookingRow {
    pub id: i64,
    pub reference: String,
    pub event_id: i64,
    pub event_title: String,
    pub attendee_name: String,
    pub attendee_email: String,
    pub attendee_phone: String,
    pub quantity: i32,
    pub total_amount: i64,
    pub status: BookingStatus,
    pub attendance_status: AttendanceStatus,
    pub certificate_enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub event_id: i64,
    pub attendee_name: String,
    pub attendee_email: String,
    pub attendee_phone: String,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

/// Validated insert payload produced by the booking service
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub reference: String,
    pub event_id: i64,
    pub user_id: Option<i64>,
    pub attendee_name: String,
    pub attendee_email: String,
    pub attendee_phone: String,
    pub quantity: i32,
    pub total_amount: i64,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateBookingStatusRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAttendanceRequest {
    pub attendance_status: AttendanceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateOverrideRequest {
    pub certificate_enabled: bool,
}

/// Query-string filters for booking listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub attendance_status: Option<AttendanceStatus>,
    pub event_id: Option<i64>,
    pub search: Option<String>,
}

impl BookingFilter {
    /// Search term as a case-insensitive LIKE pattern
    pub fn search_pattern(&self) -> Option<String> {
        self.search.as_deref().and_then(crate::utils::helpers::like_pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_status_transitions() {
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Confirmed));
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Cancelled));
        assert!(BookingStatus::Confirmed.can_transition_to(BookingStatus::Cancelled));
        assert!(!BookingStatus::Cancelled.can_transition_to(BookingStatus::Pending));
        assert!(!BookingStatus::Cancelled.can_transition_to(BookingStatus::Confirmed));
        assert!(!BookingStatus::Confirmed.can_transition_to(BookingStatus::Pending));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("confirmed".parse::<BookingStatus>().unwrap(), BookingStatus::Confirmed);
        assert_eq!("partial".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::Partial);
        assert!("done".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn test_filter_deserializes_from_query_values() {
        let filter: BookingFilter = serde_json::from_value(serde_json::json!({
            "status": "pending",
            "event_id": 7
        }))
        .unwrap();
        assert_eq!(filter.status, Some(BookingStatus::Pending));
        assert_eq!(filter.event_id, Some(7));
        assert!(filter.attendance_status.is_none());
    }

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        let filter = BookingFilter {
            search: Some(" 50%_off ".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.search_pattern().as_deref(), Some("%50\\%\\_off%"));

        let empty = BookingFilter {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(empty.search_pattern().is_none());
    }

    #[test]
    fn test_quantity_defaults_to_one() {
        let request: CreateBookingRequest = serde_json::from_value(serde_json::json!({
            "event_id": 1,
            "attendee_name": "Otieno",
            "attendee_email": "otieno@example.com",
            "attendee_phone": "0712345678"
        }))
        .unwrap();
        assert_eq!(request.quantity, 1);
    }
}
