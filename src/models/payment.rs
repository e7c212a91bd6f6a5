//! Payment model and the payment reconciliation state machine

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// M-Pesa result code for a successful STK payment
pub const RESULT_SUCCESS: i32 = 0;
/// M-Pesa result code when the payer dismisses the prompt
pub const RESULT_CANCELLED_BY_USER: i32 = 1032;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Failed => write!(f, "failed"),
            PaymentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            other => Err(format!("Unknown payment status: {}", other)),
        }
    }
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// Only pending payments move, and only into a terminal state.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        self == PaymentStatus::Pending && next.is_terminal()
    }

    /// Terminal status for an M-Pesa result code
    pub fn from_result_code(code: i32) -> PaymentStatus {
        match code {
            RESULT_SUCCESS => PaymentStatus::Completed,
            RESULT_CANCELLED_BY_USER => PaymentStatus::Cancelled,
            _ => PaymentStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: i64,
    pub booking_id: i64,
    pub phone: String,
    pub amount: i64,
    pub status: PaymentStatus,
    #[serde(skip_serializing)]
    pub idempotency_key: String,
    pub merchant_request_id: Option<String>,
    pub checkout_request_id: Option<String>,
    pub mpesa_receipt: Option<String>,
    pub result_code: Option<i32>,
    pub result_desc: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_seconds()
    }
}

/// Payment joined with booking and event, used by admin listings and exports
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentRow {
    pub id: i64,
    pub booking_id: i64,
    pub booking_reference: String,
    pub event_id: i64,
    pub event_title: String,
    pub attendee_name: String,
    pub phone: String,
    pub amount: i64,
    pub status: PaymentStatus,
    pub mpesa_receipt: Option<String>,
    pub result_desc: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub booking_id: i64,
    pub phone: String,
    pub amount: i64,
    pub idempotency_key: String,
}

/// Final outcome reported by M-Pesa for one STK request
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentResolution {
    pub result_code: i32,
    pub result_desc: String,
    pub amount: Option<i64>,
    pub mpesa_receipt: Option<String>,
}

impl PaymentResolution {
    /// Status this resolution moves a payment of `expected_amount` into
    ///
    /// A successful result that paid less than the booking total is a failure.
    pub fn target_status(&self, expected_amount: i64) -> PaymentStatus {
        let status = PaymentStatus::from_result_code(self.result_code);
        match (status, self.amount) {
            (PaymentStatus::Completed, Some(paid)) if paid < expected_amount => PaymentStatus::Failed,
            _ => status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatePaymentRequest {
    pub booking_id: i64,
    pub phone: String,
}

/// Query-string filters for payment listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentFilter {
    pub status: Option<PaymentStatus>,
    pub event_id: Option<i64>,
    pub booking_id: Option<i64>,
}

/// Raw callback audit entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentCallback {
    pub id: i64,
    pub checkout_request_id: Option<String>,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_payments_transition() {
        for next in [PaymentStatus::Completed, PaymentStatus::Failed, PaymentStatus::Cancelled] {
            assert!(PaymentStatus::Pending.can_transition_to(next));
        }
        assert!(!PaymentStatus::Pending.can_transition_to(PaymentStatus::Pending));

        for terminal in [PaymentStatus::Completed, PaymentStatus::Failed, PaymentStatus::Cancelled] {
            for next in [PaymentStatus::Pending, PaymentStatus::Completed, PaymentStatus::Failed, PaymentStatus::Cancelled] {
                assert!(!terminal.can_transition_to(next), "{} -> {} must be rejected", terminal, next);
            }
        }
    }

    #[test]
    fn test_result_code_mapping() {
        assert_eq!(PaymentStatus::from_result_code(0), PaymentStatus::Completed);
        assert_eq!(PaymentStatus::from_result_code(1032), PaymentStatus::Cancelled);
        assert_eq!(PaymentStatus::from_result_code(1037), PaymentStatus::Failed);
        assert_eq!(PaymentStatus::from_result_code(2001), PaymentStatus::Failed);
    }

    #[test]
    fn test_short_payment_fails() {
        let resolution = PaymentResolution {
            result_code: 0,
            result_desc: "The service request is processed successfully.".to_string(),
            amount: Some(500),
            mpesa_receipt: Some("NLJ7RT61SV".to_string()),
        };
        assert_eq!(resolution.target_status(1000), PaymentStatus::Failed);
        assert_eq!(resolution.target_status(500), PaymentStatus::Completed);
    }

    #[test]
    fn test_query_resolution_without_amount_completes() {
        let resolution = PaymentResolution {
            result_code: 0,
            result_desc: "ok".to_string(),
            amount: None,
            mpesa_receipt: None,
        };
        assert_eq!(resolution.target_status(1000), PaymentStatus::Completed);
    }
}
