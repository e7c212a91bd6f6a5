//! Error handling for Maabara
//!
//! This module defines the main error types used throughout the application
//! and provides a unified error handling strategy. Every error leaving an HTTP
//! handler is rendered as the `{ success: false, message, error, sqlState }`
//! envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn, info};

/// Main error type for the Maabara service
#[derive(Error, Debug)]
pub enum MaabaraError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("M-Pesa error: {0}")]
    Mpesa(#[from] MpesaError),

    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    #[error("PDF rendering error: {0}")]
    Pdf(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Unauthorized(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("User not found: {user_id}")]
    UserNotFound { user_id: i64 },

    #[error("Event not found: {event_id}")]
    EventNotFound { event_id: i64 },

    #[error("Category not found: {category_id}")]
    CategoryNotFound { category_id: i64 },

    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    #[error("Payment not found: {payment_id}")]
    PaymentNotFound { payment_id: i64 },

    #[error("Certificate not found: {certificate_id}")]
    CertificateNotFound { certificate_id: i64 },

    #[error("Setting not found: {0}")]
    SettingNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// M-Pesa Daraja specific errors
#[derive(Error, Debug)]
pub enum MpesaError {
    #[error("M-Pesa request failed: {0}")]
    RequestFailed(String),

    #[error("M-Pesa request timed out")]
    Timeout,

    #[error("M-Pesa service unavailable")]
    ServiceUnavailable,

    #[error("M-Pesa rejected the request: {code} {message}")]
    Rejected { code: String, message: String },

    #[error("Invalid M-Pesa response: {0}")]
    InvalidResponse(String),

    #[error("M-Pesa credentials are not configured")]
    NotConfigured,
}

/// Outgoing mail specific errors
#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Email settings are incomplete: {0}")]
    NotConfigured(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("SMTP delivery failed: {0}")]
    Transport(String),
}

/// Result type alias for Maabara operations
pub type Result<T> = std::result::Result<T, MaabaraError>;

/// Result type alias for M-Pesa operations
pub type MpesaResult<T> = std::result::Result<T, MpesaError>;

impl MpesaError {
    /// Transient failures that are safe to retry for idempotent calls
    pub fn is_transient(&self) -> bool {
        matches!(self, MpesaError::Timeout | MpesaError::ServiceUnavailable)
    }
}

impl MaabaraError {
    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            MaabaraError::Database(_) => false,
            MaabaraError::Migration(_) => false,
            MaabaraError::Mpesa(e) => e.is_transient(),
            MaabaraError::Email(EmailError::Transport(_)) => true,
            MaabaraError::Email(_) => false,
            MaabaraError::Pdf(_) => false,
            MaabaraError::Config(_) => false,
            MaabaraError::Unauthorized(_) => false,
            MaabaraError::PermissionDenied(_) => false,
            MaabaraError::UserNotFound { .. } => false,
            MaabaraError::EventNotFound { .. } => false,
            MaabaraError::CategoryNotFound { .. } => false,
            MaabaraError::BookingNotFound(_) => false,
            MaabaraError::PaymentNotFound { .. } => false,
            MaabaraError::CertificateNotFound { .. } => false,
            MaabaraError::SettingNotFound(_) => false,
            MaabaraError::FileNotFound(_) => false,
            MaabaraError::InvalidStateTransition { .. } => false,
            MaabaraError::Conflict(_) => false,
            MaabaraError::Redis(_) => true,
            MaabaraError::Http(_) => true,
            MaabaraError::Serialization(_) => false,
            MaabaraError::Io(_) => true,
            MaabaraError::Token(_) => false,
            MaabaraError::PasswordHash(_) => false,
            MaabaraError::RateLimitExceeded => true,
            MaabaraError::InvalidInput(_) => false,
            MaabaraError::ServiceUnavailable(_) => true,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            MaabaraError::Database(_) => ErrorSeverity::Critical,
            MaabaraError::Migration(_) => ErrorSeverity::Critical,
            MaabaraError::Config(_) => ErrorSeverity::Critical,
            MaabaraError::Unauthorized(_) => ErrorSeverity::Warning,
            MaabaraError::PermissionDenied(_) => ErrorSeverity::Warning,
            MaabaraError::Token(_) => ErrorSeverity::Warning,
            MaabaraError::RateLimitExceeded => ErrorSeverity::Warning,
            MaabaraError::InvalidInput(_) => ErrorSeverity::Info,
            MaabaraError::Conflict(_) => ErrorSeverity::Info,
            MaabaraError::InvalidStateTransition { .. } => ErrorSeverity::Info,
            MaabaraError::UserNotFound { .. }
            | MaabaraError::EventNotFound { .. }
            | MaabaraError::CategoryNotFound { .. }
            | MaabaraError::BookingNotFound(_)
            | MaabaraError::PaymentNotFound { .. }
            | MaabaraError::CertificateNotFound { .. }
            | MaabaraError::SettingNotFound(_)
            | MaabaraError::FileNotFound(_) => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            MaabaraError::Unauthorized(_) | MaabaraError::Token(_) => StatusCode::UNAUTHORIZED,
            MaabaraError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            MaabaraError::UserNotFound { .. }
            | MaabaraError::EventNotFound { .. }
            | MaabaraError::CategoryNotFound { .. }
            | MaabaraError::BookingNotFound(_)
            | MaabaraError::PaymentNotFound { .. }
            | MaabaraError::CertificateNotFound { .. }
            | MaabaraError::SettingNotFound(_)
            | MaabaraError::FileNotFound(_) => StatusCode::NOT_FOUND,
            MaabaraError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            MaabaraError::Conflict(_) | MaabaraError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
            MaabaraError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            MaabaraError::Mpesa(MpesaError::Rejected { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            MaabaraError::Mpesa(_) | MaabaraError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            MaabaraError::Email(EmailError::NotConfigured(_)) => StatusCode::SERVICE_UNAVAILABLE,
            MaabaraError::Email(EmailError::InvalidAddress(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable error kind used in the response envelope
    pub fn kind(&self) -> &'static str {
        match self {
            MaabaraError::Database(_) => "database_error",
            MaabaraError::Migration(_) => "migration_error",
            MaabaraError::Mpesa(_) => "mpesa_error",
            MaabaraError::Email(_) => "email_error",
            MaabaraError::Pdf(_) => "pdf_error",
            MaabaraError::Config(_) => "config_error",
            MaabaraError::Unauthorized(_) | MaabaraError::Token(_) => "unauthorized",
            MaabaraError::PermissionDenied(_) => "forbidden",
            MaabaraError::UserNotFound { .. }
            | MaabaraError::EventNotFound { .. }
            | MaabaraError::CategoryNotFound { .. }
            | MaabaraError::BookingNotFound(_)
            | MaabaraError::PaymentNotFound { .. }
            | MaabaraError::CertificateNotFound { .. }
            | MaabaraError::SettingNotFound(_)
            | MaabaraError::FileNotFound(_) => "not_found",
            MaabaraError::InvalidStateTransition { .. } => "invalid_state_transition",
            MaabaraError::Conflict(_) => "conflict",
            MaabaraError::Redis(_) => "cache_error",
            MaabaraError::Http(_) => "upstream_error",
            MaabaraError::Serialization(_) => "serialization_error",
            MaabaraError::Io(_) => "io_error",
            MaabaraError::PasswordHash(_) => "internal_error",
            MaabaraError::RateLimitExceeded => "rate_limited",
            MaabaraError::InvalidInput(_) => "invalid_input",
            MaabaraError::ServiceUnavailable(_) => "service_unavailable",
        }
    }

    /// SQLSTATE code of the underlying database error, if any
    pub fn sql_state(&self) -> Option<String> {
        match self {
            MaabaraError::Database(sqlx::Error::Database(db)) => db.code().map(|c| c.into_owned()),
            _ => None,
        }
    }

    /// True when the database rejected a write on a unique constraint
    pub fn is_unique_violation(&self) -> bool {
        self.sql_state().as_deref() == Some("23505")
    }

    /// Message safe to show to API clients
    pub fn public_message(&self) -> String {
        if self.status_code().is_server_error() {
            match self {
                MaabaraError::Mpesa(e) => e.to_string(),
                MaabaraError::ServiceUnavailable(msg) => msg.clone(),
                MaabaraError::Email(e) => e.to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        }
    }
}

/// Error envelope returned to API clients
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub message: String,
    pub error: &'static str,
    #[serde(rename = "sqlState", skip_serializing_if = "Option::is_none")]
    pub sql_state: Option<String>,
}

impl IntoResponse for MaabaraError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match self.severity() {
            ErrorSeverity::Critical | ErrorSeverity::Error => {
                error!(error = %self, kind = self.kind(), status = status.as_u16(), "Request failed")
            }
            ErrorSeverity::Warning => {
                warn!(error = %self, kind = self.kind(), status = status.as_u16(), "Request rejected")
            }
            ErrorSeverity::Info => {
                info!(error = %self, kind = self.kind(), status = status.as_u16(), "Request rejected")
            }
        }

        let envelope = ErrorEnvelope {
            success: false,
            message: self.public_message(),
            error: self.kind(),
            sql_state: self.sql_state(),
        };

        (status, Json(envelope)).into_response()
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(MaabaraError::InvalidInput("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(MaabaraError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(MaabaraError::PaymentNotFound { payment_id: 1 }.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(MaabaraError::RateLimitExceeded.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(MaabaraError::Mpesa(MpesaError::Timeout).status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_transient_classification() {
        assert!(MaabaraError::Mpesa(MpesaError::Timeout).is_recoverable());
        assert!(MaabaraError::Mpesa(MpesaError::ServiceUnavailable).is_recoverable());
        assert!(!MaabaraError::Mpesa(MpesaError::Rejected { code: "400".into(), message: "bad".into() }).is_recoverable());
        assert!(!MaabaraError::InvalidInput("phone".into()).is_recoverable());
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = MaabaraError::Pdf("font table corrupt".into());
        assert_eq!(err.public_message(), "Internal server error");

        let err = MaabaraError::InvalidInput("Phone number is required".into());
        assert_eq!(err.public_message(), "Invalid input: Phone number is required");
    }

    #[test]
    fn test_envelope_shape() {
        let envelope = ErrorEnvelope {
            success: false,
            message: "Booking not found: MB-1".to_string(),
            error: "not_found",
            sql_state: None,
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "not_found");
        assert!(json.get("sqlState").is_none());
    }
}
