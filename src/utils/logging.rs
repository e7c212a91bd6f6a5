//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for the Maabara service.

use tracing::{info, warn, error};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use crate::config::LoggingConfig;
use crate::utils::errors::{MaabaraError, Result};

/// Initialize logging based on configuration
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.directory, &config.file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.level))
        .map_err(|e| MaabaraError::Config(format!("Invalid log filter: {}", e)))?;

    let file_layer = if config.json {
        tracing_subscriber::fmt::layer().json().with_writer(non_blocking).boxed()
    } else {
        tracing_subscriber::fmt::layer().with_ansi(false).with_writer(non_blocking).boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(file_layer)
        .try_init()
        .map_err(|e| MaabaraError::Config(format!("Logging already initialized: {}", e)))?;

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log booking lifecycle actions with structured data
pub fn log_booking_action(booking_id: i64, reference: &str, action: &str, details: Option<&str>) {
    info!(
        booking_id = booking_id,
        reference = reference,
        action = action,
        details = details,
        "Booking action performed"
    );
}

/// Log a payment state transition
pub fn log_payment_transition(payment_id: i64, from: &str, to: &str, result_code: Option<i32>) {
    if to == "completed" {
        info!(
            payment_id = payment_id,
            from = from,
            to = to,
            result_code = result_code,
            "Payment transitioned"
        );
    } else {
        warn!(
            payment_id = payment_id,
            from = from,
            to = to,
            result_code = result_code,
            "Payment transitioned"
        );
    }
}

/// Log admin actions
pub fn log_admin_action(admin_id: i64, action: &str, target: Option<&str>, details: Option<&str>) {
    warn!(
        admin_id = admin_id,
        action = action,
        target = target,
        details = details,
        "Admin action performed"
    );
}

/// Log API errors with context
pub fn log_api_error(api: &str, error: &str, context: Option<&str>) {
    error!(
        api = api,
        error = error,
        context = context,
        "API error occurred"
    );
}
