//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{MaabaraError, Result};
use super::Settings;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_server_config(&settings.server)?;
    validate_database_config(&settings.database)?;
    validate_redis_config(&settings.redis)?;
    validate_auth_config(&settings.auth)?;
    validate_mpesa_config(&settings.mpesa)?;
    validate_email_config(&settings.email)?;
    validate_upload_config(&settings.uploads)?;
    validate_logging_config(&settings.logging)?;

    Ok(())
}

/// Validate HTTP server configuration
fn validate_server_config(config: &super::ServerConfig) -> Result<()> {
    if config.port == 0 {
        return Err(MaabaraError::Config(
            "Server port must be greater than 0".to_string()
        ));
    }

    if url::Url::parse(&config.public_url).is_err() {
        return Err(MaabaraError::Config(
            format!("Invalid public URL: {}", config.public_url)
        ));
    }

    if config.max_body_bytes == 0 {
        return Err(MaabaraError::Config(
            "Max body size must be greater than 0".to_string()
        ));
    }

    for proxy in &config.trusted_proxies {
        if proxy.trim().parse::<std::net::IpAddr>().is_err() {
            return Err(MaabaraError::Config(
                format!("Invalid trusted proxy address: {}", proxy)
            ));
        }
    }

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(MaabaraError::Config(
            "Database URL is required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(MaabaraError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(MaabaraError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate Redis configuration
fn validate_redis_config(config: &super::RedisConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(MaabaraError::Config(
            "Redis URL is required".to_string()
        ));
    }

    Ok(())
}

/// Validate token signing configuration
fn validate_auth_config(config: &super::AuthConfig) -> Result<()> {
    if config.jwt_secret.len() < 32 {
        return Err(MaabaraError::Config(
            "JWT secret must be at least 32 characters".to_string()
        ));
    }

    if config.token_ttl_hours <= 0 {
        return Err(MaabaraError::Config(
            "Token TTL must be greater than 0".to_string()
        ));
    }

    if config.bootstrap_admin_email.is_some() != config.bootstrap_admin_password.is_some() {
        return Err(MaabaraError::Config(
            "Bootstrap admin email and password must be set together".to_string()
        ));
    }

    Ok(())
}

/// Validate M-Pesa configuration
fn validate_mpesa_config(config: &super::MpesaConfig) -> Result<()> {
    if config.environment != "sandbox" && config.environment != "production" {
        return Err(MaabaraError::Config(
            format!("Invalid M-Pesa environment: {}. Valid values: sandbox, production", config.environment)
        ));
    }

    if config.shortcode.is_empty() || !config.shortcode.chars().all(|c| c.is_ascii_digit()) {
        return Err(MaabaraError::Config(
            "M-Pesa shortcode must be numeric".to_string()
        ));
    }

    if url::Url::parse(&config.callback_url).is_err() {
        return Err(MaabaraError::Config(
            format!("Invalid M-Pesa callback URL: {}", config.callback_url)
        ));
    }

    if config.callback_token.is_empty() {
        return Err(MaabaraError::Config(
            "M-Pesa callback token is required".to_string()
        ));
    }

    if config.timeout_seconds == 0 {
        return Err(MaabaraError::Config(
            "M-Pesa timeout must be greater than 0".to_string()
        ));
    }

    if config.query_after_seconds < 0 || config.expire_after_seconds <= config.query_after_seconds {
        return Err(MaabaraError::Config(
            "M-Pesa expiry must be later than the first status query".to_string()
        ));
    }

    if config.reconcile_interval_seconds == 0 {
        return Err(MaabaraError::Config(
            "Reconcile interval must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate outgoing mail configuration
fn validate_email_config(config: &super::EmailConfig) -> Result<()> {
    if config.smtp_host.is_empty() {
        return Err(MaabaraError::Config(
            "SMTP host is required".to_string()
        ));
    }

    if config.from_address.parse::<lettre::Address>().is_err() {
        return Err(MaabaraError::Config(
            format!("Invalid sender address: {}", config.from_address)
        ));
    }

    Ok(())
}

/// Validate upload configuration
fn validate_upload_config(config: &super::UploadConfig) -> Result<()> {
    if config.directory.is_empty() {
        return Err(MaabaraError::Config(
            "Upload directory is required".to_string()
        ));
    }

    if config.max_bytes == 0 {
        return Err(MaabaraError::Config(
            "Upload size limit must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(MaabaraError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(MaabaraError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    Ok(())
}
