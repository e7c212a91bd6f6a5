//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use std::net::IpAddr;
use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub mpesa: MpesaConfig,
    pub email: EmailConfig,
    pub certificates: CertificateConfig,
    pub uploads: UploadConfig,
    pub logging: LoggingConfig,
    pub features: FeaturesConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public base URL used when building links (certificates, uploads)
    pub public_url: String,
    pub allowed_origins: Vec<String>,
    pub max_body_bytes: usize,
    /// Peers whose `X-Forwarded-For` header is believed; empty means none
    pub trusted_proxies: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub url: String,
    pub prefix: String,
    pub ttl_seconds: u64,
}

/// Token signing and bootstrap admin configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_password: Option<String>,
}

/// M-Pesa Daraja configuration
///
/// Values here are defaults; an `mpesa` site setting saved from the admin
/// dashboard takes precedence field by field.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MpesaConfig {
    /// `sandbox` or `production`
    pub environment: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub shortcode: String,
    pub passkey: String,
    pub callback_url: String,
    /// Shared secret expected as `?token=` on callback requests
    pub callback_token: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub query_after_seconds: i64,
    pub expire_after_seconds: i64,
    pub reconcile_interval_seconds: u64,
}

/// Outgoing mail configuration (Gmail SMTP by default)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub username: String,
    pub password: String,
    pub from_address: String,
    pub from_name: String,
}

/// Certificate rendering configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CertificateConfig {
    pub issuer_name: String,
    pub signatory: String,
}

/// Image upload configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    pub directory: String,
    pub max_bytes: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: String,
    pub file_prefix: String,
    pub json: bool,
}

/// Feature flags configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeaturesConfig {
    pub payment_reconciler: bool,
    pub certificate_emails: bool,
    pub rate_limiting: bool,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    ///
    /// Defaults come first, then `config.toml` (optional), then
    /// `MAABARA__SECTION__KEY` variables. A bare `PORT` variable wins over
    /// everything for the listen port.
    pub fn new() -> Result<Self, config::ConfigError> {
        let defaults = config::Config::try_from(&Settings::default())?;

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("MAABARA")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.allowed_origins")
                    .with_list_parse_key("server.trusted_proxies")
                    .try_parsing(true),
            )
            .set_override_option("server.port", std::env::var("PORT").ok())?
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::MaabaraError> {
        super::validation::validate_settings(self)
    }

    /// Socket address string the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl ServerConfig {
    /// Trusted proxy addresses; entries that fail to parse are skipped
    pub fn trusted_proxy_addrs(&self) -> Vec<IpAddr> {
        self.trusted_proxies.iter().filter_map(|p| p.trim().parse().ok()).collect()
    }
}

/// Daraja base URL for an environment name
pub fn daraja_base_url(environment: &str) -> &'static str {
    if environment == "production" {
        "https://api.safaricom.co.ke"
    } else {
        "https://sandbox.safaricom.co.ke"
    }
}

impl MpesaConfig {
    /// Daraja base URL for the configured environment
    pub fn base_url(&self) -> &'static str {
        daraja_base_url(&self.environment)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3001,
                public_url: "http://localhost:3001".to_string(),
                allowed_origins: vec!["http://localhost:5173".to_string()],
                max_body_bytes: 10 * 1024 * 1024,
                trusted_proxies: Vec::new(),
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/maabara".to_string(),
                max_connections: 10,
                min_connections: 1,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                prefix: "maabara:".to_string(),
                ttl_seconds: 3600,
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production-please-32b".to_string(),
                token_ttl_hours: 24,
                bootstrap_admin_email: None,
                bootstrap_admin_password: None,
            },
            mpesa: MpesaConfig {
                environment: "sandbox".to_string(),
                consumer_key: String::new(),
                consumer_secret: String::new(),
                shortcode: "174379".to_string(),
                passkey: String::new(),
                callback_url: "http://localhost:3001/api/payments/mpesa/callback".to_string(),
                callback_token: "change-me".to_string(),
                timeout_seconds: 30,
                max_retries: 3,
                query_after_seconds: 30,
                expire_after_seconds: 300,
                reconcile_interval_seconds: 60,
            },
            email: EmailConfig {
                smtp_host: "smtp.gmail.com".to_string(),
                username: String::new(),
                password: String::new(),
                from_address: "no-reply@maabara.online".to_string(),
                from_name: "Maabara Online".to_string(),
            },
            certificates: CertificateConfig {
                issuer_name: "Maabara Online".to_string(),
                signatory: "Programme Director".to_string(),
            },
            uploads: UploadConfig {
                directory: "uploads".to_string(),
                max_bytes: 5 * 1024 * 1024,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                directory: "logs".to_string(),
                file_prefix: "maabara.log".to_string(),
                json: false,
            },
            features: FeaturesConfig {
                payment_reconciler: true,
                certificate_emails: true,
                rate_limiting: true,
            },
        }
    }
}
