//! Site settings model
//!
//! Settings are stored as key/value JSON rows. Gmail and M-Pesa settings have
//! typed views over the `gmail` and `mpesa` keys.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use crate::config::{EmailConfig, MpesaConfig};
use crate::utils::helpers::{is_masked, mask_secret};

pub const GMAIL_SETTINGS_KEY: &str = "gmail";
pub const MPESA_SETTINGS_KEY: &str = "mpesa";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SiteSetting {
    pub id: i64,
    pub key: String,
    pub value: serde_json::Value,
    pub updated_by: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutSettingRequest {
    pub value: serde_json::Value,
}

/// SMTP account used to send certificates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GmailSettings {
    pub smtp_host: String,
    pub username: String,
    pub password: String,
    pub from_address: String,
    pub from_name: String,
}

impl From<&EmailConfig> for GmailSettings {
    fn from(config: &EmailConfig) -> Self {
        Self {
            smtp_host: config.smtp_host.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            from_address: config.from_address.clone(),
            from_name: config.from_name.clone(),
        }
    }
}

impl GmailSettings {
    pub fn is_complete(&self) -> bool {
        !self.smtp_host.is_empty() && !self.username.is_empty() && !self.password.is_empty()
    }

    /// Copy with the password masked for display
    pub fn masked(&self) -> Self {
        Self {
            password: mask_secret(&self.password),
            ..self.clone()
        }
    }

    /// Apply an update coming from the dashboard; a masked password keeps the stored one
    pub fn merged_with(&self, update: GmailSettings) -> Self {
        Self {
            password: if is_masked(&update.password) { self.password.clone() } else { update.password },
            ..update
        }
    }
}

/// Daraja credentials and STK push parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpesaSettings {
    pub environment: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub shortcode: String,
    pub passkey: String,
    pub callback_url: String,
}

impl From<&MpesaConfig> for MpesaSettings {
    fn from(config: &MpesaConfig) -> Self {
        Self {
            environment: config.environment.clone(),
            consumer_key: config.consumer_key.clone(),
            consumer_secret: config.consumer_secret.clone(),
            shortcode: config.shortcode.clone(),
            passkey: config.passkey.clone(),
            callback_url: config.callback_url.clone(),
        }
    }
}

impl MpesaSettings {
    pub fn is_complete(&self) -> bool {
        !self.consumer_key.is_empty()
            && !self.consumer_secret.is_empty()
            && !self.shortcode.is_empty()
            && !self.passkey.is_empty()
            && !self.callback_url.is_empty()
    }

    pub fn masked(&self) -> Self {
        Self {
            consumer_secret: mask_secret(&self.consumer_secret),
            passkey: mask_secret(&self.passkey),
            ..self.clone()
        }
    }

    pub fn merged_with(&self, update: MpesaSettings) -> Self {
        Self {
            consumer_secret: if is_masked(&update.consumer_secret) {
                self.consumer_secret.clone()
            } else {
                update.consumer_secret.clone()
            },
            passkey: if is_masked(&update.passkey) { self.passkey.clone() } else { update.passkey.clone() },
            ..update
        }
    }
}

/// Pagination parameters shared by list endpoints
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    20
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl Pagination {
    pub const MAX_PER_PAGE: usize = 100;
    pub const MAX_PAGE: usize = 100_000;

    pub fn limit(&self) -> i64 {
        self.per_page.clamp(1, Self::MAX_PER_PAGE) as i64
    }

    pub fn offset(&self) -> i64 {
        crate::utils::helpers::calculate_offset(self.page.min(Self::MAX_PAGE), self.limit() as usize)
    }
}

/// Admin dashboard counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_events: i64,
    pub published_events: i64,
    pub total_users: i64,
    pub total_bookings: i64,
    pub pending_bookings: i64,
    pub confirmed_bookings: i64,
    pub cancelled_bookings: i64,
    pub completed_payments: i64,
    pub revenue: i64,
    pub certificates_issued: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gmail() -> GmailSettings {
        GmailSettings {
            smtp_host: "smtp.gmail.com".to_string(),
            username: "certs@maabara.online".to_string(),
            password: "app-password-1234".to_string(),
            from_address: "certs@maabara.online".to_string(),
            from_name: "Maabara".to_string(),
        }
    }

    #[test]
    fn test_masked_update_keeps_stored_password() {
        let stored = gmail();
        let mut update = stored.masked();
        update.from_name = "Maabara Online".to_string();

        let merged = stored.merged_with(update);
        assert_eq!(merged.password, "app-password-1234");
        assert_eq!(merged.from_name, "Maabara Online");
    }

    #[test]
    fn test_new_password_replaces_stored() {
        let stored = gmail();
        let mut update = stored.clone();
        update.password = "new-app-password".to_string();
        assert_eq!(stored.merged_with(update).password, "new-app-password");
    }

    #[test]
    fn test_mpesa_masking() {
        let settings = MpesaSettings {
            environment: "sandbox".to_string(),
            consumer_key: "key".to_string(),
            consumer_secret: "consumer-secret".to_string(),
            shortcode: "174379".to_string(),
            passkey: "bfb279f9aa9bdbcf158e97dd71a467cd".to_string(),
            callback_url: "https://maabara.online/api/payments/mpesa/callback".to_string(),
        };
        let masked = settings.masked();
        assert!(masked.passkey.ends_with("67cd"));
        assert!(masked.passkey.starts_with('*'));
        assert_eq!(settings.merged_with(masked), settings);
    }

    #[test]
    fn test_pagination_bounds() {
        let p = Pagination { page: 3, per_page: 500 };
        assert_eq!(p.limit(), 100);
        assert_eq!(p.offset(), 200);

        let p = Pagination { page: 0, per_page: 0 };
        assert_eq!(p.limit(), 1);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_huge_page_is_clamped() {
        let p = Pagination { page: usize::MAX, per_page: 100 };
        assert_eq!(p.offset(), (Pagination::MAX_PAGE as i64 - 1) * 100);
    }
}
