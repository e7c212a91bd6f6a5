//! Site settings service
//!
//! Gmail and M-Pesa settings saved from the admin dashboard override the
//! file/environment configuration. Secrets never leave this service
//! unmasked except to the mailer and the Daraja client.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;
use crate::config::{EmailConfig, MpesaConfig};
use crate::database::repositories::SettingsRepository;
use crate::models::settings::{GMAIL_SETTINGS_KEY, MPESA_SETTINGS_KEY};
use crate::models::{GmailSettings, MpesaSettings, SiteSetting};
use crate::utils::errors::{MaabaraError, Result};
use crate::utils::helpers::is_valid_email;

#[derive(Clone)]
pub struct SettingsService {
    repo: SettingsRepository,
    email_defaults: EmailConfig,
    mpesa_defaults: MpesaConfig,
}

impl SettingsService {
    pub fn new(repo: SettingsRepository, email_defaults: EmailConfig, mpesa_defaults: MpesaConfig) -> Self {
        Self { repo, email_defaults, mpesa_defaults }
    }

    /// Shared secret expected on M-Pesa callbacks
    pub fn callback_token(&self) -> &str {
        &self.mpesa_defaults.callback_token
    }

    async fn stored<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(setting) = self.repo.get(key).await? else {
            return Ok(None);
        };

        match serde_json::from_value::<T>(setting.value) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key = key, error = %e, "Stored setting is malformed, using configured defaults");
                Ok(None)
            }
        }
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T, admin_id: i64) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.repo.upsert(key, &value, Some(admin_id)).await?;
        Ok(())
    }

    /// Effective SMTP settings, secrets included
    pub async fn gmail_settings(&self) -> Result<GmailSettings> {
        Ok(self.stored(GMAIL_SETTINGS_KEY).await?
            .unwrap_or_else(|| GmailSettings::from(&self.email_defaults)))
    }

    /// Save SMTP settings; returns them masked
    pub async fn update_gmail_settings(&self, update: GmailSettings, admin_id: i64) -> Result<GmailSettings> {
        if !update.from_address.is_empty() && !is_valid_email(&update.from_address) {
            return Err(MaabaraError::InvalidInput(format!("Invalid sender address: {}", update.from_address)));
        }

        let merged = self.gmail_settings().await?.merged_with(update);
        self.store(GMAIL_SETTINGS_KEY, &merged, admin_id).await?;
        Ok(merged.masked())
    }

    /// Effective Daraja settings, secrets included
    pub async fn mpesa_settings(&self) -> Result<MpesaSettings> {
        Ok(self.stored(MPESA_SETTINGS_KEY).await?
            .unwrap_or_else(|| MpesaSettings::from(&self.mpesa_defaults)))
    }

    /// Save Daraja settings; returns them masked
    pub async fn update_mpesa_settings(&self, update: MpesaSettings, admin_id: i64) -> Result<MpesaSettings> {
        if update.environment != "sandbox" && update.environment != "production" {
            return Err(MaabaraError::InvalidInput(
                format!("Invalid M-Pesa environment: {}", update.environment)
            ));
        }

        if !update.shortcode.chars().all(|c| c.is_ascii_digit()) {
            return Err(MaabaraError::InvalidInput("M-Pesa shortcode must be numeric".to_string()));
        }

        if !update.callback_url.is_empty() && url::Url::parse(&update.callback_url).is_err() {
            return Err(MaabaraError::InvalidInput(format!("Invalid callback URL: {}", update.callback_url)));
        }

        let merged = self.mpesa_settings().await?.merged_with(update);
        self.store(MPESA_SETTINGS_KEY, &merged, admin_id).await?;
        Ok(merged.masked())
    }

    /// Generic settings; the typed Gmail and M-Pesa rows are left out
    pub async fn list(&self) -> Result<Vec<SiteSetting>> {
        let settings = self.repo.list().await?;
        Ok(settings
            .into_iter()
            .filter(|s| Self::ensure_generic(&s.key).is_ok())
            .collect())
    }

    /// Generic setting by key
    pub async fn get(&self, key: &str) -> Result<SiteSetting> {
        Self::ensure_generic(key)?;
        self.repo.get(key).await?
            .ok_or_else(|| MaabaraError::SettingNotFound(key.to_string()))
    }

    /// Create or replace a generic setting
    pub async fn put(&self, key: &str, value: serde_json::Value, admin_id: i64) -> Result<SiteSetting> {
        Self::ensure_generic(key)?;
        if key.trim().is_empty() || key.len() > 64 {
            return Err(MaabaraError::InvalidInput("Setting key must be 1-64 characters".to_string()));
        }
        self.repo.upsert(key, &value, Some(admin_id)).await
    }

    /// Keys holding secrets are only reachable through their typed endpoints
    fn ensure_generic(key: &str) -> Result<()> {
        if key == GMAIL_SETTINGS_KEY || key == MPESA_SETTINGS_KEY {
            return Err(MaabaraError::InvalidInput(
                format!("Setting '{}' must be managed through its dedicated endpoint", key)
            ));
        }
        Ok(())
    }
}
