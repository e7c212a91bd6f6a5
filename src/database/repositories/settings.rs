//! Site settings repository implementation

use sqlx::PgPool;
use chrono::Utc;
use crate::models::settings::SiteSetting;
use crate::utils::errors::MaabaraError;

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get setting by key
    pub async fn get(&self, key: &str) -> Result<Option<SiteSetting>, MaabaraError> {
        let setting = sqlx::query_as::<_, SiteSetting>(
            "SELECT id, key, value, updated_by, updated_at FROM site_settings WHERE key = $1"
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(setting)
    }

    /// Create or replace a setting
    pub async fn upsert(&self, key: &str, value: &serde_json::Value, updated_by: Option<i64>) -> Result<SiteSetting, MaabaraError> {
        let setting = sqlx::query_as::<_, SiteSetting>(
            r#"
            INSERT INTO site_settings (key, value, updated_by, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (key)
            DO UPDATE SET
                value = EXCLUDED.value,
                updated_by = EXCLUDED.updated_by,
                updated_at = EXCLUDED.updated_at
            RETURNING id, key, value, updated_by, updated_at
            "#
        )
        .bind(key)
        .bind(value)
        .bind(updated_by)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(setting)
    }

    /// List all settings
    pub async fn list(&self) -> Result<Vec<SiteSetting>, MaabaraError> {
        let settings = sqlx::query_as::<_, SiteSetting>(
            "SELECT id, key, value, updated_by, updated_at FROM site_settings ORDER BY key ASC"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(settings)
    }
}
