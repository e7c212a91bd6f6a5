//! Redis integration service implementation
//!
//! Prefixed JSON cache used for short-lived values such as the M-Pesa
//! access token. Callers treat every Redis failure as a cache miss.

use redis::{Client, AsyncCommands, RedisResult};
use serde::{Serialize, Deserialize};
use tracing::{warn, debug};
use crate::config::RedisConfig;
use crate::utils::errors::Result;

/// Redis service for caching
#[derive(Clone, Debug)]
pub struct RedisService {
    client: Client,
    prefix: String,
    default_ttl: u64,
}

impl RedisService {
    /// Create a new RedisService instance; no connection is opened yet
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;

        Ok(Self {
            client,
            prefix: config.prefix.clone(),
            default_ttl: config.ttl_seconds,
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    async fn get_connection(&self) -> Result<redis::aio::Connection> {
        Ok(self.client.get_async_connection().await?)
    }

    /// Set a value with TTL
    pub async fn set<T>(&self, key: &str, value: &T, ttl_seconds: Option<u64>) -> Result<()>
    where
        T: Serialize,
    {
        let mut conn = self.get_connection().await?;
        let serialized = serde_json::to_string(value)?;
        let full_key = self.full_key(key);
        let ttl = ttl_seconds.unwrap_or(self.default_ttl).max(1);

        let _: () = conn.set_ex(&full_key, serialized, ttl).await?;

        debug!(key = %full_key, ttl = ttl, "Value set in Redis");
        Ok(())
    }

    /// Get a value
    pub async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut conn = self.get_connection().await?;
        let full_key = self.full_key(key);

        let result: Option<String> = conn.get(&full_key).await?;

        match result {
            Some(data) => {
                let value = serde_json::from_str::<T>(&data)?;
                debug!(key = %full_key, "Value retrieved from Redis");
                Ok(Some(value))
            }
            None => {
                debug!(key = %full_key, "Key not found in Redis");
                Ok(None)
            }
        }
    }

    /// Delete a key
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let full_key = self.full_key(key);

        let deleted: i32 = conn.del(&full_key).await?;

        debug!(key = %full_key, deleted = deleted > 0, "Key deletion attempted");
        Ok(deleted > 0)
    }

    /// Health check for Redis connection
    pub async fn health_check(&self) -> bool {
        match self.get_connection().await {
            Ok(mut conn) => {
                let result: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
                match result {
                    Ok(response) => response == "PONG",
                    Err(e) => {
                        warn!(error = %e, "Redis health check failed");
                        false
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Redis connection failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn test_keys_are_prefixed() {
        let settings = Settings::default();
        let service = RedisService::new(&settings.redis).unwrap();
        assert_eq!(service.full_key("mpesa:token:174379"), "maabara:mpesa:token:174379");
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let mut settings = Settings::default();
        settings.redis.url = "not a url".to_string();
        assert!(RedisService::new(&settings.redis).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_redis_is_unhealthy() {
        let mut settings = Settings::default();
        settings.redis.url = "redis://127.0.0.1:1".to_string();
        let service = RedisService::new(&settings.redis).unwrap();
        assert!(!service.health_check().await);
        assert!(service.get::<String>("missing").await.is_err());
    }
}
