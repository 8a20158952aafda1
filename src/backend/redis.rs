//! Redis cache backend implementation.

use super::CacheBackend;
use crate::error::{Error, Result};
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config as PoolConfig, Pool, PoolConfig as PoolSizeConfig, Runtime};
use std::time::Duration;

/// Default Redis connection pool size.
/// Override with REDIS_POOL_SIZE environment variable
const DEFAULT_POOL_SIZE: usize = 16;

/// Configuration for Redis backend.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub url: String, // e.g., "redis://localhost:6379"
    pub pool_size: usize,
    /// Prepended as `"{prefix}:"` to every key when non-empty.
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            url: "redis://localhost:6379".to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            key_prefix: String::new(),
        }
    }
}

/// Redis-backed version store with connection pooling.
///
/// # Example
///
/// ```no_run
/// # use etag_kit::backend::{RedisBackend, RedisConfig};
/// # use etag_kit::ETagLookup;
/// # fn example() -> etag_kit::Result<()> {
/// let backend = RedisBackend::new(RedisConfig {
///     key_prefix: "api".to_string(),
///     ..Default::default()
/// })?;
/// let lookup = ETagLookup::new(backend);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
    key_prefix: String,
}

impl RedisBackend {
    /// Create new Redis backend from configuration.
    ///
    /// # Errors
    /// Returns `Err` if connection pool creation fails
    pub fn new(config: RedisConfig) -> Result<Self> {
        let mut pool_config = PoolConfig::from_url(config.url.clone());
        pool_config.pool = Some(PoolSizeConfig::new(config.pool_size));

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::ConfigError(format!("Failed to create Redis pool: {}", e)))?;

        info!(
            "✓ Redis backend initialized with url: {} (pool size: {})",
            config.url, config.pool_size
        );

        Ok(RedisBackend {
            pool,
            key_prefix: config.key_prefix,
        })
    }

    /// Create from a connection URL directly.
    ///
    /// Pool size comes from `REDIS_POOL_SIZE` when set, otherwise
    /// `DEFAULT_POOL_SIZE`.
    ///
    /// # Errors
    /// Returns `Err` if connection pool creation fails
    pub fn from_url(url: impl Into<String>) -> Result<Self> {
        let pool_size = std::env::var("REDIS_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_POOL_SIZE);

        Self::new(RedisConfig {
            url: url.into(),
            pool_size,
            ..Default::default()
        })
    }

    fn full_key(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.key_prefix, key)
        }
    }
}

impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let full_key = self.full_key(key);
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| Error::BackendError(format!("Failed to get Redis connection: {}", e)))?;

        let value: Option<Vec<u8>> = conn.get(&full_key).await.map_err(|e| {
            Error::BackendError(format!("Redis GET failed for key {}: {}", full_key, e))
        })?;

        match &value {
            Some(_) => debug!("✓ Redis GET {} -> HIT", full_key),
            None => debug!("✓ Redis GET {} -> MISS", full_key),
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let full_key = self.full_key(key);
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| Error::BackendError(format!("Failed to get Redis connection: {}", e)))?;

        let result: std::result::Result<(), _> = match ttl {
            Some(d) => conn.set_ex(&full_key, value, d.as_secs().max(1)).await,
            None => conn.set(&full_key, value).await,
        };
        result.map_err(|e| {
            Error::BackendError(format!("Redis SET failed for key {}: {}", full_key, e))
        })?;

        debug!("✓ Redis SET {}", full_key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let full_key = self.full_key(key);
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| Error::BackendError(format!("Failed to get Redis connection: {}", e)))?;

        let _: () = conn.del(&full_key).await.map_err(|e| {
            Error::BackendError(format!("Redis DELETE failed for key {}: {}", full_key, e))
        })?;

        debug!("✓ Redis DELETE {}", full_key);
        Ok(())
    }
}
