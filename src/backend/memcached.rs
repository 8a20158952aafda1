//! Memcached version store.
//!
//! Values are the raw ETag bytes published by `get_header`; keys are
//! `etag-{Type}-{identifier}`. Memcached's text protocol forbids whitespace
//! and control bytes in keys and caps them at 250 bytes, and a
//! `KeyIdentity::Field` value can carry either, so keys are checked before
//! they reach the wire.

use super::CacheBackend;
use crate::error::{Error, Result};
use async_memcached::AsciiProtocol;
use deadpool_memcached::{Manager, Pool};
use std::time::Duration;

/// Default Memcached connection pool size.
/// Override with MEMCACHED_POOL_SIZE environment variable
const DEFAULT_POOL_SIZE: u32 = 16;

/// Longest key the server accepts.
const MAX_KEY_LEN: usize = 250;

/// Reject keys the text protocol cannot carry.
///
/// A space in an identifier would otherwise split the command line and the
/// server would answer for a different key.
fn check_key(key: &str) -> Result<()> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(Error::BackendError(format!(
            "Memcached key must be 1..={} bytes, got {}",
            MAX_KEY_LEN,
            key.len()
        )));
    }
    if key.bytes().any(|b| b <= b' ' || b == 0x7f) {
        return Err(Error::BackendError(format!(
            "Memcached key {:?} contains whitespace or control bytes",
            key
        )));
    }
    Ok(())
}

/// Configuration for Memcached backend.
#[derive(Clone, Debug)]
pub struct MemcachedConfig {
    pub servers: Vec<String>, // e.g., ["localhost:11211"]
    pub pool_size: u32,
}

impl Default for MemcachedConfig {
    fn default() -> Self {
        MemcachedConfig {
            servers: vec!["localhost:11211".to_string()],
            pool_size: 10,
        }
    }
}

/// Memcached-backed version store.
///
/// Shares published ETags across every process pointed at the same server.
/// Tokens are stored verbatim, so a token read back compares byte for byte
/// with the one published.
///
/// # Example
///
/// ```no_run
/// # use etag_kit::backend::{MemcachedBackend, MemcachedConfig};
/// # use etag_kit::ETagLookup;
/// # async fn example() -> etag_kit::Result<()> {
/// let backend = MemcachedBackend::new(MemcachedConfig::default()).await?;
/// let lookup = ETagLookup::new(backend);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MemcachedBackend {
    pool: Pool,
}

impl MemcachedBackend {
    /// Create new Memcached backend from configuration.
    ///
    /// # Errors
    /// Returns `Err` if no server is configured or pool creation fails
    pub async fn new(config: MemcachedConfig) -> Result<Self> {
        // deadpool-memcached Manager takes a single server address
        let addr = config
            .servers
            .first()
            .ok_or_else(|| Error::ConfigError("No memcached servers specified".to_string()))?
            .clone();

        let pool = Pool::builder(Manager::new(addr.clone()))
            .max_size(config.pool_size as usize)
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to create connection pool: {}", e)))?;

        info!(
            "✓ Memcached ETag store initialized with server: {} (pool size: {})",
            addr, config.pool_size
        );

        Ok(MemcachedBackend { pool })
    }

    /// Create from server address directly.
    ///
    /// Pool size comes from `MEMCACHED_POOL_SIZE` when set, otherwise
    /// `DEFAULT_POOL_SIZE`.
    ///
    /// # Errors
    /// Returns `Err` if connection pool creation fails
    pub async fn from_server(addr: String) -> Result<Self> {
        let pool_size = std::env::var("MEMCACHED_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_POOL_SIZE);

        Self::new(MemcachedConfig {
            servers: vec![addr],
            pool_size,
        })
        .await
    }
}

impl CacheBackend for MemcachedBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        check_key(key)?;
        let mut conn = self.pool.get().await.map_err(|e| {
            Error::BackendError(format!("Failed to get Memcached connection: {}", e))
        })?;

        match conn.get(key).await {
            Ok(Some(value)) => {
                debug!("✓ Memcached GET {} -> stored ETag", key);
                Ok(value.data)
            }
            Ok(None) => {
                debug!("✓ Memcached GET {} -> nothing published", key);
                Ok(None)
            }
            Err(e) => Err(Error::BackendError(format!(
                "Memcached GET failed for key {}: {}",
                key, e
            ))),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        check_key(key)?;
        let mut conn = self.pool.get().await.map_err(|e| {
            Error::BackendError(format!("Failed to get Memcached connection: {}", e))
        })?;

        // Values < 2592000 (30 days) are interpreted as seconds from now
        let expiration = ttl.map(|d| d.as_secs() as i64);

        conn.set(key, value.as_slice(), expiration, None)
            .await
            .map_err(|e| {
                Error::BackendError(format!("Memcached SET failed for key {}: {}", key, e))
            })?;

        debug!("✓ Memcached SET {} ({} byte ETag)", key, value.len());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        check_key(key)?;
        let mut conn = self.pool.get().await.map_err(|e| {
            Error::BackendError(format!("Failed to get Memcached connection: {}", e))
        })?;

        conn.delete(key).await.map_err(|e| {
            Error::BackendError(format!("Memcached DELETE failed for key {}: {}", key, e))
        })?;

        debug!("✓ Memcached DELETE {}", key);
        Ok(())
    }
}
