//! Key-value stores that hold published versions.
//!
//! The lookup policy only needs `get` and `set`. Eviction and expiry belong
//! to the store.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;

#[cfg(feature = "inmemory")]
mod inmemory;
#[cfg(feature = "memcached")]
mod memcached;
#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryBackend;
#[cfg(feature = "memcached")]
pub use memcached::{MemcachedBackend, MemcachedConfig};
#[cfg(feature = "redis")]
pub use self::redis::{RedisBackend, RedisConfig};

/// Async key-value store keyed by string.
///
/// Implementations must be cheap to share; wrap connection pools or maps in
/// `Arc` and derive `Clone`.
pub trait CacheBackend: Send + Sync {
    /// Fetch the value stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Store `value` under `key`, overwriting any previous value.
    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove `key` if present.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Whether `key` currently holds a value.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool>> + Send {
        async move { Ok(self.get(key).await?.is_some()) }
    }
}
