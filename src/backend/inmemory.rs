//! In-memory cache backend.

use super::CacheBackend;
use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Process-local store backed by a concurrent hash map.
///
/// Clones share the same map. Expired entries are dropped lazily on read.
///
/// # Example
///
/// ```
/// # use etag_kit::backend::{CacheBackend, InMemoryBackend};
/// # async fn example() -> etag_kit::Result<()> {
/// let backend = InMemoryBackend::new();
/// backend.set("etag-Widget-7", b"abc123".to_vec(), None).await?;
/// assert_eq!(backend.get("etag-Widget-7").await?, Some(b"abc123".to_vec()));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, Entry>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including ones not yet evicted.
    pub async fn len(&self) -> usize {
        self.store.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.store.clear();
        warn!("⚠ InMemory cache cleared");
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();

        let hit = match self.store.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            Some(_) => None,
            None => {
                debug!("InMemory GET {} -> MISS", key);
                return Ok(None);
            }
        };

        match hit {
            Some(value) => {
                debug!("✓ InMemory GET {} -> HIT", key);
                Ok(Some(value))
            }
            None => {
                self.store.remove_if(key, |_, entry| entry.is_expired(now));
                debug!("InMemory GET {} -> EXPIRED", key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        self.store
            .insert(key.to_string(), Entry { value, expires_at });

        match ttl {
            Some(d) => debug!("✓ InMemory SET {} (TTL: {:?})", key, d),
            None => debug!("✓ InMemory SET {}", key),
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.remove(key);
        debug!("✓ InMemory DELETE {}", key);
        Ok(())
    }
}
