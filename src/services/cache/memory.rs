// In-process result cache
//
// Same get/set contract as the Redis backend, with LRU eviction at a fixed
// capacity and TTL expiration checked on read.

use crate::error::AppError;
use crate::services::cache::adapter::CacheLayer;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Cached payload with metadata
#[derive(Debug, Clone)]
struct CachedPayload {
    /// Serialized row set
    payload: String,
    /// Time when cached
    cached_at: Instant,
    /// Time-to-live duration
    ttl: Duration,
    /// Last read or write, for LRU ordering
    last_accessed: Instant,
}

impl CachedPayload {
    /// Check if cache entry is expired
    fn is_expired(&self) -> bool {
        self.cached_at.elapsed() >= self.ttl
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Total cache hits
    pub hits: u64,
    /// Total cache misses
    pub misses: u64,
    /// Total evictions
    pub evictions: u64,
    /// Total expirations
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, CachedPayload>,
    stats: CacheStats,
}

/// In-memory cache with LRU eviction and TTL
pub struct MemoryCache {
    inner: Mutex<Inner>,
    /// Maximum number of entries
    max_size: usize,
}

impl MemoryCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_size: max_size.max(1),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, AppError> {
        self.inner
            .lock()
            .map_err(|_| AppError::Cache("In-memory cache lock poisoned".to_string()))
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.lock().map(|inner| inner.stats.clone()).unwrap_or_default()
    }

    /// Get current cache size, expired entries included until read
    pub fn size(&self) -> usize {
        self.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    /// Evict least recently used entry
    fn evict_lru(inner: &mut Inner) {
        let oldest = inner
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            inner.entries.remove(&key);
            inner.stats.evictions += 1;
            tracing::debug!("Evicted cache entry: {}", key);
        }
    }
}

impl Default for MemoryCache {
    /// 1000 entries
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait::async_trait]
impl CacheLayer for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut inner = self.lock()?;
        let inner = &mut *inner;

        let expired = match inner.entries.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                entry.last_accessed = Instant::now();
                inner.stats.hits += 1;
                return Ok(Some(entry.payload.clone()));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.entries.remove(key);
            inner.stats.expirations += 1;
            tracing::debug!("Cache expired for key: {}", key);
        }
        inner.stats.misses += 1;
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        let mut inner = self.lock()?;

        if inner.entries.len() >= self.max_size && !inner.entries.contains_key(key) {
            Self::evict_lru(&mut inner);
        }

        let now = Instant::now();
        inner.entries.insert(
            key.to_string(),
            CachedPayload {
                payload: value.to_string(),
                cached_at: now,
                ttl,
                last_accessed: now,
            },
        );

        tracing::debug!("Cached payload for key: {} (cache size: {})", key, inner.entries.len());
        Ok(())
    }

    async fn close(&self) {
        if let Ok(mut inner) = self.lock() {
            let count = inner.entries.len();
            inner.entries.clear();
            tracing::debug!("Cleared {} in-memory cache entries", count);
        }
    }
}
