//! Tenant-keyed cache with a fixed TTL and bounded capacity.
//!
//! Entries expire a fixed duration after insertion; reads never extend
//! their life. Reads use `peek` so they do not reorder the LRU list, which
//! makes the list an insertion-order queue: on overflow the oldest entry is
//! evicted.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

/// Default time-to-live for resolved tenant configuration.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Default maximum number of cached tenants.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Cache policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Lifetime of an entry, measured from insertion.
    pub ttl: Duration,
    /// Maximum number of entries before the oldest is evicted.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Policy with the default TTL and capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the maximum number of entries.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Shared, thread-safe cache handle.
///
/// Cloning yields another handle onto the same entries. The lock is held
/// only for the map operation itself, never across an await point.
pub struct ConfigCache<V> {
    inner: Arc<Mutex<LruCache<String, CacheEntry<V>>>>,
    config: CacheConfig,
}

impl<V: Clone> ConfigCache<V> {
    /// Create an empty cache. A zero capacity is treated as one.
    pub fn new(config: CacheConfig) -> Self {
        let cap = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(cap))),
            config,
        }
    }

    /// The policy this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a live entry. Expired entries are dropped on the way.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock();
        let expired = match inner.peek(key) {
            None => return None,
            Some(entry) => entry.inserted_at.elapsed() >= self.config.ttl,
        };

        if expired {
            debug!(key = %key, "Cached config expired");
            inner.pop(key);
            None
        } else {
            trace!(key = %key, "Config cache hit");
            inner.peek(key).map(|e| e.value.clone())
        }
    }

    /// Insert or replace an entry, evicting the oldest one on overflow.
    pub fn put(&self, key: &str, value: V) {
        let entry = CacheEntry {
            value,
            inserted_at: Instant::now(),
        };
        let mut inner = self.inner.lock();
        if let Some((evicted, _)) = inner.push(key.to_string(), entry) {
            if evicted != key {
                debug!(key = %evicted, "Evicted oldest cached config");
            }
        }
        trace!(key = %key, size = inner.len(), "Config cached");
    }

    /// Drop an entry. Returns whether one was present.
    pub fn evict(&self, key: &str) -> bool {
        self.inner.lock().pop(key).is_some()
    }

    /// Number of stored entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl<V> Clone for ConfigCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: self.config.clone(),
        }
    }
}

impl<V: Clone> Default for ConfigCache<V> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
