use chrono::Duration;
use tracing::{debug, warn};

use crate::error::CacheResult;
use crate::models::PasteSnapshot;

pub mod memory;
pub mod redis;

/// Cache key for the paste with the given code.
pub fn paste_key(code: &str) -> String {
    format!("paste:{code}")
}

/// A key-value cache with per-entry expiry.
#[allow(async_fn_in_trait)]
pub trait Cache {
    /// Get a cached snapshot, or `None` on a miss.
    async fn get(&self, key: &str) -> CacheResult<Option<PasteSnapshot>>;

    /// Store a snapshot that expires after `ttl`.
    async fn set_with_ttl(&self, key: &str, value: &PasteSnapshot, ttl: Duration)
        -> CacheResult<()>;
}

#[derive(Clone, Debug)]
pub enum AnyCache {
    Redis(redis::RedisCache),
    Memory(memory::MemoryCache),
    /// No cache at all. Every read misses and every write is dropped.
    Disabled,
}

impl Cache for AnyCache {
    async fn get(&self, key: &str) -> CacheResult<Option<PasteSnapshot>> {
        match self {
            AnyCache::Redis(redis) => redis.get(key).await,
            AnyCache::Memory(memory) => memory.get(key).await,
            AnyCache::Disabled => Ok(None),
        }
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &PasteSnapshot,
        ttl: Duration,
    ) -> CacheResult<()> {
        match self {
            AnyCache::Redis(redis) => redis.set_with_ttl(key, value, ttl).await,
            AnyCache::Memory(memory) => memory.set_with_ttl(key, value, ttl).await,
            AnyCache::Disabled => Ok(()),
        }
    }
}

impl From<redis::RedisCache> for AnyCache {
    fn from(value: redis::RedisCache) -> Self {
        AnyCache::Redis(value)
    }
}

impl From<memory::MemoryCache> for AnyCache {
    fn from(value: memory::MemoryCache) -> Self {
        AnyCache::Memory(value)
    }
}

/// Wraps a cache so that it can't fail: errors are logged and turned into misses or
/// dropped writes. Keys are namespaced with [`paste_key`].
#[derive(Clone, Debug)]
pub struct FailSoftCache<C> {
    inner: C,
}

impl<C: Cache> FailSoftCache<C> {
    pub fn new(inner: C) -> Self {
        FailSoftCache { inner }
    }

    pub async fn get(&self, code: &str) -> Option<PasteSnapshot> {
        match self.inner.get(&paste_key(code)).await {
            Ok(Some(snapshot)) => {
                debug!("cache hit: code='{code}'");
                Some(snapshot)
            }
            Ok(None) => {
                debug!("cache miss: code='{code}'");
                None
            }
            Err(err) => {
                warn!("cache read failed, treating as miss: code='{code}', error={err}");
                None
            }
        }
    }

    pub async fn set(&self, code: &str, snapshot: &PasteSnapshot, ttl: Duration) {
        if ttl <= Duration::zero() {
            return;
        }
        if let Err(err) = self.inner.set_with_ttl(&paste_key(code), snapshot, ttl).await {
            warn!("cache write failed, ignoring: code='{code}', error={err}");
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}
