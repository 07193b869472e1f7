use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use super::Cache;
use crate::clock::Clock;
use crate::error::CacheResult;
use crate::models::PasteSnapshot;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: PasteSnapshot,
    expires_at: DateTime<Utc>,
}

/// In-process cache with per-entry TTL. Expired entries are dropped when read.
#[derive(Clone, Debug)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        MemoryCache {
            entries: Arc::default(),
            clock,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<PasteSnapshot>> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // expired; check again under the write lock since it may have been refreshed
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.expires_at <= now) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &PasteSnapshot,
        ttl: Duration,
    ) -> CacheResult<()> {
        let entry = CacheEntry {
            value: value.clone(),
            expires_at: self.clock.now() + ttl,
        };
        self.entries.write().await.insert(key.to_owned(), entry);
        Ok(())
    }
}
