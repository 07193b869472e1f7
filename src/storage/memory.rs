use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use tokio::sync::RwLock;

use super::PasteStore;
use crate::clock::Clock;
use crate::error::{StoreError, StoreResult};
use crate::models::{NewPaste, Paste};

/// In-process store, mainly for tests and single-node development.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    pastes: Arc<RwLock<HashMap<String, Paste>>>,
    clock: Arc<dyn Clock>,
    retention: Duration,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>, retention: Duration) -> Self {
        MemoryStore {
            pastes: Arc::default(),
            clock,
            retention,
        }
    }

    /// Number of records physically held, expired ones included.
    pub async fn len(&self) -> usize {
        self.pastes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl PasteStore for MemoryStore {
    async fn find_by_code(&self, code: &str) -> StoreResult<Option<Paste>> {
        let now = self.clock.now();
        let pastes = self.pastes.read().await;
        Ok(pastes
            .get(code)
            .filter(|paste| !paste.is_expired_at(now))
            .cloned())
    }

    async fn insert(&self, paste: &NewPaste) -> StoreResult<Paste> {
        let now = self.clock.now();
        let mut pastes = self.pastes.write().await;

        if let Some(existing) = pastes.get(&paste.code) {
            if !existing.is_expired_at(now) {
                return Err(StoreError::DuplicateKey);
            }
        }

        let stored = Paste {
            code: paste.code.clone(),
            content: paste.content.clone(),
            is_custom_code: paste.is_custom_code,
            created_at: paste.created_at,
            expires_at: paste.created_at + self.retention,
        };
        pastes.insert(stored.code.clone(), stored.clone());
        Ok(stored)
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        let now = self.clock.now();
        let mut pastes = self.pastes.write().await;
        let before = pastes.len();
        pastes.retain(|_, paste| !paste.is_expired_at(now));
        Ok((before - pastes.len()) as u64)
    }
}
