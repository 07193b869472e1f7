use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

use crate::cache::{AnyCache, Cache, FailSoftCache};
use crate::clock::Clock;
use crate::codes::{generate_code, is_valid_custom_code, DEFAULT_CODE_LENGTH};
use crate::config::Config;
use crate::error::{PasteError, StoreError};
use crate::models::{NewPaste, Paste, PasteSnapshot};
use crate::storage::{AnyStore, PasteStore};
use crate::types::api::CreatedPaste;

const INVALID_CUSTOM_CODE: &str =
    "invalid custom code: use 4-50 characters (letters, numbers, _, -)";

/// Knobs of the paste service that come from configuration.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub base_url: String,
    pub cache_ttl: Duration,
    pub code_length: usize,
    pub max_generate_attempts: u32,
}

impl ServiceSettings {
    pub fn from_config(config: &Config) -> Self {
        ServiceSettings {
            base_url: config.base_url.clone(),
            cache_ttl: config.cache.ttl(),
            code_length: config.limits.code_length,
            max_generate_attempts: config.limits.max_generate_attempts,
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        ServiceSettings {
            base_url: "http://localhost:3000".into(),
            cache_ttl: Duration::hours(1),
            code_length: DEFAULT_CODE_LENGTH,
            max_generate_attempts: 3,
        }
    }
}

/// Creates and serves pastes on top of a store and a best-effort cache.
///
/// Holds no state of its own; uniqueness under concurrent creates is left to the
/// store's atomic insert.
#[derive(Clone, Debug)]
pub struct PasteService<S = AnyStore, C = AnyCache> {
    store: S,
    cache: FailSoftCache<C>,
    clock: Arc<dyn Clock>,
    settings: Arc<ServiceSettings>,
}

impl<S: PasteStore, C: Cache> PasteService<S, C> {
    pub fn new(store: S, cache: C, clock: Arc<dyn Clock>, settings: ServiceSettings) -> Self {
        PasteService {
            store,
            cache: FailSoftCache::new(cache),
            clock,
            settings: Arc::new(settings),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &C {
        self.cache.inner()
    }

    /// Public link for a code.
    pub fn url_for(&self, code: &str) -> String {
        format!("{}/{code}", self.settings.base_url.trim_end_matches('/'))
    }

    /// Create a paste, under `custom_code` if one is given and otherwise under a fresh
    /// random code. An empty custom code counts as none.
    pub async fn create(
        &self,
        content: &str,
        custom_code: Option<&str>,
    ) -> crate::PasteResult<CreatedPaste> {
        if content.is_empty() {
            return Err(PasteError::InvalidInput("content is required".into()));
        }

        let paste = match custom_code.filter(|code| !code.is_empty()) {
            Some(code) => self.create_custom(content, code).await?,
            None => self.create_random(content).await?,
        };

        info!(
            "new paste: code='{code}', custom={custom}, size={size}",
            code = paste.code,
            custom = paste.is_custom_code,
            size = paste.content.len()
        );

        // only reached once the insert has succeeded
        self.populate_cache(&paste.code, &paste.snapshot(), paste.expires_at)
            .await;

        Ok(CreatedPaste {
            url: self.url_for(&paste.code),
            code: paste.code,
            created_at: paste.created_at,
        })
    }

    /// Fetch a live paste, preferring the cache.
    pub async fn retrieve(&self, code: &str) -> crate::PasteResult<PasteSnapshot> {
        if let Some(snapshot) = self.cache.get(code).await {
            return Ok(snapshot);
        }

        let paste = self
            .store
            .find_by_code(code)
            .await
            .map_err(store_failure)?
            .ok_or(PasteError::NotFound)?;

        let snapshot = paste.snapshot();
        self.populate_cache(code, &snapshot, paste.expires_at).await;
        Ok(snapshot)
    }

    /// Fetch only the content of a live paste.
    pub async fn retrieve_raw(&self, code: &str) -> crate::PasteResult<String> {
        Ok(self.retrieve(code).await?.content)
    }

    /// Physically remove expired pastes from the store.
    pub async fn purge_expired(&self) -> crate::PasteResult<u64> {
        let count = self.store.purge_expired().await.map_err(store_failure)?;
        if count > 0 {
            info!("deleted {count} expired pastes");
        }
        Ok(count)
    }

    async fn create_custom(&self, content: &str, code: &str) -> crate::PasteResult<Paste> {
        if !is_valid_custom_code(code) {
            return Err(PasteError::InvalidInput(INVALID_CUSTOM_CODE.into()));
        }

        if self
            .store
            .find_by_code(code)
            .await
            .map_err(store_failure)?
            .is_some()
        {
            return Err(PasteError::Conflict);
        }

        // a concurrent create can still win between the lookup and the insert
        self.store
            .insert(&self.new_paste(code, content, true))
            .await
            .map_err(store_failure)
    }

    async fn create_random(&self, content: &str) -> crate::PasteResult<Paste> {
        for attempt in 1..=self.settings.max_generate_attempts {
            let code = generate_code(self.settings.code_length);
            match self.store.insert(&self.new_paste(&code, content, false)).await {
                Ok(paste) => return Ok(paste),
                Err(StoreError::DuplicateKey) => {
                    warn!("generated code collided: code='{code}', attempt={attempt}");
                }
                Err(err) => return Err(store_failure(err)),
            }
        }
        Err(PasteError::Conflict)
    }

    fn new_paste(&self, code: &str, content: &str, is_custom_code: bool) -> NewPaste {
        NewPaste {
            code: code.to_owned(),
            content: content.to_owned(),
            is_custom_code,
            created_at: self.clock.now(),
        }
    }

    /// Cache a snapshot for at most the configured TTL and never past the paste's expiry.
    async fn populate_cache(
        &self,
        code: &str,
        snapshot: &PasteSnapshot,
        expires_at: DateTime<Utc>,
    ) {
        let remaining = expires_at - self.clock.now();
        let ttl = remaining.min(self.settings.cache_ttl);
        self.cache.set(code, snapshot, ttl).await;
    }
}

fn store_failure(err: StoreError) -> PasteError {
    if !matches!(err, StoreError::DuplicateKey) {
        error!("paste store failure: {err:?}");
    }
    err.into()
}
