use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use tracing::{info, warn};

pub mod cache;
pub mod clock;
pub mod codes;
pub mod commands;
pub mod config;
pub mod controllers;
pub mod error;
pub mod models;
pub mod reaper;
pub mod storage;
pub mod types;

pub use error::{PasteError, PasteResult};

use cache::memory::MemoryCache;
use cache::redis::RedisCache;
use cache::AnyCache;
use clock::{Clock, SystemClock};
use config::{CacheKind, Config};
use controllers::paste::{PasteService, ServiceSettings};
use storage::sql::SqlStore;
use storage::AnyStore;

/// Everything a running instance needs, wired up from the config.
#[derive(Clone, FromRef)]
pub struct App {
    pub config: Arc<Config>,
    pub service: PasteService,
}

impl App {
    /// Connect to the store and cache described by `config`.
    ///
    /// A store that cannot be reached is fatal. A cache that cannot be reached is
    /// logged and replaced with [`AnyCache::Disabled`].
    pub async fn connect(config: Config) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let retention = config.limits.retention();

        let store = SqlStore::connect(&config.database.url, clock.clone(), retention)
            .await
            .context("failed to connect to database")?;
        store
            .migrate()
            .await
            .context("failed to prepare database schema")?;
        info!("connected to database");

        let cache = match config.cache.kind {
            CacheKind::Disabled => AnyCache::Disabled,
            CacheKind::Memory => MemoryCache::new(clock.clone()).into(),
            CacheKind::Redis => {
                // validated at load time
                let url = config.cache.redis_url.as_deref().unwrap_or_default();
                match RedisCache::connect(url).await {
                    Ok(cache) => {
                        info!("connected to redis");
                        cache.into()
                    }
                    Err(err) => {
                        warn!("redis unavailable, continuing without cache: {err}");
                        AnyCache::Disabled
                    }
                }
            }
        };

        Ok(Self::with_parts(config, store.into(), cache, clock))
    }

    /// Assemble an app from already-constructed collaborators.
    pub fn with_parts(
        config: Config,
        store: AnyStore,
        cache: AnyCache,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let settings = ServiceSettings::from_config(&config);
        App {
            config: Arc::new(config),
            service: PasteService::new(store, cache, clock, settings),
        }
    }
}
