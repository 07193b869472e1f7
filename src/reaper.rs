use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::storage::{AnyStore, PasteStore};

/// Spawn a task that sweeps expired pastes out of `store` every `interval`.
///
/// Reads never depend on this task; it only reclaims space. Abort the returned handle
/// to stop it.
pub fn spawn_reaper(store: AnyStore, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("starting expiry sweep every {}s", interval.as_secs());

        let mut ticker = tokio::time::interval(interval);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => debug!("expiry sweep: nothing to remove"),
                Ok(count) => info!("expiry sweep: removed {count} pastes"),
                Err(err) => warn!("expiry sweep failed: {err}"),
            }
        }
    })
}
