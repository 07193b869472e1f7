use chrono::Duration;
use redis::aio::ConnectionManager;

use super::Cache;
use crate::error::CacheResult;
use crate::models::PasteSnapshot;

/// Cache backed by a Redis server. Snapshots are stored as JSON strings.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to a Redis server by URL. Fails if the server can't be reached now.
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(RedisCache { conn })
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

impl Cache for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<PasteSnapshot>> {
        let mut conn = self.conn.clone();
        let raw = redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await?;
        raw.as_deref().map(decode).transpose()
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &PasteSnapshot,
        ttl: Duration,
    ) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let millis = ttl.num_milliseconds().max(1);
        redis::cmd("SET")
            .arg(key)
            .arg(encode(value)?)
            .arg("PX")
            .arg(millis)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}

fn encode(value: &PasteSnapshot) -> CacheResult<String> {
    Ok(serde_json::to_string(value)?)
}

fn decode(raw: &str) -> CacheResult<PasteSnapshot> {
    Ok(serde_json::from_str(raw)?)
}
