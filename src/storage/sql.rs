use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, FromRow};

use super::PasteStore;
use crate::clock::Clock;
use crate::error::{StoreError, StoreResult};
use crate::models::{NewPaste, Paste};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS paste (
        code TEXT PRIMARY KEY NOT NULL,
        content TEXT NOT NULL,
        is_custom_code BOOLEAN NOT NULL,
        created_at BIGINT NOT NULL,
        expires_at BIGINT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS paste_expires_at ON paste (expires_at)",
];

/// Store backed by a SQL database through an sqlx `Any` pool.
///
/// Timestamps are kept as unix milliseconds so that the same schema and queries work on
/// every supported backend.
#[derive(Clone, Debug)]
pub struct SqlStore {
    pool: AnyPool,
    clock: Arc<dyn Clock>,
    retention: Duration,
}

#[derive(FromRow)]
struct PasteRow {
    code: String,
    content: String,
    is_custom_code: bool,
    created_at: i64,
    expires_at: i64,
}

impl SqlStore {
    /// Connect to a database by URL.
    pub async fn connect(
        url: &str,
        clock: Arc<dyn Clock>,
        retention: Duration,
    ) -> StoreResult<Self> {
        let mut options = AnyPoolOptions::new();
        if url.contains(":memory:") {
            // every connection to an in-memory sqlite database gets its own database
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        Ok(Self {
            pool: options.connect(url).await?,
            clock,
            retention,
        })
    }

    /// Create the table and index if they don't exist yet.
    pub async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Close the underlying pool. Every later call fails.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl PasteStore for SqlStore {
    async fn find_by_code(&self, code: &str) -> StoreResult<Option<Paste>> {
        let now = self.clock.now().timestamp_millis();
        let row = sqlx::query_as::<_, PasteRow>(
            "SELECT code, content, is_custom_code, created_at, expires_at FROM paste \
             WHERE code = $1 AND expires_at > $2",
        )
        .bind(code)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Paste::try_from).transpose()
    }

    async fn insert(&self, paste: &NewPaste) -> StoreResult<Paste> {
        let created_at = paste.created_at.timestamp_millis();
        let expires_at = (paste.created_at + self.retention).timestamp_millis();
        let now = self.clock.now().timestamp_millis();

        // an expired row that hasn't been swept yet is replaced, a live one is left alone
        let row = sqlx::query_as::<_, PasteRow>(
            "INSERT INTO paste (code, content, is_custom_code, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (code) DO UPDATE SET \
                content = excluded.content, \
                is_custom_code = excluded.is_custom_code, \
                created_at = excluded.created_at, \
                expires_at = excluded.expires_at \
             WHERE paste.expires_at <= $6 \
             RETURNING code, content, is_custom_code, created_at, expires_at",
        )
        .bind(paste.code.as_str())
        .bind(paste.content.as_str())
        .bind(paste.is_custom_code)
        .bind(created_at)
        .bind(expires_at)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Paste::try_from(row),
            None => Err(StoreError::DuplicateKey),
        }
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        let now = self.clock.now().timestamp_millis();
        let result = sqlx::query("DELETE FROM paste WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

impl TryFrom<PasteRow> for Paste {
    type Error = StoreError;

    fn try_from(row: PasteRow) -> StoreResult<Self> {
        Ok(Paste {
            created_at: from_millis(row.created_at)?,
            expires_at: from_millis(row.expires_at)?,
            code: row.code,
            content: row.content,
            is_custom_code: row.is_custom_code,
        })
    }
}

fn from_millis(millis: i64) -> StoreResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {millis}")))
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    async fn store() -> (SqlStore, ManualClock) {
        let clock = ManualClock::new(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap());
        let store = SqlStore::connect(
            "sqlite::memory:",
            Arc::new(clock.clone()),
            Duration::hours(24),
        )
        .await
        .unwrap();
        store.migrate().await.unwrap();
        (store, clock)
    }

    fn new_paste(code: &str, content: &str, clock: &ManualClock) -> NewPaste {
        NewPaste {
            code: code.to_owned(),
            content: content.to_owned(),
            is_custom_code: false,
            created_at: clock.now(),
        }
    }

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let (store, _) = store().await;
        store.migrate().await.unwrap();
    }

    #[tokio::test]
    async fn insert_then_find() {
        let (store, clock) = store().await;
        let inserted = store
            .insert(&new_paste("abcdefgh", "fn main() {}", &clock))
            .await
            .unwrap();
        assert_eq!(inserted.code, "abcdefgh");
        assert_eq!(inserted.created_at, clock.now());
        assert_eq!(inserted.expires_at, clock.now() + Duration::hours(24));

        let found = store.find_by_code("abcdefgh").await.unwrap().unwrap();
        assert_eq!(found, inserted);
        assert!(!found.is_custom_code);
    }

    #[tokio::test]
    async fn missing_code_is_none() {
        let (store, _) = store().await;
        assert!(store.find_by_code("nothing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_live_code_is_rejected() {
        let (store, clock) = store().await;
        store
            .insert(&new_paste("mycode", "first", &clock))
            .await
            .unwrap();
        let err = store
            .insert(&new_paste("mycode", "second", &clock))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey));

        let found = store.find_by_code("mycode").await.unwrap().unwrap();
        assert_eq!(found.content, "first");
    }

    #[tokio::test]
    async fn expiry_is_enforced_on_read() {
        let (store, clock) = store().await;
        store
            .insert(&new_paste("expiring", "bye", &clock))
            .await
            .unwrap();

        clock.advance(Duration::hours(24) - Duration::seconds(1));
        assert!(store.find_by_code("expiring").await.unwrap().is_some());

        clock.advance(Duration::seconds(2));
        assert!(store.find_by_code("expiring").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_row_is_replaced_on_insert() {
        let (store, clock) = store().await;
        store
            .insert(&new_paste("recycle", "old", &clock))
            .await
            .unwrap();
        clock.advance(Duration::hours(25));

        let inserted = store
            .insert(&new_paste("recycle", "new", &clock))
            .await
            .unwrap();
        assert_eq!(inserted.content, "new");
        assert_eq!(inserted.created_at, clock.now());
    }

    #[tokio::test]
    async fn purge_deletes_expired_rows() {
        let (store, clock) = store().await;
        store.insert(&new_paste("first", "1", &clock)).await.unwrap();
        clock.advance(Duration::hours(20));
        store.insert(&new_paste("second", "2", &clock)).await.unwrap();
        clock.advance(Duration::hours(5));

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.purge_expired().await.unwrap(), 0);
        assert!(store.find_by_code("second").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn closed_pool_reports_database_error() {
        let (store, _) = store().await;
        store.close().await;
        let err = store.find_by_code("anything").await.unwrap_err();
        assert!(matches!(err, StoreError::Database { .. }));
    }
}
