//! Paste lifecycle against the SQL store, with and without a cache.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use easypaste::cache::memory::MemoryCache;
use easypaste::cache::AnyCache;
use easypaste::clock::{Clock, ManualClock};
use easypaste::controllers::paste::{PasteService, ServiceSettings};
use easypaste::storage::memory::MemoryStore;
use easypaste::storage::sql::SqlStore;
use easypaste::storage::AnyStore;
use easypaste::PasteError;
use futures_util::future::join_all;
use proptest::prelude::*;

// == Helpers ==

fn start_clock() -> ManualClock {
    ManualClock::new(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap())
}

async fn sql_service(cache_enabled: bool) -> (PasteService, ManualClock, SqlStore) {
    let clock = start_clock();
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let store = SqlStore::connect("sqlite::memory:", shared.clone(), Duration::hours(24))
        .await
        .unwrap();
    store.migrate().await.unwrap();

    let cache = if cache_enabled {
        MemoryCache::new(shared.clone()).into()
    } else {
        AnyCache::Disabled
    };
    let service = PasteService::new(
        AnyStore::from(store.clone()),
        cache,
        shared,
        ServiceSettings::default(),
    );
    (service, clock, store)
}

/// SQLite in a temp file, so the pool holds several connections that really run in parallel.
async fn file_sql_service(dir: &tempfile::TempDir) -> (PasteService, ManualClock) {
    let clock = start_clock();
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("pastes.db").display());
    let store = SqlStore::connect(&url, shared.clone(), Duration::hours(24))
        .await
        .unwrap();
    store.migrate().await.unwrap();

    let service = PasteService::new(
        store.into(),
        AnyCache::Disabled,
        shared,
        ServiceSettings::default(),
    );
    (service, clock)
}

async fn race_on_code(service: &PasteService, code: &str) -> Vec<Result<String, PasteError>> {
    let attempts = (0..16).map(|i| {
        let service = service.clone();
        async move {
            service
                .create(&format!("attempt {i}"), Some(code))
                .await
                .map(|created| created.code)
        }
    });
    join_all(attempts).await
}

fn assert_single_winner(results: &[Result<String, PasteError>]) {
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|err| matches!(err, PasteError::Conflict)));
}

fn memory_service() -> PasteService {
    let clock: Arc<dyn Clock> = Arc::new(start_clock());
    let store = MemoryStore::new(clock.clone(), Duration::hours(24));
    PasteService::new(
        store.into(),
        MemoryCache::new(clock.clone()).into(),
        clock,
        ServiceSettings::default(),
    )
}

// == Lifecycle ==

#[tokio::test]
async fn round_trip_through_sql_store() {
    for cache_enabled in [true, false] {
        let (service, _, _) = sql_service(cache_enabled).await;
        let created = service.create("SELECT 1;", None).await.unwrap();
        assert_eq!(created.code.len(), 8);

        // first read may come from the cache, the second one certainly does when enabled
        for _ in 0..2 {
            let snapshot = service.retrieve(&created.code).await.unwrap();
            assert_eq!(snapshot.content, "SELECT 1;");
            assert_eq!(snapshot.created_at, created.created_at);
        }
    }
}

#[tokio::test]
async fn custom_code_conflicts_on_second_create() {
    let (service, _, _) = sql_service(true).await;
    let first = service.create("one", Some("mycode")).await.unwrap();
    assert_eq!(first.code, "mycode");

    let err = service.create("two", Some("mycode")).await.unwrap_err();
    assert!(matches!(err, PasteError::Conflict));
}

#[tokio::test]
async fn expired_paste_is_not_found() {
    for cache_enabled in [true, false] {
        let (service, clock, _) = sql_service(cache_enabled).await;
        let created = service.create("temporary", Some("tempcode")).await.unwrap();

        clock.advance(Duration::hours(24) - Duration::milliseconds(1));
        assert_eq!(
            service.retrieve(&created.code).await.unwrap().content,
            "temporary"
        );

        clock.advance(Duration::milliseconds(2));
        let err = service.retrieve(&created.code).await.unwrap_err();
        assert!(matches!(err, PasteError::NotFound));

        // the code is free again once the old paste has expired
        service.create("reborn", Some("tempcode")).await.unwrap();
        assert_eq!(service.retrieve("tempcode").await.unwrap().content, "reborn");
    }
}

#[tokio::test]
async fn purge_then_lookup() {
    let (service, clock, _) = sql_service(false).await;
    service.create("a", None).await.unwrap();
    service.create("b", None).await.unwrap();

    clock.advance(Duration::hours(25));
    assert_eq!(service.purge_expired().await.unwrap(), 2);
    assert_eq!(service.purge_expired().await.unwrap(), 0);
}

// == Concurrency ==

#[tokio::test]
async fn concurrent_creates_with_same_code_have_one_winner() {
    let (sql, _, _) = sql_service(true).await;
    let memory = memory_service();

    for service in [sql, memory] {
        assert_single_winner(&race_on_code(&service, "racecode").await);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pooled_sqlite_creates_with_same_code_have_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _) = file_sql_service(&dir).await;

    let results = race_on_code(&service, "pooledcode").await;
    assert_single_winner(&results);

    let winner = results.iter().find_map(|r| r.as_ref().ok()).unwrap();
    assert_eq!(winner, "pooledcode");
    assert!(service
        .retrieve("pooledcode")
        .await
        .unwrap()
        .content
        .starts_with("attempt "));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pooled_sqlite_replaces_expired_row_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let (service, clock) = file_sql_service(&dir).await;

    service.create("stale", Some("reusedcode")).await.unwrap();
    clock.advance(Duration::hours(25));

    let results = race_on_code(&service, "reusedcode").await;
    assert_single_winner(&results);
    assert_ne!(service.retrieve("reusedcode").await.unwrap().content, "stale");
}

#[tokio::test]
async fn concurrent_random_creates_all_succeed() {
    let service = memory_service();
    let results = join_all((0..32).map(|i| {
        let service = service.clone();
        async move { service.create(&format!("paste {i}"), None).await }
    }))
    .await;

    let mut codes: Vec<_> = results.into_iter().map(|r| r.unwrap().code).collect();
    codes.sort();
    codes.dedup();
    assert_eq!(codes.len(), 32);
}

// == Store failures ==

#[tokio::test]
async fn unreachable_store_is_unavailable() {
    let (service, _, store) = sql_service(true).await;
    let created = service.create("before", Some("cachedcode")).await.unwrap();
    store.close().await;

    let err = service.create("after", None).await.unwrap_err();
    assert!(matches!(err, PasteError::Unavailable { .. }));

    let err = service.create("after", Some("othercode")).await.unwrap_err();
    assert!(matches!(err, PasteError::Unavailable { .. }));

    let err = service.retrieve("uncached").await.unwrap_err();
    assert!(matches!(err, PasteError::Unavailable { .. }));

    // reads that hit the cache keep working
    assert_eq!(
        service.retrieve(&created.code).await.unwrap().content,
        "before"
    );
}

// == Properties ==

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn any_content_round_trips(content in "\\PC{1,200}") {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let service = memory_service();
        let retrieved = runtime.block_on(async {
            let created = service.create(&content, None).await.unwrap();
            service.retrieve(&created.code).await.unwrap()
        });
        prop_assert_eq!(retrieved.content, content);
    }
}
