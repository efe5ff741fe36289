//! Collection cache engine: stale-while-revalidate and payload augmentation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use catalogd::config::DatabaseConfig;
use catalogd::database::Database;
use catalogd::database::repositories::{CollectionRepository, ProviderRepository};
use catalogd::entities::collections;
use catalogd::errors::{ErrorKind, FetchError};
use catalogd::ingestor::CollectionCacheEngine;
use catalogd::ingestor::collections::BrowsePayloadSource;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{Value, json};
use uuid::Uuid;

async fn test_db() -> Database {
    let db = Database::new(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: Some(1),
    })
    .await
    .expect("in-memory database");
    db.migrate().await.expect("migrations");
    db
}

/// Stubbed payload source: counts fetches, can be switched to fail.
struct StubSource {
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl StubSource {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl BrowsePayloadSource for StubSource {
    async fn fetch(&self, _collection: &collections::Model, page: u32) -> Result<Value, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail.load(Ordering::SeqCst) {
            return Err(FetchError::new(ErrorKind::Server, "upstream down"));
        }
        Ok(json!({
            "page": page,
            "fetch_seq": call,
            "results": [{"id": 42, "title": "Dune"}, {"id": 99, "title": "Unavailable"}]
        }))
    }
}

async fn engine_with_stub(db: &Database, stub: Arc<StubSource>) -> Arc<CollectionCacheEngine> {
    Arc::new(CollectionCacheEngine::with_payload_source(db, stub))
}

#[tokio::test]
async fn stale_while_revalidate_serves_stale_and_refreshes() {
    let db = test_db().await;
    let collections_repo = CollectionRepository::new(db.connection());
    let stub = StubSource::new();
    let engine = engine_with_stub(&db, stub.clone()).await;

    let collection = collections_repo
        .create("Trending", "trending-today", "trending", None, None, Some(1), 0)
        .await
        .unwrap();

    // cold cache: upstream hit
    let served = engine.items("trending-today", 1, false).await.unwrap();
    assert!(!served.cached);
    assert!(!served.stale);
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);

    // warm: served from cache, no upstream traffic
    let served = engine.items("trending-today", 1, false).await.unwrap();
    assert!(served.cached);
    assert!(!served.stale);
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);

    // expire the 1s TTL
    tokio::time::sleep(Duration::from_millis(1200)).await;

    // opt-in: stale payload returns immediately, refresh runs in background
    let served = engine.items("trending-today", 1, true).await.unwrap();
    assert!(served.cached);
    assert!(served.stale);

    // wait for the background refresh to land
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(stub.calls.load(Ordering::SeqCst), 2);

    let served = engine.items("trending-today", 1, false).await.unwrap();
    assert!(served.cached);
    assert!(!served.stale);

    let cache = collections_repo
        .get_cache(&collection.id, 1)
        .await
        .unwrap()
        .unwrap();
    assert!(cache.expires_at > Utc::now());
    // invariant: expires_at tracks updated_at + ttl
    assert_eq!(cache.expires_at, cache.updated_at + chrono::Duration::seconds(1));
}

#[tokio::test]
async fn expired_without_opt_in_refreshes_inline() {
    let db = test_db().await;
    let collections_repo = CollectionRepository::new(db.connection());
    let stub = StubSource::new();
    let engine = engine_with_stub(&db, stub.clone()).await;

    collections_repo
        .create("Trending", "row", "trending", None, None, Some(1), 0)
        .await
        .unwrap();

    engine.items("row", 1, false).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1200)).await;

    let served = engine.items("row", 1, false).await.unwrap();
    assert!(!served.cached, "expired entry without SWR refetches inline");
    assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn upstream_failure_degrades_to_empty_payload() {
    let db = test_db().await;
    let collections_repo = CollectionRepository::new(db.connection());
    let stub = StubSource::new();
    let engine = engine_with_stub(&db, stub.clone()).await;

    collections_repo
        .create("Trending", "row", "trending", None, None, None, 0)
        .await
        .unwrap();
    stub.fail.store(true, Ordering::SeqCst);

    let served = engine.items("row", 1, false).await.unwrap();
    assert!(!served.cached);
    assert_eq!(served.payload, json!({}));
    assert!(served.expires_at.is_none());
    assert_eq!(engine.metrics().tmdb_errors, 1);
}

#[tokio::test]
async fn payload_items_join_against_local_catalog() {
    let db = test_db().await;
    let collections_repo = CollectionRepository::new(db.connection());
    let providers = ProviderRepository::new(db.connection());
    let stub = StubSource::new();
    let engine = engine_with_stub(&db, stub.clone()).await;

    let provider = providers
        .create("acme", "http://panel.acme.tv", "user", "pass")
        .await
        .unwrap();
    insert_synced_vod(&db, &provider.id, 42, 7001).await;

    collections_repo
        .create("Trending", "row", "trending", None, None, None, 0)
        .await
        .unwrap();

    let served = engine.items("row", 1, false).await.unwrap();
    let results = served.payload["results"].as_array().unwrap();
    // the item without a local counterpart is omitted
    assert_eq!(results.len(), 1);
    let item = &results[0];
    assert_eq!(item["id"], 42);
    assert_eq!(
        item["stream_url"],
        "http://panel.acme.tv/movie/user/pass/7001.mkv"
    );
    assert_eq!(item["tmdb_cast"][0], "Timothee Chalamet");
    assert_eq!(item["tmdb_original_language"], "en");
}

#[tokio::test]
async fn sweep_refreshes_expired_entries_of_enabled_collections() {
    let db = test_db().await;
    let collections_repo = CollectionRepository::new(db.connection());
    let stub = StubSource::new();
    let engine = engine_with_stub(&db, stub.clone()).await;

    collections_repo
        .create("Trending", "row", "trending", None, None, Some(1), 0)
        .await
        .unwrap();
    engine.items("row", 1, false).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1200)).await;

    let (refreshed, failed) = engine.refresh_expired().await.unwrap();
    assert_eq!((refreshed, failed), (1, 0));
    assert_eq!(stub.calls.load(Ordering::SeqCst), 2);

    // nothing expired anymore
    let (refreshed, _) = engine.refresh_expired().await.unwrap();
    assert_eq!(refreshed, 0);
}

async fn insert_synced_vod(db: &Database, provider_id: &Uuid, tmdb_id: i32, ext_id: i32) {
    use catalogd::entities::vod_streams;
    let now = Utc::now();
    let model = vod_streams::ActiveModel {
        id: Set(Uuid::new_v4()),
        provider_id: Set(*provider_id),
        category_id: Set(None),
        provider_stream_id: Set(ext_id),
        name: Set("Dune (2021).mkv".to_string()),
        normalized_name: Set(None),
        stream_icon: Set(None),
        custom_poster_url: Set(None),
        container_extension: Set(Some("mkv".to_string())),
        rating: Set(None),
        added: Set(None),
        approved: Set(true),
        is_active: Set(true),
        tmdb_id: Set(Some(tmdb_id)),
        tmdb_status: Set("synced".to_string()),
        tmdb_last_sync: Set(Some(now)),
        tmdb_error: Set(None),
        tmdb_error_kind: Set(None),
        tmdb_fail_count: Set(0),
        tmdb_title: Set(Some("Dune".to_string())),
        tmdb_overview: Set(Some("Desert planet.".to_string())),
        tmdb_release_date: Set(None),
        tmdb_genres: Set(None),
        tmdb_vote_average: Set(Some(7.8)),
        tmdb_poster_path: Set(None),
        tmdb_backdrop_path: Set(None),
        tmdb_raw: Set(Some(json!({
            "original_language": "en",
            "credits": {"cast": [{"name": "Timothee Chalamet"}, {"name": "Zendaya"}]}
        }))),
        created_at: Set(now),
        updated_at: Set(now),
    };
    model.insert(&*db.connection()).await.expect("insert vod row");
}
