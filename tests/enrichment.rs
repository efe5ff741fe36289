//! Enrichment state writes and the duplicate-metadata invariant

use catalogd::config::DatabaseConfig;
use catalogd::database::Database;
use catalogd::database::repositories::VodStreamRepository;
use catalogd::errors::ErrorKind;
use catalogd::models::MetadataBlock;

use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::json;
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

fn block(tmdb_id: i32) -> MetadataBlock {
    MetadataBlock {
        tmdb_id,
        title: Some("Dune".to_string()),
        overview: Some("Desert planet.".to_string()),
        release_date: NaiveDate::from_ymd_opt(2021, 9, 15),
        genres: vec!["Science Fiction".to_string()],
        vote_average: Some(7.8),
        poster_path: Some("/poster.jpg".to_string()),
        backdrop_path: None,
        raw: json!({"id": tmdb_id, "title": "Dune"}),
    }
}

#[tokio::test]
async fn apply_metadata_hydrates_and_clears_error_state() {
    let db = test_db().await;
    let vod = VodStreamRepository::new(db.connection());
    let provider_id = Uuid::new_v4();
    let item_id = insert_vod(&db, &provider_id, 1, "Dune (2021).mkv", "failed", None, 3).await;

    let now = Utc::now();
    VodStreamRepository::apply_metadata(&*db.connection(), &item_id, &provider_id, &block(438631), now)
        .await
        .unwrap();

    let rows = vod.find_all_by_ext(&provider_id, 1).await.unwrap();
    let row = &rows[0];
    assert_eq!(row.tmdb_status, "synced");
    assert_eq!(row.tmdb_id, Some(438631));
    assert_eq!(row.tmdb_title.as_deref(), Some("Dune"));
    assert_eq!(row.tmdb_fail_count, 0);
    assert!(row.tmdb_error.is_none());
    assert!(row.tmdb_error_kind.is_none());
    assert_eq!(row.tmdb_last_sync, Some(now));
    assert_eq!(row.tmdb_release_date, NaiveDate::from_ymd_opt(2021, 9, 15));
}

#[tokio::test]
async fn no_two_rows_share_a_metadata_id_after_hydration() {
    let db = test_db().await;
    let vod = VodStreamRepository::new(db.connection());
    let provider_id = Uuid::new_v4();

    // an already-synced row holds the metadata id
    insert_vod(&db, &provider_id, 1, "Dune", "synced", Some(438631), 0).await;
    // a second row resolves to the same id
    let item_id = insert_vod(&db, &provider_id, 2, "Dune (2021).mkv", "missing", None, 0).await;

    VodStreamRepository::apply_metadata(
        &*db.connection(),
        &item_id,
        &provider_id,
        &block(438631),
        Utc::now(),
    )
    .await
    .unwrap();

    // the synced duplicate wins; the unsynced item row is removed
    let with_id = vod.find_active_synced_by_tmdb_ids(&[438631]).await.unwrap();
    assert_eq!(with_id.len(), 1);
    assert_eq!(with_id[0].provider_stream_id, 1);
    assert!(vod.find_all_by_ext(&provider_id, 2).await.unwrap().is_empty());
}

#[tokio::test]
async fn unsynced_duplicate_is_deleted_in_favor_of_the_item() {
    let db = test_db().await;
    let vod = VodStreamRepository::new(db.connection());
    let provider_id = Uuid::new_v4();

    insert_vod(&db, &provider_id, 1, "Dune copy", "missing", Some(438631), 0).await;
    let item_id = insert_vod(&db, &provider_id, 2, "Dune (2021).mkv", "missing", None, 0).await;

    VodStreamRepository::apply_metadata(
        &*db.connection(),
        &item_id,
        &provider_id,
        &block(438631),
        Utc::now(),
    )
    .await
    .unwrap();

    assert!(vod.find_all_by_ext(&provider_id, 1).await.unwrap().is_empty());
    let kept = vod.find_all_by_ext(&provider_id, 2).await.unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].tmdb_status, "synced");
}

#[tokio::test]
async fn mark_failed_escalates_fail_count_and_records_kind() {
    let db = test_db().await;
    let vod = VodStreamRepository::new(db.connection());
    let provider_id = Uuid::new_v4();
    let item_id = insert_vod(&db, &provider_id, 1, "Obscurity", "missing", None, 0).await;

    let now = Utc::now();
    VodStreamRepository::mark_failed(
        &*db.connection(),
        &item_id,
        ErrorKind::Server,
        "HTTP 500 from upstream",
        now,
    )
    .await
    .unwrap();

    let rows = vod.find_all_by_ext(&provider_id, 1).await.unwrap();
    assert_eq!(rows[0].tmdb_status, "failed");
    assert_eq!(rows[0].tmdb_fail_count, 1);
    assert_eq!(rows[0].tmdb_error_kind.as_deref(), Some("server"));
    assert_eq!(rows[0].tmdb_last_sync, Some(now));

    VodStreamRepository::mark_failed(
        &*db.connection(),
        &item_id,
        ErrorKind::Server,
        "HTTP 500 from upstream",
        Utc::now(),
    )
    .await
    .unwrap();
    let rows = vod.find_all_by_ext(&provider_id, 1).await.unwrap();
    assert_eq!(rows[0].tmdb_fail_count, 2);
}

#[tokio::test]
async fn mark_missing_resets_fail_count() {
    let db = test_db().await;
    let vod = VodStreamRepository::new(db.connection());
    let provider_id = Uuid::new_v4();
    let item_id = insert_vod(&db, &provider_id, 1, "Nothing Found", "failed", None, 4).await;

    VodStreamRepository::mark_missing(&*db.connection(), &item_id, Utc::now())
        .await
        .unwrap();

    let rows = vod.find_all_by_ext(&provider_id, 1).await.unwrap();
    assert_eq!(rows[0].tmdb_status, "missing");
    assert_eq!(rows[0].tmdb_fail_count, 0);
    assert_eq!(rows[0].tmdb_error_kind.as_deref(), Some("not_found"));
}

#[tokio::test]
async fn candidates_order_never_synced_first() {
    let db = test_db().await;
    let vod = VodStreamRepository::new(db.connection());
    let provider_id = Uuid::new_v4();

    let old_sync = Utc::now() - chrono::Duration::days(3);
    let _synced = insert_vod_with_sync(&db, &provider_id, 1, "Synced", "synced", old_sync).await;
    let never = insert_vod(&db, &provider_id, 2, "Never", "missing", None, 0).await;

    let candidates = vod.candidates(10).await.unwrap();
    assert_eq!(candidates[0].id, never, "null last_sync sorts first");
}

async fn insert_vod(
    db: &Database,
    provider_id: &Uuid,
    ext_id: i32,
    name: &str,
    status: &str,
    tmdb_id: Option<i32>,
    fail_count: i32,
) -> Uuid {
    use catalogd::entities::vod_streams;
    let now = Utc::now();
    let id = Uuid::new_v4();
    let model = vod_streams::ActiveModel {
        id: Set(id),
        provider_id: Set(*provider_id),
        category_id: Set(None),
        provider_stream_id: Set(ext_id),
        name: Set(name.to_string()),
        normalized_name: Set(None),
        stream_icon: Set(None),
        custom_poster_url: Set(None),
        container_extension: Set(None),
        rating: Set(None),
        added: Set(None),
        approved: Set(false),
        is_active: Set(true),
        tmdb_id: Set(tmdb_id),
        tmdb_status: Set(status.to_string()),
        tmdb_last_sync: Set(None),
        tmdb_error: Set(None),
        tmdb_error_kind: Set(None),
        tmdb_fail_count: Set(fail_count),
        tmdb_title: Set(None),
        tmdb_overview: Set(None),
        tmdb_release_date: Set(None),
        tmdb_genres: Set(None),
        tmdb_vote_average: Set(None),
        tmdb_poster_path: Set(None),
        tmdb_backdrop_path: Set(None),
        tmdb_raw: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    model.insert(&*db.connection()).await.expect("insert vod row");
    id
}

async fn insert_vod_with_sync(
    db: &Database,
    provider_id: &Uuid,
    ext_id: i32,
    name: &str,
    status: &str,
    last_sync: chrono::DateTime<Utc>,
) -> Uuid {
    use catalogd::entities::vod_streams;
    let now = Utc::now();
    let id = Uuid::new_v4();
    let model = vod_streams::ActiveModel {
        id: Set(id),
        provider_id: Set(*provider_id),
        category_id: Set(None),
        provider_stream_id: Set(ext_id),
        name: Set(name.to_string()),
        normalized_name: Set(None),
        stream_icon: Set(None),
        custom_poster_url: Set(None),
        container_extension: Set(None),
        rating: Set(None),
        added: Set(None),
        approved: Set(false),
        is_active: Set(true),
        tmdb_id: Set(Some(1000 + ext_id)),
        tmdb_status: Set(status.to_string()),
        tmdb_last_sync: Set(Some(last_sync)),
        tmdb_error: Set(None),
        tmdb_error_kind: Set(None),
        tmdb_fail_count: Set(0),
        tmdb_title: Set(None),
        tmdb_overview: Set(None),
        tmdb_release_date: Set(None),
        tmdb_genres: Set(None),
        tmdb_vote_average: Set(None),
        tmdb_poster_path: Set(None),
        tmdb_backdrop_path: Set(None),
        tmdb_raw: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    model.insert(&*db.connection()).await.expect("insert vod row");
    id
}
