//! Catalog synchronizer behavior against an in-memory store

use catalogd::config::DatabaseConfig;
use catalogd::database::Database;
use catalogd::database::repositories::{
    CategoryRepository, ProviderRepository, ProviderUserRepository, VodStreamRepository,
};
use catalogd::ingestor::CatalogSynchronizer;
use catalogd::models::{CategoryKind, TmdbStatus, VodUpsert};

use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
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

fn vod_row(ext_id: i32, name: &str) -> VodUpsert {
    VodUpsert {
        ext_id,
        name: name.to_string(),
        icon: None,
        container_extension: Some("mkv".to_string()),
        rating: None,
        added: None,
        tmdb_id: None,
    }
}

#[tokio::test]
async fn category_set_converges_on_upstream() {
    let db = test_db().await;
    let providers = ProviderRepository::new(db.connection());
    let categories = CategoryRepository::new(db.connection());
    let sync = CatalogSynchronizer::new(&db);

    let provider = providers
        .create("acme", "http://panel.acme.tv", "user", "pass")
        .await
        .unwrap();

    sync.apply_category_set(
        &provider.id,
        CategoryKind::Vod,
        &[(1, "Movies".to_string()), (2, "Kids".to_string())],
    )
    .await
    .unwrap();

    // next tick: category 1 renamed, category 2 gone
    sync.apply_category_set(&provider.id, CategoryKind::Vod, &[(1, "Films".to_string())])
        .await
        .unwrap();

    let all = categories
        .list(&provider.id, CategoryKind::Vod, true)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let films = all.iter().find(|c| c.provider_category_id == 1).unwrap();
    assert_eq!(films.name, "Films");
    assert!(films.is_active);

    let kids = all.iter().find(|c| c.provider_category_id == 2).unwrap();
    assert!(!kids.is_active);
}

#[tokio::test]
async fn vod_sync_is_idempotent() {
    let db = test_db().await;
    let providers = ProviderRepository::new(db.connection());
    let categories = CategoryRepository::new(db.connection());
    let sync = CatalogSynchronizer::new(&db);

    let provider = providers
        .create("acme", "http://panel.acme.tv", "user", "pass")
        .await
        .unwrap();
    categories
        .upsert_active(&provider.id, CategoryKind::Vod, 1, "Movies")
        .await
        .unwrap();
    let cat = categories
        .find_by_ext(&provider.id, CategoryKind::Vod, 1)
        .await
        .unwrap()
        .unwrap();

    let listing = vec![vod_row(7, "Dune (2021).mkv"), vod_row(8, "Heat 1995")];
    let first = sync
        .apply_vod_rows(&provider.id, &cat, &listing, false)
        .await
        .unwrap();
    assert_eq!(first, 2);

    // identical upstream response: zero diffs on the second run
    let second = sync
        .apply_vod_rows(&provider.id, &cat, &listing, false)
        .await
        .unwrap();
    assert_eq!(second, 0);
}

#[tokio::test]
async fn absent_vod_rows_stay_active_unless_requested() {
    let db = test_db().await;
    let providers = ProviderRepository::new(db.connection());
    let categories = CategoryRepository::new(db.connection());
    let vod = VodStreamRepository::new(db.connection());
    let sync = CatalogSynchronizer::new(&db);

    let provider = providers
        .create("acme", "http://panel.acme.tv", "user", "pass")
        .await
        .unwrap();
    categories
        .upsert_active(&provider.id, CategoryKind::Vod, 1, "Movies")
        .await
        .unwrap();
    let cat = categories
        .find_by_ext(&provider.id, CategoryKind::Vod, 1)
        .await
        .unwrap()
        .unwrap();

    sync.apply_vod_rows(
        &provider.id,
        &cat,
        &[vod_row(7, "Dune"), vod_row(8, "Heat")],
        false,
    )
    .await
    .unwrap();

    // default: a partial page leaves absent rows active
    sync.apply_vod_rows(&provider.id, &cat, &[vod_row(7, "Dune")], false)
        .await
        .unwrap();
    let heat = vod.find_all_by_ext(&provider.id, 8).await.unwrap();
    assert!(heat[0].is_active);

    // explicit opt-in deactivates
    sync.apply_vod_rows(&provider.id, &cat, &[vod_row(7, "Dune")], true)
        .await
        .unwrap();
    let heat = vod.find_all_by_ext(&provider.id, 8).await.unwrap();
    assert!(!heat[0].is_active);
}

#[tokio::test]
async fn duplicate_rows_collapse_with_metadata_donation() {
    let db = test_db().await;
    let providers = ProviderRepository::new(db.connection());
    let categories = CategoryRepository::new(db.connection());
    let vod = VodStreamRepository::new(db.connection());
    let sync = CatalogSynchronizer::new(&db);

    let provider = providers
        .create("acme", "http://panel.acme.tv", "user", "pass")
        .await
        .unwrap();
    categories
        .upsert_active(&provider.id, CategoryKind::Vod, 1, "Movies")
        .await
        .unwrap();
    let cat = categories
        .find_by_ext(&provider.id, CategoryKind::Vod, 1)
        .await
        .unwrap()
        .unwrap();

    // two historical rows share ext_id=7: an old synced one and a fresher
    // unsynced one
    let old = Utc::now() - chrono::Duration::days(2);
    insert_raw_vod(&db, &provider.id, &cat.id, 7, "Dune old", old, TmdbStatus::Synced, Some(42)).await;
    let fresh = Utc::now() - chrono::Duration::hours(1);
    insert_raw_vod(&db, &provider.id, &cat.id, 7, "Dune", fresh, TmdbStatus::Missing, None).await;

    sync.apply_vod_rows(&provider.id, &cat, &[vod_row(7, "Dune")], false)
        .await
        .unwrap();

    let remaining = vod.find_all_by_ext(&provider.id, 7).await.unwrap();
    assert_eq!(remaining.len(), 1, "duplicates must collapse to one row");
    let winner = &remaining[0];
    assert_eq!(winner.tmdb_status, "synced", "loser donates its metadata block");
    assert_eq!(winner.tmdb_id, Some(42));
}

#[tokio::test]
async fn ext_id_change_is_repaired_via_tmdb_id() {
    let db = test_db().await;
    let providers = ProviderRepository::new(db.connection());
    let categories = CategoryRepository::new(db.connection());
    let vod = VodStreamRepository::new(db.connection());
    let sync = CatalogSynchronizer::new(&db);

    let provider = providers
        .create("acme", "http://panel.acme.tv", "user", "pass")
        .await
        .unwrap();
    categories
        .upsert_active(&provider.id, CategoryKind::Vod, 1, "Movies")
        .await
        .unwrap();
    let cat = categories
        .find_by_ext(&provider.id, CategoryKind::Vod, 1)
        .await
        .unwrap()
        .unwrap();

    insert_raw_vod(
        &db,
        &provider.id,
        &cat.id,
        10,
        "Dune",
        Utc::now(),
        TmdbStatus::Synced,
        Some(438631),
    )
    .await;

    // upstream renumbered the stream but passes the same metadata id
    let row = VodUpsert {
        tmdb_id: Some(438631),
        ..vod_row(11, "Dune")
    };
    sync.apply_vod_rows(&provider.id, &cat, &[row], false)
        .await
        .unwrap();

    assert!(vod.find_all_by_ext(&provider.id, 10).await.unwrap().is_empty());
    let repaired = vod.find_all_by_ext(&provider.id, 11).await.unwrap();
    assert_eq!(repaired.len(), 1);
    assert_eq!(repaired[0].tmdb_id, Some(438631));
    assert_eq!(repaired[0].tmdb_status, "synced");
}

#[tokio::test]
async fn sync_credentials_prefer_enabled_admin_user() {
    let db = test_db().await;
    let providers = ProviderRepository::new(db.connection());
    let users = ProviderUserRepository::new(db.connection());

    let provider = providers
        .create("acme", "http://panel.acme.tv", "legacy-user", "legacy-pass")
        .await
        .unwrap();

    let (username, _) = users.sync_credentials(&provider).await.unwrap();
    assert_eq!(username, "legacy-user");

    users
        .create(&provider.id, "ADMIN", "admin-user", "admin-pass", None)
        .await
        .unwrap();
    let (username, password) = users.sync_credentials(&provider).await.unwrap();
    assert_eq!(username, "admin-user");
    assert_eq!(password, "admin-pass");
}

#[tokio::test]
async fn provider_user_codes_are_six_alphanumerics() {
    let db = test_db().await;
    let providers = ProviderRepository::new(db.connection());
    let users = ProviderUserRepository::new(db.connection());

    let provider = providers
        .create("acme", "http://panel.acme.tv", "user", "pass")
        .await
        .unwrap();
    let created = users
        .create(&provider.id, "living-room", "u1", "p1", Some(2))
        .await
        .unwrap();
    assert_eq!(created.unique_code.len(), 6);
    assert!(created.unique_code.chars().all(|c| c.is_ascii_alphanumeric()));

    let found = users.find_by_code(&created.unique_code).await.unwrap().unwrap();
    assert_eq!(found.id, created.id);
}

#[allow(clippy::too_many_arguments)]
async fn insert_raw_vod(
    db: &Database,
    provider_id: &Uuid,
    category_id: &Uuid,
    ext_id: i32,
    name: &str,
    updated_at: chrono::DateTime<Utc>,
    status: TmdbStatus,
    tmdb_id: Option<i32>,
) {
    use catalogd::entities::vod_streams;
    let model = vod_streams::ActiveModel {
        id: Set(Uuid::new_v4()),
        provider_id: Set(*provider_id),
        category_id: Set(Some(*category_id)),
        provider_stream_id: Set(ext_id),
        name: Set(name.to_string()),
        normalized_name: Set(None),
        stream_icon: Set(None),
        custom_poster_url: Set(None),
        container_extension: Set(Some("mkv".to_string())),
        rating: Set(None),
        added: Set(None),
        approved: Set(false),
        is_active: Set(true),
        tmdb_id: Set(tmdb_id),
        tmdb_status: Set(status.to_string()),
        tmdb_last_sync: Set(Some(updated_at)),
        tmdb_error: Set(None),
        tmdb_error_kind: Set(None),
        tmdb_fail_count: Set(0),
        tmdb_title: Set(Some(name.to_string())),
        tmdb_overview: Set(Some("overview".to_string())),
        tmdb_release_date: Set(None),
        tmdb_genres: Set(None),
        tmdb_vote_average: Set(Some(7.5)),
        tmdb_poster_path: Set(None),
        tmdb_backdrop_path: Set(None),
        tmdb_raw: Set(None),
        created_at: Set(updated_at),
        updated_at: Set(updated_at),
    };
    model.insert(&*db.connection()).await.expect("insert vod row");
}
