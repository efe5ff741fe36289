//! EPG ingest engine behavior against an in-memory store

use catalogd::config::DatabaseConfig;
use catalogd::database::Database;
use catalogd::database::repositories::{EpgRepository, LiveStreamRepository, ProviderRepository};
use catalogd::ingestor::EpgIngestor;
use catalogd::ingestor::epg::EpgSyncOptions;
use catalogd::utils::time::format_xmltv_datetime;
use catalogd::utils::xmltv::parse_xmltv;

use chrono::{Duration, Utc};
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

/// Build a small XMLTV document with programme times relative to now.
fn sample_document(programme_blocks: &[(&str, i64, i64, &str)]) -> String {
    let now = Utc::now();
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<tv>
  <channel id="espn.us">
    <display-name>ESPN</display-name>
    <icon src="http://logos/espn.png"/>
  </channel>
  <channel id="cnn.us">
    <display-name>CNN</display-name>
  </channel>
"#,
    );
    for (channel, start_offset_min, stop_offset_min, title) in programme_blocks {
        let start = format_xmltv_datetime(now + Duration::minutes(*start_offset_min));
        let stop = format_xmltv_datetime(now + Duration::minutes(*stop_offset_min));
        xml.push_str(&format!(
            "  <programme channel=\"{channel}\" start=\"{start}\" stop=\"{stop}\">\n    <title>{title}</title>\n  </programme>\n"
        ));
    }
    xml.push_str("</tv>\n");
    xml
}

#[tokio::test]
async fn resync_purges_and_reloads_programs() {
    let db = test_db().await;
    let epg_repo = EpgRepository::new(db.connection());
    let ingestor = EpgIngestor::new(&db);
    let options = EpgSyncOptions {
        enrich_missing_desc: false,
        ..EpgSyncOptions::default()
    };

    let source = epg_repo
        .create_source("guide", "http://guide.example/xmltv.xml.gz")
        .await
        .unwrap();

    let doc_a = parse_xmltv(&sample_document(&[
        ("espn.us", 10, 70, "SportsCenter"),
        ("espn.us", 70, 130, "NBA Tonight"),
        ("cnn.us", 10, 70, "Newsroom"),
    ]))
    .unwrap();
    let report = ingestor.apply_document(&source, &doc_a, &options).await.unwrap();
    assert_eq!(report.programs_new, 3);
    assert_eq!(report.channels_new, 2);
    assert_eq!(epg_repo.count_programs(&source.id).await.unwrap(), 3);

    // the second document is authoritative: fewer programs, all fresh
    let doc_b = parse_xmltv(&sample_document(&[
        ("espn.us", 10, 70, "SportsCenter"),
        ("cnn.us", 10, 70, "Newsroom"),
    ]))
    .unwrap();
    let report = ingestor.apply_document(&source, &doc_b, &options).await.unwrap();
    assert_eq!(report.purged_programs, 3);
    assert_eq!(report.programs_new, 2);
    assert_eq!(epg_repo.count_programs(&source.id).await.unwrap(), 2);

    // (channel, start) is unique across the reloaded set
    let programs = epg_repo.programs_for_source(&source.id).await.unwrap();
    let mut keys: Vec<_> = programs.iter().map(|p| (p.channel_id, p.start_time)).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), programs.len());
}

#[tokio::test]
async fn reingesting_same_document_yields_same_program_set() {
    let db = test_db().await;
    let epg_repo = EpgRepository::new(db.connection());
    let ingestor = EpgIngestor::new(&db);
    let options = EpgSyncOptions {
        enrich_missing_desc: false,
        ..EpgSyncOptions::default()
    };

    let source = epg_repo
        .create_source("guide", "http://guide.example/xmltv.xml")
        .await
        .unwrap();
    let xml = sample_document(&[
        ("espn.us", 10, 70, "SportsCenter"),
        ("cnn.us", 10, 70, "Newsroom"),
    ]);
    let doc = parse_xmltv(&xml).unwrap();

    ingestor.apply_document(&source, &doc, &options).await.unwrap();
    let first: Vec<_> = epg_repo
        .programs_for_source(&source.id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| (p.channel_id, p.start_time, p.end_time, p.title))
        .collect();

    ingestor.apply_document(&source, &doc, &options).await.unwrap();
    let second: Vec<_> = epg_repo
        .programs_for_source(&source.id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| (p.channel_id, p.start_time, p.end_time, p.title))
        .collect();

    assert_eq!(first, second);
}

#[tokio::test]
async fn programs_outside_window_are_dropped() {
    let db = test_db().await;
    let epg_repo = EpgRepository::new(db.connection());
    let ingestor = EpgIngestor::new(&db);
    let options = EpgSyncOptions {
        hours: 24,
        enrich_missing_desc: false,
        ..EpgSyncOptions::default()
    };

    let source = epg_repo
        .create_source("guide", "http://guide.example/xmltv.xml")
        .await
        .unwrap();
    let doc = parse_xmltv(&sample_document(&[
        // ended long before the window opened
        ("espn.us", -10 * 60, -8 * 60, "Ancient Rerun"),
        // starts beyond the 24h window
        ("espn.us", 30 * 60, 31 * 60, "Far Future"),
        // stop before start
        ("espn.us", 120, 60, "Backwards"),
        // valid
        ("espn.us", 10, 70, "SportsCenter"),
    ]))
    .unwrap();

    let report = ingestor.apply_document(&source, &doc, &options).await.unwrap();
    assert_eq!(report.programs_new, 1);
    let programs = epg_repo.programs_for_source(&source.id).await.unwrap();
    assert_eq!(programs.len(), 1);
    assert_eq!(programs[0].title, "SportsCenter");
}

#[tokio::test]
async fn duplicate_start_times_keep_first_occurrence() {
    let db = test_db().await;
    let epg_repo = EpgRepository::new(db.connection());
    let ingestor = EpgIngestor::new(&db);
    let options = EpgSyncOptions {
        enrich_missing_desc: false,
        ..EpgSyncOptions::default()
    };

    let source = epg_repo
        .create_source("guide", "http://guide.example/xmltv.xml")
        .await
        .unwrap();
    let doc = parse_xmltv(&sample_document(&[
        ("espn.us", 10, 70, "First"),
        ("espn.us", 10, 70, "Second"),
    ]))
    .unwrap();

    let report = ingestor.apply_document(&source, &doc, &options).await.unwrap();
    assert_eq!(report.programs_new, 1);
    let programs = epg_repo.programs_for_source(&source.id).await.unwrap();
    assert_eq!(programs[0].title, "First");
}

#[tokio::test]
async fn undeclared_channel_gets_a_stub() {
    let db = test_db().await;
    let epg_repo = EpgRepository::new(db.connection());
    let ingestor = EpgIngestor::new(&db);
    let options = EpgSyncOptions {
        enrich_missing_desc: false,
        ..EpgSyncOptions::default()
    };

    let source = epg_repo
        .create_source("guide", "http://guide.example/xmltv.xml")
        .await
        .unwrap();
    let doc = parse_xmltv(&sample_document(&[("mystery.ch", 10, 70, "Unknown Show")])).unwrap();
    ingestor.apply_document(&source, &doc, &options).await.unwrap();

    let channels = epg_repo.channels_for_source(&source.id).await.unwrap();
    let stub = channels.iter().find(|c| c.xmltv_id == "mystery.ch").unwrap();
    assert_eq!(stub.display_name, "mystery.ch");
}

#[tokio::test]
async fn missing_descriptions_are_filled_from_library() {
    let db = test_db().await;
    let epg_repo = EpgRepository::new(db.connection());
    let providers = ProviderRepository::new(db.connection());
    let ingestor = EpgIngestor::new(&db);

    let provider = providers
        .create("acme", "http://panel.acme.tv", "user", "pass")
        .await
        .unwrap();
    insert_synced_vod(&db, &provider.id, "SportsCenter (2020)", "The flagship sports news show.").await;

    let source = epg_repo
        .create_source("guide", "http://guide.example/xmltv.xml")
        .await
        .unwrap();
    let options = EpgSyncOptions {
        enrich_missing_desc: true,
        max_desc_len: 20,
        ..EpgSyncOptions::default()
    };
    let doc = parse_xmltv(&sample_document(&[("espn.us", 10, 70, "SportsCenter")])).unwrap();
    ingestor.apply_document(&source, &doc, &options).await.unwrap();

    let programs = epg_repo.programs_for_source(&source.id).await.unwrap();
    let desc = programs[0].description.as_deref().unwrap();
    assert!(desc.starts_with("The flagship"));
    assert!(desc.chars().count() <= 20, "description must be clipped");
}

#[tokio::test]
async fn auto_match_binds_streams_and_skips_other_sources() {
    let db = test_db().await;
    let epg_repo = EpgRepository::new(db.connection());
    let providers = ProviderRepository::new(db.connection());
    let live = LiveStreamRepository::new(db.connection());
    let ingestor = EpgIngestor::new(&db);

    let provider = providers
        .create("acme", "http://panel.acme.tv", "user", "pass")
        .await
        .unwrap();
    let source = epg_repo
        .create_source("guide", "http://guide.example/xmltv.xml")
        .await
        .unwrap();
    let other_source = epg_repo
        .create_source("other", "http://other.example/xmltv.xml")
        .await
        .unwrap();

    epg_repo
        .insert_channel(&source.id, "espn.us", "ESPN", None)
        .await
        .unwrap();
    epg_repo
        .insert_channel(&source.id, "cnn.us", "CNN", None)
        .await
        .unwrap();

    insert_live(&db, &provider.id, 1, "ESPN HD US", true, None).await;
    insert_live(&db, &provider.id, 2, "CNN 4K", true, Some(other_source.id)).await;
    insert_live(&db, &provider.id, 3, "Totally Unrelated Channel", true, None).await;

    let report = ingestor
        .auto_match(&provider.id, &source.id, true, 0.72)
        .await
        .unwrap();
    assert_eq!(report.matched, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.skipped_other_source, 1);

    let espn = live.find_by_ext(&provider.id, 1).await.unwrap().unwrap();
    assert_eq!(espn.epg_source_id, Some(source.id));
    assert_eq!(espn.epg_channel_id.as_deref(), Some("espn.us"));

    // stream bound elsewhere is untouched
    let cnn = live.find_by_ext(&provider.id, 2).await.unwrap().unwrap();
    assert_eq!(cnn.epg_source_id, Some(other_source.id));
}

#[tokio::test]
async fn failover_links_resolve_one_hop_and_tolerate_dangling() {
    let db = test_db().await;
    let providers = ProviderRepository::new(db.connection());
    let live = LiveStreamRepository::new(db.connection());

    let provider = providers
        .create("acme", "http://panel.acme.tv", "user", "pass")
        .await
        .unwrap();
    insert_live(&db, &provider.id, 1, "ESPN", true, None).await;
    insert_live(&db, &provider.id, 2, "ESPN Backup", true, None).await;

    let primary = live.find_by_ext(&provider.id, 1).await.unwrap().unwrap();
    let backup = live.find_by_ext(&provider.id, 2).await.unwrap().unwrap();

    // alt1 resolves, alt2 dangles
    let mut with_alts = primary.clone();
    with_alts.alt1_stream_id = Some(backup.id);
    with_alts.alt2_stream_id = Some(Uuid::new_v4());

    let resolved = live.resolve_failover(&with_alts).await.unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].id, backup.id);
}

async fn insert_live(
    db: &Database,
    provider_id: &Uuid,
    ext_id: i32,
    name: &str,
    approved: bool,
    epg_source_id: Option<Uuid>,
) {
    use catalogd::entities::live_streams;
    let now = Utc::now();
    let model = live_streams::ActiveModel {
        id: Set(Uuid::new_v4()),
        provider_id: Set(*provider_id),
        category_id: Set(None),
        provider_stream_id: Set(ext_id),
        name: Set(name.to_string()),
        normalized_name: Set(None),
        channel_number: Set(None),
        custom_logo_url: Set(None),
        stream_icon: Set(None),
        epg_channel_id: Set(None),
        epg_source_id: Set(epg_source_id),
        epg_time_offset_minutes: Set(None),
        approved: Set(approved),
        alt1_stream_id: Set(None),
        alt2_stream_id: Set(None),
        alt3_stream_id: Set(None),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    };
    model.insert(&*db.connection()).await.expect("insert live stream");
}

async fn insert_synced_vod(db: &Database, provider_id: &Uuid, name: &str, overview: &str) {
    use catalogd::entities::vod_streams;
    let now = Utc::now();
    let model = vod_streams::ActiveModel {
        id: Set(Uuid::new_v4()),
        provider_id: Set(*provider_id),
        category_id: Set(None),
        provider_stream_id: Set(900),
        name: Set(name.to_string()),
        normalized_name: Set(None),
        stream_icon: Set(None),
        custom_poster_url: Set(None),
        container_extension: Set(None),
        rating: Set(None),
        added: Set(None),
        approved: Set(true),
        is_active: Set(true),
        tmdb_id: Set(Some(4242)),
        tmdb_status: Set("synced".to_string()),
        tmdb_last_sync: Set(Some(now)),
        tmdb_error: Set(None),
        tmdb_error_kind: Set(None),
        tmdb_fail_count: Set(0),
        tmdb_title: Set(Some(name.to_string())),
        tmdb_overview: Set(Some(overview.to_string())),
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
}
