//! Domain model types shared between the engines and the repositories
//!
//! Row data itself flows through the SeaORM entity models; this module keeps
//! the small enums stored as strings in those rows, plus the report structs
//! the sync engines return.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Category kind under a provider. Stored as `live | vod | series`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum CategoryKind {
    Live,
    Vod,
    Series,
}

/// Content kind handled by the metadata enrichment pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ContentKind {
    Movie,
    Series,
}

/// Enrichment state of a catalog row. Stored as `missing | synced | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TmdbStatus {
    Missing,
    Synced,
    Failed,
}

impl TmdbStatus {
    /// Parse a stored status, defaulting to `missing` for anything unknown.
    pub fn parse_or_missing(raw: &str) -> Self {
        raw.parse().unwrap_or(TmdbStatus::Missing)
    }
}

/// Outcome of syncing one category worth of streams.
#[derive(Debug, Clone, Serialize)]
pub struct CategorySyncDetail {
    pub category_ext_id: i32,
    pub category_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    pub changed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CategorySyncDetail {
    pub fn ok(ext_id: i32, name: &str, count: usize, changed: usize) -> Self {
        Self {
            category_ext_id: ext_id,
            category_name: name.to_string(),
            count: Some(count),
            changed,
            error: None,
        }
    }

    pub fn failed(ext_id: i32, name: &str, error: impl Into<String>) -> Self {
        Self {
            category_ext_id: ext_id,
            category_name: name.to_string(),
            count: None,
            changed: 0,
            error: Some(error.into()),
        }
    }
}

/// Report for one provider/kind stream sync pass.
#[derive(Debug, Clone, Serialize)]
pub struct StreamSyncReport {
    pub categories: usize,
    pub total_streams: usize,
    pub changed: usize,
    pub details: Vec<CategorySyncDetail>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub seconds: Option<f64>,
    pub deactivate_missing: bool,
}

impl StreamSyncReport {
    pub fn started(deactivate_missing: bool) -> Self {
        Self {
            categories: 0,
            total_streams: 0,
            changed: 0,
            details: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            seconds: None,
            deactivate_missing,
        }
    }

    pub fn finish(&mut self) {
        let now = Utc::now();
        self.seconds = Some((now - self.started_at).num_milliseconds() as f64 / 1000.0);
        self.finished_at = Some(now);
    }
}

/// Report for a full provider sync (categories + all three stream kinds).
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSyncReport {
    pub provider_id: uuid::Uuid,
    pub categories_changed: usize,
    pub live: StreamSyncReport,
    pub vod: StreamSyncReport,
    pub series: StreamSyncReport,
}

/// Report for one EPG source ingest.
#[derive(Debug, Clone, Serialize)]
pub struct EpgSyncReport {
    pub source_id: uuid::Uuid,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub purged_programs: u64,
    pub channels_new: usize,
    pub channels_updated: usize,
    pub programs_new: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_map: Option<AutoMapReport>,
}

/// Report for a live-stream to EPG-channel auto-match pass.
#[derive(Debug, Clone, Serialize)]
pub struct AutoMapReport {
    pub matched: usize,
    pub updated: usize,
    pub skipped_other_source: usize,
    pub total_streams_processed: usize,
    pub min_score: f64,
}

/// One live channel as returned by the provider's catalog listing.
#[derive(Debug, Clone)]
pub struct LiveChannelUpsert {
    pub ext_id: i32,
    pub name: String,
    pub icon: Option<String>,
    pub epg_channel_id: Option<String>,
}

/// One VOD item as returned by the provider's catalog listing.
#[derive(Debug, Clone)]
pub struct VodUpsert {
    pub ext_id: i32,
    pub name: String,
    pub icon: Option<String>,
    pub container_extension: Option<String>,
    pub rating: Option<String>,
    pub added: Option<String>,
    /// External metadata id some panels pass through; used to repair rows
    /// whose ext id changed upstream.
    pub tmdb_id: Option<i32>,
}

/// One series as returned by the provider's catalog listing.
#[derive(Debug, Clone)]
pub struct SeriesUpsert {
    pub ext_id: i32,
    pub name: String,
    pub cover: Option<String>,
}

/// Enrichment-relevant projection of a vod/series row, shared by the
/// pipeline across both kinds.
#[derive(Debug, Clone)]
pub struct EnrichmentCandidate {
    pub id: uuid::Uuid,
    pub provider_id: uuid::Uuid,
    pub name: String,
    pub normalized_name: Option<String>,
    pub tmdb_id: Option<i32>,
    pub status: TmdbStatus,
    pub last_sync: Option<DateTime<Utc>>,
    pub error_kind: Option<crate::errors::ErrorKind>,
    pub fail_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Hydrated metadata written to a row on a successful enrichment.
#[derive(Debug, Clone)]
pub struct MetadataBlock {
    pub tmdb_id: i32,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<chrono::NaiveDate>,
    pub genres: Vec<String>,
    pub vote_average: Option<f64>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub raw: serde_json::Value,
}
