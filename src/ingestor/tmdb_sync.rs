//! Metadata enrichment pipeline
//!
//! Resolves catalog rows (movies and series) to metadata ids and hydrates
//! their metadata fields. Candidates are selected by an eligibility
//! predicate built on per-kind cooldowns; a bounded worker pool drains the
//! queue, one transactional write per item. `not_found` from the search
//! endpoint is a normal outcome and parks the item as `missing`; classified
//! request failures park it as `failed` with an escalating cooldown.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::TransactionTrait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::Database;
use crate::database::repositories::{
    SeriesItemRepository, TmdbConfigRepository, VodStreamRepository,
};
use crate::entities::tmdb_config;
use crate::errors::{AppError, ErrorKind, FetchError};
use crate::models::{ContentKind, EnrichmentCandidate, MetadataBlock, TmdbStatus};
use crate::tmdb::client::{TmdbClient, TmdbCredentials};
use crate::tmdb::matching::pick_best_result;
use crate::utils::http::{Fetcher, FetcherConfig, OriginMetricsSnapshot};
use crate::utils::title::clean_title_and_year;

const CANDIDATE_POOL_CAP: usize = 1000;

/// Pipeline tuning, from environment variables with stored-config fallbacks.
#[derive(Debug, Clone)]
pub struct EnrichmentSettings {
    pub workers: usize,
    pub rps: u32,
    pub burst: u32,
    pub cooldown_missing: Duration,
    pub cooldown_failed_base: Duration,
    pub cooldown_transient: Duration,
    pub cooldown_invalid: Duration,
    pub resync: Duration,
}

impl EnrichmentSettings {
    pub fn from_env(config: &tmdb_config::Model) -> Self {
        Self {
            workers: env_int("TMDB_SYNC_WORKERS", 2).max(1) as usize,
            rps: env_int("TMDB_RPS", config.requests_per_second.max(1) as i64) as u32,
            burst: env_int("TMDB_BURST", 10) as u32,
            cooldown_missing: Duration::minutes(env_int("TMDB_COOLDOWN_MISSING", 15)),
            cooldown_failed_base: Duration::minutes(env_int("TMDB_COOLDOWN_FAILED", 120)),
            cooldown_transient: Duration::minutes(env_int("TMDB_COOLDOWN_TRANSIENT", 15)),
            cooldown_invalid: Duration::days(env_int("TMDB_COOLDOWN_INVALID_DAYS", 7)),
            resync: Duration::days(env_int("TMDB_RESYNC_DAYS", 14)),
        }
    }

    /// Apply a per-run override to the missing/failed/transient cooldowns.
    pub fn with_cooldown_override(mut self, minutes: Option<i64>) -> Self {
        if let Some(minutes) = minutes.filter(|m| *m > 0) {
            self.cooldown_missing = Duration::minutes(minutes);
            self.cooldown_failed_base = Duration::minutes(minutes);
            self.cooldown_transient = Duration::minutes(minutes);
        }
        self
    }
}

fn env_int(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

/// Cooldown applied to a `failed` item: transient kinds get the short
/// cooldown, definitive rejections the long one, anything else doubles
/// from the base per failure.
pub fn failed_cooldown(
    settings: &EnrichmentSettings,
    fail_count: i32,
    error_kind: Option<ErrorKind>,
) -> Duration {
    match error_kind {
        Some(kind) if kind.is_transient() => settings.cooldown_transient,
        Some(ErrorKind::NotFound) | Some(ErrorKind::Invalid) => settings.cooldown_invalid,
        _ => {
            let exponent = (fail_count.max(1) - 1).min(16) as u32;
            settings.cooldown_failed_base * 2_i32.pow(exponent)
        }
    }
}

/// Whether an item may be attempted now. Comparisons are strict: an item
/// becomes eligible exactly when the cooldown has fully elapsed.
pub fn is_eligible(
    candidate: &EnrichmentCandidate,
    now: DateTime<Utc>,
    settings: &EnrichmentSettings,
) -> bool {
    match candidate.status {
        TmdbStatus::Synced => match candidate.last_sync {
            None => false,
            Some(last) => last < now - settings.resync,
        },
        TmdbStatus::Missing => match candidate.last_sync {
            None => true,
            Some(last) => last < now - settings.cooldown_missing,
        },
        TmdbStatus::Failed => match candidate.last_sync {
            None => true,
            Some(last) => {
                last < now - failed_cooldown(settings, candidate.fail_count, candidate.error_kind)
            }
        },
    }
}

#[derive(Default)]
struct RunCounters {
    queued: AtomicUsize,
    processed: AtomicUsize,
    synced: AtomicUsize,
    missing: AtomicUsize,
    failed: AtomicUsize,
}

/// Outcome of one pipeline run, exposed through the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentRunReport {
    pub kind: String,
    pub queued: usize,
    pub processed: usize,
    pub synced: usize,
    pub missing: usize,
    pub failed: usize,
    #[serde(flatten)]
    pub requests: OriginMetricsSnapshot,
    pub elapsed_s: f64,
    pub avg_time_per_item: f64,
    pub throughput_per_s: f64,
    pub eta_s: f64,
}

pub struct EnrichmentPipeline {
    database: Database,
    vod: VodStreamRepository,
    series: SeriesItemRepository,
    config: TmdbConfigRepository,
}

impl EnrichmentPipeline {
    pub fn new(database: &Database) -> Self {
        let connection = database.connection();
        Self {
            database: database.clone(),
            vod: VodStreamRepository::new(connection.clone()),
            series: SeriesItemRepository::new(connection.clone()),
            config: TmdbConfigRepository::new(connection),
        }
    }

    /// Run one batch for a kind. Returns an error only when the metadata
    /// API is disabled or unconfigured; per-item failures are recorded on
    /// the rows themselves.
    pub async fn run(
        &self,
        kind: ContentKind,
        limit: usize,
        cooldown_override_minutes: Option<i64>,
    ) -> Result<EnrichmentRunReport> {
        let config = self.config.get_or_create().await?;
        if !TmdbConfigRepository::is_usable(&config) {
            return Err(AppError::configuration(
                "metadata API is disabled or has no credentials",
            )
            .into());
        }

        let settings =
            EnrichmentSettings::from_env(&config).with_cooldown_override(cooldown_override_minutes);
        let started = Instant::now();

        let candidates = self.select_candidates(kind, limit, &settings).await?;
        let counters = Arc::new(RunCounters::default());
        counters.queued.store(candidates.len(), Ordering::Relaxed);

        let client = Arc::new(TmdbClient::new(
            Fetcher::new(FetcherConfig::default()),
            TmdbCredentials::from_config(&config),
            settings.rps,
            settings.burst,
        ));

        if candidates.is_empty() {
            info!(kind = %kind, limit, "enrichment: no eligible items");
            return Ok(self.report(kind, &counters, &client, started, 0));
        }

        // Warm the configuration cache; not fatal when it fails.
        if let Err(error) = client.configuration().await {
            warn!(%error, "metadata configuration fetch failed; continuing");
        }

        let queue: Arc<Mutex<VecDeque<Uuid>>> =
            Arc::new(Mutex::new(candidates.iter().map(|c| c.id).collect()));

        let mut workers = Vec::with_capacity(settings.workers);
        for worker_id in 0..settings.workers {
            let queue = queue.clone();
            let client = client.clone();
            let counters = counters.clone();
            let database = self.database.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let next = { queue.lock().await.pop_front() };
                    let Some(item_id) = next else { break };
                    if let Err(error) =
                        process_item(&database, &client, kind, &item_id, &counters).await
                    {
                        warn!(worker_id, %item_id, %error, "enrichment item write failed");
                    }
                    counters.processed.fetch_add(1, Ordering::Relaxed);
                }
            }));
        }
        for worker in workers {
            let _ = worker.await;
        }

        let report = self.report(kind, &counters, &client, started, counters_queued(&counters));
        info!(
            kind = %kind,
            queued = report.queued,
            processed = report.processed,
            synced = report.synced,
            missing = report.missing,
            failed = report.failed,
            retries = report.requests.retry_total,
            rate_limited = report.requests.rate_limited,
            "enrichment run complete"
        );
        Ok(report)
    }

    /// Candidate selection: least recently synced first, over-fetched ~5x
    /// and filtered down by the eligibility predicate.
    async fn select_candidates(
        &self,
        kind: ContentKind,
        limit: usize,
        settings: &EnrichmentSettings,
    ) -> Result<Vec<EnrichmentCandidate>> {
        let pool_size = (limit.saturating_mul(5)).max(limit).min(CANDIDATE_POOL_CAP) as u64;
        let pool = match kind {
            ContentKind::Movie => self.vod.candidates(pool_size).await?,
            ContentKind::Series => self.series.candidates(pool_size).await?,
        };

        let now = Utc::now();
        let mut picked = Vec::with_capacity(limit);
        for candidate in pool {
            if is_eligible(&candidate, now, settings) {
                picked.push(candidate);
            }
            if picked.len() >= limit {
                break;
            }
        }
        Ok(picked)
    }

    fn report(
        &self,
        kind: ContentKind,
        counters: &RunCounters,
        client: &TmdbClient,
        started: Instant,
        queued: usize,
    ) -> EnrichmentRunReport {
        let processed = counters.processed.load(Ordering::Relaxed);
        let elapsed_s = started.elapsed().as_secs_f64();
        let throughput = if elapsed_s > 0.0 { processed as f64 / elapsed_s } else { 0.0 };
        let remaining = queued.saturating_sub(processed);
        EnrichmentRunReport {
            kind: kind.to_string(),
            queued,
            processed,
            synced: counters.synced.load(Ordering::Relaxed),
            missing: counters.missing.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            requests: client.metrics().snapshot(),
            elapsed_s,
            avg_time_per_item: if processed > 0 { elapsed_s / processed as f64 } else { 0.0 },
            throughput_per_s: throughput,
            eta_s: if throughput > 0.0 { remaining as f64 / throughput } else { 0.0 },
        }
    }
}

fn counters_queued(counters: &RunCounters) -> usize {
    counters.queued.load(Ordering::Relaxed)
}

/// Drive one item through the state machine. HTTP happens outside any
/// transaction; each row write opens and commits its own.
async fn process_item(
    database: &Database,
    client: &TmdbClient,
    kind: ContentKind,
    item_id: &Uuid,
    counters: &RunCounters,
) -> Result<()> {
    let connection = database.connection();
    let candidate = match kind {
        ContentKind::Movie => VodStreamRepository::load_candidate(&*connection, item_id).await?,
        ContentKind::Series => SeriesItemRepository::load_candidate(&*connection, item_id).await?,
    };
    let Some(candidate) = candidate else {
        return Ok(());
    };

    let name = candidate.name.trim().to_string();
    let normalized = candidate
        .normalized_name
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if name.is_empty() && normalized.is_empty() && candidate.tmdb_id.is_none() {
        return Ok(());
    }

    let outcome = resolve_item(client, kind, &candidate, &name, &normalized).await;
    let now = Utc::now();

    match outcome {
        Ok(Some(block)) => {
            let txn = connection.begin().await?;
            match kind {
                ContentKind::Movie => {
                    VodStreamRepository::apply_metadata(
                        &txn,
                        &candidate.id,
                        &candidate.provider_id,
                        &block,
                        now,
                    )
                    .await?
                }
                ContentKind::Series => {
                    SeriesItemRepository::apply_metadata(
                        &txn,
                        &candidate.id,
                        &candidate.provider_id,
                        &block,
                        now,
                    )
                    .await?
                }
            }
            txn.commit().await?;
            counters.synced.fetch_add(1, Ordering::Relaxed);
        }
        Ok(None) => {
            let txn = connection.begin().await?;
            match kind {
                ContentKind::Movie => {
                    VodStreamRepository::mark_missing(&txn, &candidate.id, now).await?
                }
                ContentKind::Series => {
                    SeriesItemRepository::mark_missing(&txn, &candidate.id, now).await?
                }
            }
            txn.commit().await?;
            counters.missing.fetch_add(1, Ordering::Relaxed);
        }
        Err(error) => {
            debug!(item = %candidate.id, kind = %error.kind, "enrichment item failed");
            let txn = connection.begin().await?;
            match kind {
                ContentKind::Movie => {
                    VodStreamRepository::mark_failed(
                        &txn,
                        &candidate.id,
                        error.kind,
                        &error.message,
                        now,
                    )
                    .await?
                }
                ContentKind::Series => {
                    SeriesItemRepository::mark_failed(
                        &txn,
                        &candidate.id,
                        error.kind,
                        &error.message,
                        now,
                    )
                    .await?
                }
            }
            txn.commit().await?;
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    Ok(())
}

/// Resolve to a hydrated metadata block, `None` for a definitive miss.
async fn resolve_item(
    client: &TmdbClient,
    kind: ContentKind,
    candidate: &EnrichmentCandidate,
    name: &str,
    normalized: &str,
) -> Result<Option<MetadataBlock>, FetchError> {
    let resolved_id = match candidate.tmdb_id {
        Some(id) => Some(id),
        None => {
            let mut queries: Vec<&str> = Vec::new();
            if !name.is_empty() {
                queries.push(name);
            }
            if !normalized.is_empty() && normalized != name {
                queries.push(normalized);
            }

            let mut best_id = None;
            for query in queries {
                let (wanted, year) = clean_title_and_year(query);
                if wanted.is_empty() {
                    continue;
                }
                let results = client.search(kind, &wanted, year).await?;
                let date_key = match kind {
                    ContentKind::Movie => "release_date",
                    ContentKind::Series => "first_air_date",
                };
                if let Some(best) = pick_best_result(&results, &wanted, year, date_key) {
                    best_id = best.get("id").and_then(Value::as_i64).map(|id| id as i32);
                    if best_id.is_some() {
                        break;
                    }
                }
            }
            best_id
        }
    };

    let Some(resolved_id) = resolved_id else {
        return Ok(None);
    };

    let details = client.detail(kind, resolved_id).await?;
    Ok(build_metadata_block(kind, resolved_id, &details))
}

/// Extract the hydration fields from a detail document. Invalid dates are
/// tolerated; a document without an id counts as a miss.
fn build_metadata_block(kind: ContentKind, resolved_id: i32, details: &Value) -> Option<MetadataBlock> {
    if !details.is_object() {
        return None;
    }
    let tmdb_id = details
        .get("id")
        .and_then(Value::as_i64)
        .map(|id| id as i32)
        .unwrap_or(resolved_id);

    let (title_key, date_key) = match kind {
        ContentKind::Movie => ("title", "release_date"),
        ContentKind::Series => ("name", "first_air_date"),
    };

    let release_date = details
        .get(date_key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok());

    let genres = details
        .get("genres")
        .and_then(Value::as_array)
        .map(|genres| {
            genres
                .iter()
                .filter_map(|g| g.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(MetadataBlock {
        tmdb_id,
        title: details.get(title_key).and_then(Value::as_str).map(str::to_string),
        overview: details.get("overview").and_then(Value::as_str).map(str::to_string),
        release_date,
        genres,
        vote_average: details.get("vote_average").and_then(Value::as_f64),
        poster_path: details.get("poster_path").and_then(Value::as_str).map(str::to_string),
        backdrop_path: details.get("backdrop_path").and_then(Value::as_str).map(str::to_string),
        raw: details.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> EnrichmentSettings {
        EnrichmentSettings {
            workers: 2,
            rps: 5,
            burst: 10,
            cooldown_missing: Duration::minutes(15),
            cooldown_failed_base: Duration::minutes(120),
            cooldown_transient: Duration::minutes(15),
            cooldown_invalid: Duration::days(7),
            resync: Duration::days(14),
        }
    }

    fn candidate(
        status: TmdbStatus,
        last_sync: Option<DateTime<Utc>>,
        error_kind: Option<ErrorKind>,
        fail_count: i32,
    ) -> EnrichmentCandidate {
        EnrichmentCandidate {
            id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            name: "Example".to_string(),
            normalized_name: None,
            tmdb_id: None,
            status,
            last_sync,
            error_kind,
            fail_count,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn missing_with_no_last_sync_is_eligible() {
        let c = candidate(TmdbStatus::Missing, None, None, 0);
        assert!(is_eligible(&c, Utc::now(), &settings()));
    }

    #[test]
    fn missing_cooldown_is_strict() {
        let now = Utc::now();
        // exactly at the boundary: last_sync == now - cooldown is NOT
        // eligible yet (strict <)
        let c = candidate(
            TmdbStatus::Missing,
            Some(now - Duration::minutes(15)),
            None,
            0,
        );
        assert!(!is_eligible(&c, now, &settings()));

        let c = candidate(
            TmdbStatus::Missing,
            Some(now - Duration::minutes(15) - Duration::seconds(1)),
            None,
            0,
        );
        assert!(is_eligible(&c, now, &settings()));
    }

    #[test]
    fn synced_waits_for_resync_window() {
        let now = Utc::now();
        let c = candidate(TmdbStatus::Synced, Some(now - Duration::days(13)), None, 0);
        assert!(!is_eligible(&c, now, &settings()));
        let c = candidate(TmdbStatus::Synced, Some(now - Duration::days(15)), None, 0);
        assert!(is_eligible(&c, now, &settings()));
        // synced without a sync timestamp never becomes a resync candidate
        let c = candidate(TmdbStatus::Synced, None, None, 0);
        assert!(!is_eligible(&c, now, &settings()));
    }

    #[test]
    fn transient_failures_use_short_cooldown() {
        let s = settings();
        for kind in [
            ErrorKind::RateLimited,
            ErrorKind::Timeout,
            ErrorKind::Server,
            ErrorKind::Network,
        ] {
            assert_eq!(failed_cooldown(&s, 5, Some(kind)), Duration::minutes(15));
        }
    }

    #[test]
    fn definitive_rejections_use_invalid_cooldown() {
        let s = settings();
        assert_eq!(failed_cooldown(&s, 1, Some(ErrorKind::NotFound)), Duration::days(7));
        assert_eq!(failed_cooldown(&s, 1, Some(ErrorKind::Invalid)), Duration::days(7));
    }

    #[test]
    fn unknown_failures_escalate_exponentially() {
        let s = settings();
        assert_eq!(failed_cooldown(&s, 1, None), Duration::minutes(120));
        assert_eq!(failed_cooldown(&s, 2, None), Duration::minutes(240));
        assert_eq!(failed_cooldown(&s, 3, None), Duration::minutes(480));
        // fail_count of zero behaves like one
        assert_eq!(failed_cooldown(&s, 0, None), Duration::minutes(120));
    }

    #[test]
    fn metadata_block_tolerates_invalid_dates() {
        let details = serde_json::json!({
            "id": 438631,
            "title": "Dune",
            "release_date": "not-a-date",
            "genres": [{"id": 878, "name": "Science Fiction"}],
            "vote_average": 7.8
        });
        let block = build_metadata_block(ContentKind::Movie, 438631, &details).unwrap();
        assert_eq!(block.tmdb_id, 438631);
        assert_eq!(block.title.as_deref(), Some("Dune"));
        assert!(block.release_date.is_none());
        assert_eq!(block.genres, vec!["Science Fiction".to_string()]);
        assert_eq!(block.vote_average, Some(7.8));
    }

    #[test]
    fn series_block_reads_name_and_first_air_date() {
        let details = serde_json::json!({
            "id": 1399,
            "name": "Game of Thrones",
            "first_air_date": "2011-04-17"
        });
        let block = build_metadata_block(ContentKind::Series, 1399, &details).unwrap();
        assert_eq!(block.title.as_deref(), Some("Game of Thrones"));
        assert_eq!(
            block.release_date,
            NaiveDate::from_ymd_opt(2011, 4, 17)
        );
    }
}
