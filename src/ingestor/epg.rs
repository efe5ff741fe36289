//! EPG ingest engine
//!
//! Downloads an XMLTV document, purges every program of the source, and
//! materializes channels and programs for a forward-looking window. The
//! document is authoritative: incremental merging accumulates stale and
//! duplicate rows, so programs are always purge-and-reloaded under a
//! per-source lock.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::Database;
use crate::database::repositories::{
    EpgRepository, LiveStreamRepository, SeriesItemRepository, VodStreamRepository,
};
use crate::entities::{epg_channels, epg_sources};
use crate::models::{AutoMapReport, EpgSyncReport};
use crate::utils::decompression::maybe_gunzip;
use crate::utils::http::{Fetcher, FetcherConfig};
use crate::utils::matching::best_match;
use crate::utils::time::parse_xmltv_datetime;
use crate::utils::title::title_key;
use crate::utils::url::UrlUtils;
use crate::utils::xmltv::parse_xmltv;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const AUTO_MAP_STREAM_LIMIT: u64 = 5000;

/// Options for one source ingest.
#[derive(Debug, Clone)]
pub struct EpgSyncOptions {
    /// Forward window size in hours, clamped to 1..=168.
    pub hours: i64,
    /// Run auto-match for this provider after the ingest.
    pub auto_map_provider_id: Option<Uuid>,
    pub auto_map_approved_only: bool,
    pub auto_map_min_score: f64,
    /// Fill empty programme descriptions from the local library.
    pub enrich_missing_desc: bool,
    pub max_desc_len: usize,
}

impl Default for EpgSyncOptions {
    fn default() -> Self {
        Self {
            hours: 36,
            auto_map_provider_id: None,
            auto_map_approved_only: true,
            auto_map_min_score: 0.72,
            enrich_missing_desc: true,
            max_desc_len: 1900,
        }
    }
}

pub struct EpgIngestor {
    epg: EpgRepository,
    live: LiveStreamRepository,
    vod: VodStreamRepository,
    series: SeriesItemRepository,
    fetcher: Fetcher,
    // Keyed ingest locks: different sources sync in parallel, the same
    // source never double-ingests.
    source_locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl EpgIngestor {
    pub fn new(database: &Database) -> Self {
        let connection = database.connection();
        Self {
            epg: EpgRepository::new(connection.clone()),
            live: LiveStreamRepository::new(connection.clone()),
            vod: VodStreamRepository::new(connection.clone()),
            series: SeriesItemRepository::new(connection),
            fetcher: Fetcher::new(FetcherConfig {
                timeout: DOWNLOAD_TIMEOUT,
                ..FetcherConfig::default()
            }),
            source_locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, source_id: &Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.source_locks.lock().expect("source lock map poisoned");
        locks
            .entry(*source_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Download the source's XMLTV document into a temp file, transparently
    /// handling gzip. The file is removed when the handle drops.
    async fn download_to_temp(&self, source: &epg_sources::Model) -> Result<tempfile::NamedTempFile> {
        info!(
            "Fetching XMLTV data from: {}",
            UrlUtils::obfuscate_credentials(&source.xmltv_url)
        );
        let raw = self
            .fetcher
            .get_bytes(&source.xmltv_url, Some(DOWNLOAD_TIMEOUT))
            .await
            .with_context(|| format!("XMLTV download failed for source '{}'", source.name))?;
        let content = maybe_gunzip(raw)?;

        let mut file = tempfile::NamedTempFile::with_prefix("xmltv_")?;
        file.write_all(&content)?;
        Ok(file)
    }

    /// Ingest one source. Channels are upserted; all programs of the source
    /// are purged and reloaded within the configured window.
    pub async fn sync_source(&self, source_id: &Uuid, options: &EpgSyncOptions) -> Result<EpgSyncReport> {
        let source = self
            .epg
            .find_source(source_id)
            .await?
            .with_context(|| format!("EPG source {source_id} not found"))?;

        let temp = self.download_to_temp(&source).await?;
        let content = std::fs::read_to_string(temp.path())?;
        let document = parse_xmltv(&content).map_err(|e| anyhow::anyhow!(e.to_string()))?;

        let mut report = self.apply_document(&source, &document, options).await?;

        info!(
            source = %source.name,
            purged = report.purged_programs,
            channels_new = report.channels_new,
            programs = report.programs_new,
            "EPG ingest complete"
        );

        if let Some(provider_id) = options.auto_map_provider_id {
            match self
                .auto_match(
                    &provider_id,
                    &source.id,
                    options.auto_map_approved_only,
                    options.auto_map_min_score,
                )
                .await
            {
                Ok(auto_map) => report.auto_map = Some(auto_map),
                Err(error) => {
                    warn!(source = %source.name, %error, "EPG auto-match failed");
                }
            }
        }

        Ok(report)
    }

    /// Materialize a parsed document: purge the source's programs, upsert
    /// channels, and insert programs clipped to the window.
    pub async fn apply_document(
        &self,
        source: &epg_sources::Model,
        document: &crate::utils::xmltv::XmltvDocument,
        options: &EpgSyncOptions,
    ) -> Result<EpgSyncReport> {
        let now = Utc::now();
        let window_start = now - chrono::Duration::hours(6);
        let window_end = now + chrono::Duration::hours(options.hours.clamp(1, 168));

        let lock = self.lock_for(&source.id);
        let _guard = lock.lock().await;

        let library_desc = if options.enrich_missing_desc {
            self.build_library_desc_map(options.max_desc_len).await?
        } else {
            HashMap::new()
        };

        let mut channel_map: HashMap<String, epg_channels::Model> = self
            .epg
            .channels_for_source(&source.id)
            .await?
            .into_iter()
            .map(|c| (c.xmltv_id.clone(), c))
            .collect();

        let purged_programs = self.epg.purge_programs(&source.id).await?;

        let mut report = EpgSyncReport {
            source_id: source.id,
            window_start,
            window_end,
            purged_programs,
            channels_new: 0,
            channels_updated: 0,
            programs_new: 0,
            auto_map: None,
        };

        for channel in &document.channels {
            let display = channel
                .display_name
                .clone()
                .unwrap_or_else(|| channel.id.clone());
            match channel_map.get(&channel.id) {
                Some(existing) => {
                    if existing.display_name != display || existing.icon_url.as_deref() != channel.icon.as_deref()
                    {
                        let updated = self
                            .epg
                            .update_channel_meta(existing.clone(), &display, channel.icon.as_deref())
                            .await?;
                        channel_map.insert(channel.id.clone(), updated);
                        report.channels_updated += 1;
                    }
                }
                None => {
                    let created = self
                        .epg
                        .insert_channel(&source.id, &channel.id, &display, channel.icon.as_deref())
                        .await?;
                    channel_map.insert(channel.id.clone(), created);
                    report.channels_new += 1;
                }
            }
        }

        // The unique key is (channel, start); the first occurrence in the
        // document wins.
        let mut seen_programs: HashSet<(Uuid, DateTime<Utc>)> = HashSet::new();

        for programme in &document.programmes {
            let Ok(start) = parse_xmltv_datetime(&programme.start) else {
                continue;
            };
            let stop = match programme.stop.as_deref().map(parse_xmltv_datetime) {
                Some(Ok(stop)) => stop,
                _ => continue,
            };
            if !within_window(start, stop, window_start, window_end) {
                continue;
            }

            let title = programme.title.clone().unwrap_or_else(|| "Untitled".to_string());
            let mut description = programme.description.clone();
            if description.as_deref().map_or(true, |d| d.trim().is_empty()) {
                if let Some(found) = library_desc.get(&title_key(&title)) {
                    description = Some(found.clone());
                }
            }

            let channel_id = match channel_map.get(&programme.channel) {
                Some(channel) => channel.id,
                None => {
                    // Programme for a channel the document never declared;
                    // create a stub named by its xmltv id.
                    let created = self
                        .epg
                        .insert_channel(&source.id, &programme.channel, &programme.channel, None)
                        .await?;
                    let id = created.id;
                    channel_map.insert(programme.channel.clone(), created);
                    report.channels_new += 1;
                    id
                }
            };

            if !seen_programs.insert((channel_id, start)) {
                continue;
            }

            self.epg
                .insert_program(
                    &source.id,
                    &channel_id,
                    start,
                    stop,
                    &title,
                    description.as_deref(),
                    programme.category.as_deref(),
                )
                .await?;
            report.programs_new += 1;
        }

        self.epg.touch_source(&source.id).await?;

        Ok(report)
    }

    /// Fuzzy-bind a provider's live streams to this source's channels.
    /// Streams bound to a different source are never touched.
    pub async fn auto_match(
        &self,
        provider_id: &Uuid,
        source_id: &Uuid,
        approved_only: bool,
        min_score: f64,
    ) -> Result<AutoMapReport> {
        let candidates = self.epg.match_candidates(source_id).await?;
        let streams = self
            .live
            .list_for_automatch(provider_id, approved_only, AUTO_MAP_STREAM_LIMIT)
            .await?;

        let mut report = AutoMapReport {
            matched: 0,
            updated: 0,
            skipped_other_source: 0,
            total_streams_processed: streams.len(),
            min_score,
        };

        for stream in streams {
            match stream.epg_source_id {
                Some(bound) if bound != *source_id => {
                    report.skipped_other_source += 1;
                    continue;
                }
                Some(_) if stream.epg_channel_id.as_deref().is_some_and(|id| !id.is_empty()) => {
                    continue;
                }
                _ => {}
            }

            let name_for_match = stream
                .normalized_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| stream.name.clone());
            if name_for_match.trim().is_empty() {
                continue;
            }

            let Some((xmltv_id, _display, _score)) =
                best_match(&name_for_match, &candidates, min_score)
            else {
                continue;
            };

            report.matched += 1;
            let xmltv_id = xmltv_id.to_string();
            self.live.bind_epg(stream, source_id, &xmltv_id).await?;
            report.updated += 1;
        }

        Ok(report)
    }

    /// Sync every active source sequentially, isolating failures.
    pub async fn sync_all_active(&self, options: &EpgSyncOptions) -> Result<usize> {
        let sources = self.epg.list_active_sources().await?;
        let mut synced = 0;
        for source in sources {
            match self.sync_source(&source.id, options).await {
                Ok(_) => synced += 1,
                Err(error) => {
                    warn!(source = %source.name, %error, "EPG auto-sync failed for source");
                }
            }
        }
        Ok(synced)
    }

    /// Description lookup table: cleaned casefolded title to overview. Keys
    /// are tried as normalized name, metadata title, then raw name; the
    /// first writer of a key wins.
    async fn build_library_desc_map(&self, max_len: usize) -> Result<HashMap<String, String>> {
        let mut map: HashMap<String, String> = HashMap::new();

        let mut add_rows = |rows: Vec<(String, Option<String>, Option<String>, String)>| {
            for (name, normalized, tmdb_title, overview) in rows {
                let overview = overview.trim().to_string();
                if overview.is_empty() {
                    continue;
                }
                let clipped = clip(&overview, max_len);
                for key_source in [normalized.as_deref(), tmdb_title.as_deref(), Some(name.as_str())]
                    .into_iter()
                    .flatten()
                {
                    let key = title_key(key_source);
                    if !key.is_empty() {
                        map.entry(key).or_insert_with(|| clipped.clone());
                    }
                }
            }
        };

        add_rows(self.vod.library_overviews().await?);
        add_rows(self.series.library_overviews().await?);
        Ok(map)
    }
}

/// Window membership for a programme. Both edges are exclusive: a programme
/// ending exactly at the window start or starting exactly at the window end
/// is dropped, as is anything with a non-positive duration.
fn within_window(
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> bool {
    stop > start && stop > window_start && start < window_end
}

fn clip(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    text.chars().take(max_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_edges_are_exclusive() {
        let ws = Utc::now();
        let we = ws + chrono::Duration::hours(36);
        let hour = chrono::Duration::hours(1);

        // fully inside
        assert!(within_window(ws + hour, ws + hour * 2, ws, we));
        // stop exactly at window start: excluded
        assert!(!within_window(ws - hour, ws, ws, we));
        // start exactly at window end: excluded
        assert!(!within_window(we, we + hour, ws, we));
        // straddling an edge: included
        assert!(within_window(ws - hour, ws + hour, ws, we));
        assert!(within_window(we - hour, we + hour, ws, we));
        // zero or negative duration: excluded
        assert!(!within_window(ws + hour, ws + hour, ws, we));
        assert!(!within_window(ws + hour * 2, ws + hour, ws, we));
    }

    #[test]
    fn clip_limits_by_characters() {
        assert_eq!(clip("abcdef", 4), "abcd");
        assert_eq!(clip("abc", 4), "abc");
    }
}
