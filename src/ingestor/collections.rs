//! Collection cache engine
//!
//! Serves curated home-screen rows from a `(collection, page)` cache with
//! stale-while-revalidate semantics, and augments payloads at view time
//! with locally available content. Upstream failures degrade to an empty
//! payload; the home screen never sees an error.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::Database;
use crate::database::repositories::{
    CollectionRepository, ProviderRepository, SeriesItemRepository, TmdbConfigRepository,
    VodStreamRepository,
};
use crate::entities::collections;
use crate::errors::{ErrorKind, FetchError};
use crate::tmdb::browse::resolve_browse;
use crate::tmdb::client::TMDB_BASE;
use crate::utils::http::{Fetcher, FetcherConfig};
use crate::utils::rate_limit::SlotPacer;
use crate::utils::url::movie_stream_url;

const CAST_LIMIT: usize = 10;

/// Seam between the cache engine and the metadata API, so the serving and
/// refresh logic is testable without HTTP.
#[async_trait]
pub trait BrowsePayloadSource: Send + Sync {
    async fn fetch(&self, collection: &collections::Model, page: u32) -> Result<Value, FetchError>;
}

/// Production payload source: resolves the browse call and executes it
/// against the metadata API with stored credentials.
pub struct TmdbPayloadSource {
    config: TmdbConfigRepository,
    fetcher: Fetcher,
    pacer: SlotPacer,
}

impl TmdbPayloadSource {
    pub fn new(database: &Database) -> Self {
        Self {
            config: TmdbConfigRepository::new(database.connection()),
            fetcher: Fetcher::new(FetcherConfig::default()),
            pacer: SlotPacer::new(5),
        }
    }
}

#[async_trait]
impl BrowsePayloadSource for TmdbPayloadSource {
    async fn fetch(&self, collection: &collections::Model, page: u32) -> Result<Value, FetchError> {
        let config = self
            .config
            .get_or_create()
            .await
            .map_err(|e| FetchError::new(ErrorKind::Unknown, e.to_string()))?;
        if !TmdbConfigRepository::is_usable(&config) {
            return Err(FetchError::invalid(
                "metadata API is disabled or has no credentials",
            ));
        }

        let language = config.language.clone().unwrap_or_else(|| "en-US".to_string());
        let call = resolve_browse(
            &collection.source_type,
            collection.source_id,
            collection.filters.as_ref(),
            page,
            &language,
        )?;

        let mut params = call.params;
        let mut headers: Vec<(String, String)> = Vec::new();
        match (&config.read_access_token, &config.api_key) {
            (Some(token), _) if !token.is_empty() => {
                headers.push(("Authorization".to_string(), format!("Bearer {token}")));
            }
            (_, Some(api_key)) if !api_key.is_empty() => {
                params.push(("api_key".to_string(), api_key.clone()));
            }
            _ => {}
        }

        self.pacer.wait().await;
        self.fetcher
            .get_json(&format!("{TMDB_BASE}{}", call.path), &params, &headers, None)
            .await
    }
}

#[derive(Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    tmdb_errors: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub tmdb_errors: u64,
}

impl CacheMetrics {
    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            tmdb_errors: self.tmdb_errors.load(Ordering::Relaxed),
        }
    }
}

/// One served page.
#[derive(Debug, Clone, Serialize)]
pub struct ServedPage {
    pub collection_id: Uuid,
    pub page: i32,
    pub payload: Value,
    pub expires_at: Option<DateTime<Utc>>,
    pub cached: bool,
    pub stale: bool,
}

pub struct CollectionCacheEngine {
    collections: CollectionRepository,
    vod: VodStreamRepository,
    series: SeriesItemRepository,
    providers: ProviderRepository,
    payload_source: Arc<dyn BrowsePayloadSource>,
    metrics: CacheMetrics,
}

impl CollectionCacheEngine {
    pub fn new(database: &Database) -> Self {
        Self::with_payload_source(database, Arc::new(TmdbPayloadSource::new(database)))
    }

    pub fn with_payload_source(
        database: &Database,
        payload_source: Arc<dyn BrowsePayloadSource>,
    ) -> Self {
        let connection = database.connection();
        Self {
            collections: CollectionRepository::new(connection.clone()),
            vod: VodStreamRepository::new(connection.clone()),
            series: SeriesItemRepository::new(connection.clone()),
            providers: ProviderRepository::new(connection),
            payload_source,
            metrics: CacheMetrics::default(),
        }
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Serve one page of a collection.
    ///
    /// Fresh cache hits return immediately. An expired entry is either
    /// served stale with a background refresh (when the caller opts in) or
    /// refreshed inline. Upstream failures return an empty payload.
    pub async fn items(
        self: &Arc<Self>,
        identifier: &str,
        page: u32,
        stale_while_revalidate: bool,
    ) -> Result<ServedPage> {
        let collection = self
            .collections
            .find_by_identifier(identifier)
            .await?
            .with_context(|| format!("collection '{identifier}' not found"))?;
        anyhow::ensure!(collection.enabled, "collection '{}' is disabled", collection.slug);

        let page = page.max(1);
        let now = Utc::now();
        let cache = self.collections.get_cache(&collection.id, page as i32).await?;

        if let Some(cache) = &cache {
            if cache.expires_at > now {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(ServedPage {
                    collection_id: collection.id,
                    page: cache.page,
                    payload: self.augment_payload(cache.payload.clone()).await?,
                    expires_at: Some(cache.expires_at),
                    cached: true,
                    stale: false,
                });
            }

            self.metrics.expired.fetch_add(1, Ordering::Relaxed);
            if stale_while_revalidate {
                let engine = self.clone();
                let collection_id = collection.id;
                tokio::spawn(async move {
                    if let Err(error) = engine.refresh_entry(&collection_id, page as i32).await {
                        warn!(%collection_id, page, %error, "background refresh failed");
                    }
                });
                return Ok(ServedPage {
                    collection_id: collection.id,
                    page: cache.page,
                    payload: self.augment_payload(cache.payload.clone()).await?,
                    expires_at: Some(cache.expires_at),
                    cached: true,
                    stale: true,
                });
            }
        } else {
            self.metrics.misses.fetch_add(1, Ordering::Relaxed);
        }

        let payload = match self.payload_source.fetch(&collection, page).await {
            Ok(payload) => payload,
            Err(error) => {
                self.metrics.tmdb_errors.fetch_add(1, Ordering::Relaxed);
                warn!(collection = %collection.slug, page, %error, "collection fetch failed");
                return Ok(ServedPage {
                    collection_id: collection.id,
                    page: page as i32,
                    payload: Value::Object(Default::default()),
                    expires_at: None,
                    cached: false,
                    stale: false,
                });
            }
        };

        let cache = self
            .collections
            .upsert_cache(&collection, page as i32, payload, now)
            .await?;

        Ok(ServedPage {
            collection_id: collection.id,
            page: cache.page,
            payload: self.augment_payload(cache.payload).await?,
            expires_at: Some(cache.expires_at),
            cached: false,
            stale: false,
        })
    }

    /// Refresh one cache entry from upstream.
    pub async fn refresh_entry(&self, collection_id: &Uuid, page: i32) -> Result<()> {
        let Some(collection) = self.collections.find_by_id(collection_id).await? else {
            return Ok(());
        };
        if !collection.enabled {
            return Ok(());
        }
        let payload = match self.payload_source.fetch(&collection, page.max(1) as u32).await {
            Ok(payload) => payload,
            Err(error) => {
                self.metrics.tmdb_errors.fetch_add(1, Ordering::Relaxed);
                return Err(error.into());
            }
        };
        self.collections
            .upsert_cache(&collection, page, payload, Utc::now())
            .await?;
        Ok(())
    }

    /// Sweep job: refresh every expired entry of an enabled collection.
    /// Per-row failures are isolated.
    pub async fn refresh_expired(&self) -> Result<(usize, usize)> {
        let entries = self.collections.expired_entries(Utc::now()).await?;
        let mut refreshed = 0;
        let mut failed = 0;
        for (cache, collection) in entries {
            match self.refresh_entry(&collection.id, cache.page).await {
                Ok(()) => refreshed += 1,
                Err(error) => {
                    failed += 1;
                    warn!(
                        collection = %collection.slug,
                        page = cache.page,
                        %error,
                        "sweep refresh failed"
                    );
                }
            }
        }
        if refreshed > 0 || failed > 0 {
            info!(refreshed, failed, "collection cache sweep complete");
        }
        Ok((refreshed, failed))
    }

    /// Join payload items against the local catalog. Items with a local,
    /// active, synced counterpart gain a stream URL and local fields;
    /// everything else is omitted so the home screen only shows playable
    /// content.
    async fn augment_payload(&self, payload: Value) -> Result<Value> {
        let Value::Object(mut map) = payload else {
            return Ok(payload);
        };

        let items_key = if map.get("results").is_some_and(Value::is_array) {
            "results"
        } else if map.get("parts").is_some_and(Value::is_array) {
            "parts"
        } else {
            return Ok(Value::Object(map));
        };

        let items = map
            .get(items_key)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let tmdb_ids: Vec<i32> = items
            .iter()
            .filter_map(|item| item.get("id").and_then(Value::as_i64))
            .filter_map(|id| i32::try_from(id).ok())
            .collect();
        if tmdb_ids.is_empty() {
            map.insert(items_key.to_string(), Value::Array(Vec::new()));
            return Ok(Value::Object(map));
        }

        let vod_rows = self.vod.find_active_synced_by_tmdb_ids(&tmdb_ids).await?;
        let series_rows = self.series.find_active_synced_by_tmdb_ids(&tmdb_ids).await?;

        let mut providers = std::collections::HashMap::new();
        for row in &vod_rows {
            if !providers.contains_key(&row.provider_id) {
                if let Some(provider) = self.providers.find_by_id(&row.provider_id).await? {
                    providers.insert(row.provider_id, provider);
                }
            }
        }

        let vod_by_tmdb: std::collections::HashMap<i32, _> = vod_rows
            .into_iter()
            .filter_map(|row| row.tmdb_id.map(|id| (id, row)))
            .collect();
        let series_by_tmdb: std::collections::HashMap<i32, _> = series_rows
            .into_iter()
            .filter_map(|row| row.tmdb_id.map(|id| (id, row)))
            .collect();

        let mut filtered = Vec::new();
        for item in items {
            let Some(tmdb_id) = item
                .get("id")
                .and_then(Value::as_i64)
                .and_then(|id| i32::try_from(id).ok())
            else {
                continue;
            };

            if let Some(vod) = vod_by_tmdb.get(&tmdb_id) {
                let Some(provider) = providers.get(&vod.provider_id) else {
                    continue;
                };
                let mut enriched = item.clone();
                let object = enriched.as_object_mut().expect("payload items are objects");
                object.insert("vod_id".to_string(), Value::String(vod.id.to_string()));
                object.insert(
                    "stream_url".to_string(),
                    Value::String(movie_stream_url(
                        &provider.base_url,
                        &provider.username,
                        &provider.password,
                        vod.provider_stream_id,
                        vod.container_extension.as_deref(),
                    )),
                );
                object.insert(
                    "tmdb_vote_average".to_string(),
                    vod.tmdb_vote_average
                        .and_then(|v| serde_json::Number::from_f64(v).map(Value::Number))
                        .unwrap_or(Value::Null),
                );
                object.insert(
                    "tmdb_original_language".to_string(),
                    vod.tmdb_raw
                        .as_ref()
                        .and_then(|raw| raw.get("original_language"))
                        .cloned()
                        .unwrap_or(Value::Null),
                );
                object.insert("tmdb_cast".to_string(), Value::Array(cast_names(vod.tmdb_raw.as_ref())));
                filtered.push(enriched);
                continue;
            }

            if let Some(series) = series_by_tmdb.get(&tmdb_id) {
                let mut enriched = item.clone();
                let object = enriched.as_object_mut().expect("payload items are objects");
                object.insert("vod_id".to_string(), Value::String(series.id.to_string()));
                object.insert("content_type".to_string(), Value::String("series".to_string()));
                filtered.push(enriched);
            }
        }

        map.insert(items_key.to_string(), Value::Array(filtered));
        Ok(Value::Object(map))
    }
}

fn cast_names(raw: Option<&Value>) -> Vec<Value> {
    raw.and_then(|raw| raw.get("credits"))
        .and_then(|credits| credits.get("cast"))
        .and_then(Value::as_array)
        .map(|cast| {
            cast.iter()
                .filter_map(|member| member.get("name").and_then(Value::as_str))
                .take(CAST_LIMIT)
                .map(|name| Value::String(name.to_string()))
                .collect()
        })
        .unwrap_or_default()
}
