//! TMDB API client
//!
//! Wraps the retrying fetcher with bearer/api-key authentication and the
//! shared token-bucket limiter for the metadata origin. The genre list and
//! the API configuration are cached in-process for 24 hours behind a lock.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::entities::tmdb_config;
use crate::errors::FetchError;
use crate::models::ContentKind;
use crate::utils::http::Fetcher;
use crate::utils::rate_limit::TokenBucket;

pub const TMDB_BASE: &str = "https://api.themoviedb.org/3";
const LOOKUP_CACHE_TTL: Duration = Duration::from_secs(24 * 3600);

/// Credential material resolved from the stored configuration. The bearer
/// token wins over the api key when both are present.
#[derive(Debug, Clone, Default)]
pub struct TmdbCredentials {
    pub token: Option<String>,
    pub api_key: Option<String>,
    pub language: String,
    pub region: String,
}

impl TmdbCredentials {
    pub fn from_config(config: &tmdb_config::Model) -> Self {
        Self {
            token: config.read_access_token.clone().filter(|t| !t.is_empty()),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            language: config.language.clone().unwrap_or_else(|| "en-US".to_string()),
            region: config.region.clone().unwrap_or_else(|| "US".to_string()),
        }
    }
}

struct CachedLookup {
    payload: Value,
    fetched_at: Instant,
}

pub struct TmdbClient {
    fetcher: Fetcher,
    bucket: TokenBucket,
    credentials: TmdbCredentials,
    genre_cache: Mutex<HashMap<String, CachedLookup>>,
    config_cache: Mutex<Option<CachedLookup>>,
}

impl TmdbClient {
    pub fn new(fetcher: Fetcher, credentials: TmdbCredentials, rps: u32, burst: u32) -> Self {
        Self {
            fetcher,
            bucket: TokenBucket::new(rps, burst),
            credentials,
            genre_cache: Mutex::new(HashMap::new()),
            config_cache: Mutex::new(None),
        }
    }

    pub fn language(&self) -> &str {
        &self.credentials.language
    }

    pub fn region(&self) -> &str {
        &self.credentials.region
    }

    pub fn metrics(&self) -> std::sync::Arc<crate::utils::http::OriginMetrics> {
        self.fetcher.metrics()
    }

    /// Rate-limited authenticated GET against the API.
    pub async fn get_json(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Value, FetchError> {
        let url = format!("{TMDB_BASE}{path}");

        let mut all_params: Vec<(String, String)> = params.to_vec();
        let mut headers: Vec<(String, String)> = Vec::new();
        if let Some(token) = &self.credentials.token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        } else if let Some(api_key) = &self.credentials.api_key {
            all_params.push(("api_key".to_string(), api_key.clone()));
        }

        self.bucket.acquire().await;
        self.fetcher.get_json(&url, &all_params, &headers, None).await
    }

    /// Search for a movie or series title, with optional year hint. Movies
    /// also pass the configured region.
    pub async fn search(
        &self,
        kind: ContentKind,
        query: &str,
        year: Option<i32>,
    ) -> Result<Vec<Value>, FetchError> {
        let path = match kind {
            ContentKind::Movie => "/search/movie",
            ContentKind::Series => "/search/tv",
        };
        let mut params = vec![
            ("query".to_string(), query.to_string()),
            ("language".to_string(), self.credentials.language.clone()),
        ];
        match kind {
            ContentKind::Movie => {
                params.push(("region".to_string(), self.credentials.region.clone()));
                if let Some(year) = year {
                    params.push(("year".to_string(), year.to_string()));
                }
            }
            ContentKind::Series => {
                if let Some(year) = year {
                    params.push(("first_air_date_year".to_string(), year.to_string()));
                }
            }
        }

        let value = self.get_json(path, &params).await?;
        Ok(value
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Fetch the full detail document for an id, with the sub-resources the
    /// hydration step consumes appended.
    pub async fn detail(&self, kind: ContentKind, tmdb_id: i32) -> Result<Value, FetchError> {
        let (path, append) = match kind {
            ContentKind::Movie => (
                format!("/movie/{tmdb_id}"),
                "credits,videos,images,release_dates",
            ),
            ContentKind::Series => (
                format!("/tv/{tmdb_id}"),
                "credits,videos,images,content_ratings",
            ),
        };
        let params = vec![
            ("language".to_string(), self.credentials.language.clone()),
            ("append_to_response".to_string(), append.to_string()),
        ];
        self.get_json(&path, &params).await
    }

    /// Genre list for a kind, cached for 24 hours per language.
    pub async fn genres(&self, kind: ContentKind) -> Result<Value, FetchError> {
        let api_kind = match kind {
            ContentKind::Movie => "movie",
            ContentKind::Series => "tv",
        };
        let cache_key = format!("{api_kind}:{}", self.credentials.language);
        {
            let cache = self.genre_cache.lock().expect("genre cache lock poisoned");
            if let Some(entry) = cache.get(&cache_key) {
                if entry.fetched_at.elapsed() < LOOKUP_CACHE_TTL {
                    return Ok(entry.payload.clone());
                }
            }
        }

        let params = vec![("language".to_string(), self.credentials.language.clone())];
        let payload = self.get_json(&format!("/genre/{api_kind}/list"), &params).await?;

        let mut cache = self.genre_cache.lock().expect("genre cache lock poisoned");
        cache.insert(
            cache_key,
            CachedLookup {
                payload: payload.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(payload)
    }

    /// API configuration document (image base URLs etc.), cached 24 hours.
    pub async fn configuration(&self) -> Result<Value, FetchError> {
        {
            let cache = self.config_cache.lock().expect("config cache lock poisoned");
            if let Some(entry) = cache.as_ref() {
                if entry.fetched_at.elapsed() < LOOKUP_CACHE_TTL {
                    return Ok(entry.payload.clone());
                }
            }
        }

        let payload = self.get_json("/configuration", &[]).await?;
        let mut cache = self.config_cache.lock().expect("config cache lock poisoned");
        *cache = Some(CachedLookup {
            payload: payload.clone(),
            fetched_at: Instant::now(),
        });
        Ok(payload)
    }
}
