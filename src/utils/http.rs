//! Retrying HTTP fetcher with response classification
//!
//! Every upstream call in the service goes through [`Fetcher`]. A response is
//! classified into an [`ErrorKind`]; retryable kinds are retried with
//! jittered exponential backoff (429 honors `Retry-After`), everything else
//! surfaces immediately. Counters are kept per origin and exposed through
//! run metrics and the status reports.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{ErrorKind, FetchError};
use crate::utils::jitter::generate_jitter_ms;
use crate::utils::url::UrlUtils;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const MAX_JITTER_MS: u64 = 1500;

/// Request counters for one external origin.
#[derive(Default)]
pub struct OriginMetrics {
    requests_total: AtomicU64,
    retry_total: AtomicU64,
    rate_limited: AtomicU64,
    retry_by_kind: Mutex<HashMap<ErrorKind, u64>>,
}

impl OriginMetrics {
    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self, kind: ErrorKind) {
        self.retry_total.fetch_add(1, Ordering::Relaxed);
        if kind == ErrorKind::RateLimited {
            self.rate_limited.fetch_add(1, Ordering::Relaxed);
        }
        let mut by_kind = self.retry_by_kind.lock().expect("metrics lock poisoned");
        *by_kind.entry(kind).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> OriginMetricsSnapshot {
        let by_kind = self.retry_by_kind.lock().expect("metrics lock poisoned");
        OriginMetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            retry_total: self.retry_total.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            retry_by_kind: by_kind
                .iter()
                .map(|(kind, count)| (kind.to_string(), *count))
                .collect(),
        }
    }
}

/// Point-in-time copy of [`OriginMetrics`], suitable for reports.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OriginMetricsSnapshot {
    pub requests_total: u64,
    pub retry_total: u64,
    pub rate_limited: u64,
    pub retry_by_kind: HashMap<String, u64>,
}

/// Fetcher tuning knobs.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            user_agent: format!("catalogd/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP GET with classification and retry. One instance per external origin,
/// shared by every task talking to that origin.
pub struct Fetcher {
    client: Client,
    config: FetcherConfig,
    metrics: std::sync::Arc<OriginMetrics>,
}

impl Fetcher {
    pub fn new(config: FetcherConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&config.user_agent)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            config,
            metrics: std::sync::Arc::new(OriginMetrics::default()),
        }
    }

    pub fn metrics(&self) -> std::sync::Arc<OriginMetrics> {
        self.metrics.clone()
    }

    /// GET a JSON document. `timeout` overrides the configured default for
    /// bulk listings and similar slow endpoints.
    pub async fn get_json(
        &self,
        url: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
        timeout: Option<Duration>,
    ) -> Result<Value, FetchError> {
        let bytes = self.get_with_retry(url, params, headers, timeout).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            FetchError::invalid(format!(
                "non-JSON response from {}: {e}",
                UrlUtils::obfuscate_credentials(url)
            ))
        })
    }

    /// GET a raw document (XMLTV downloads).
    pub async fn get_bytes(&self, url: &str, timeout: Option<Duration>) -> Result<Vec<u8>, FetchError> {
        self.get_with_retry(url, &[], &[], timeout).await
    }

    async fn get_with_retry(
        &self,
        url: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, FetchError> {
        let timeout = timeout.unwrap_or(self.config.timeout);
        let mut backoff = Duration::from_secs(1);
        let mut last_error = FetchError::new(ErrorKind::Unknown, "no attempts made");

        for attempt in 1..=self.config.max_attempts {
            self.metrics.record_request();

            let (error, retry_after) = match self.send(url, params, headers, timeout).await {
                Ok(response) => match Self::classify_status(response.status()) {
                    ErrorKind::Ok => {
                        return response.bytes().await.map(|b| b.to_vec()).map_err(|e| {
                            FetchError::new(
                                ErrorKind::Network,
                                format!("failed to read response body: {e}"),
                            )
                        });
                    }
                    kind => {
                        let retry_after = Self::retry_after(&response);
                        let status = response.status();
                        (
                            FetchError::new(
                                kind,
                                format!(
                                    "HTTP {} from {}",
                                    status,
                                    UrlUtils::obfuscate_credentials(url)
                                ),
                            ),
                            retry_after,
                        )
                    }
                },
                Err(error) => (error, None),
            };

            if !error.kind.is_retryable() || attempt == self.config.max_attempts {
                return Err(error);
            }

            let cap = error.kind.backoff_cap();
            let base = match (error.kind, retry_after) {
                (ErrorKind::RateLimited, Some(after)) => after,
                _ => backoff,
            };
            let delay = base.min(cap) + Duration::from_millis(generate_jitter_ms(MAX_JITTER_MS));
            warn!(
                kind = %error.kind,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "retrying {}",
                UrlUtils::obfuscate_credentials(url)
            );
            self.metrics.record_retry(error.kind);
            last_error = error;
            tokio::time::sleep(delay).await;
            backoff = (backoff * 2).min(cap);
        }

        Err(last_error)
    }

    async fn send(
        &self,
        url: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<Response, FetchError> {
        let mut request = self.client.get(url).timeout(timeout);
        if !params.is_empty() {
            request = request.query(params);
        }
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        debug!("GET {}", UrlUtils::obfuscate_credentials(url));
        request.send().await.map_err(|e| {
            let kind = if e.is_timeout() {
                ErrorKind::Timeout
            } else {
                ErrorKind::Network
            };
            let message = UrlUtils::obfuscate_credentials(&e.to_string());
            FetchError::new(kind, message)
        })
    }

    fn classify_status(status: StatusCode) -> ErrorKind {
        match status.as_u16() {
            200..=299 => ErrorKind::Ok,
            429 => ErrorKind::RateLimited,
            401 | 403 => ErrorKind::Auth,
            404 => ErrorKind::NotFound,
            400 => ErrorKind::Invalid,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Unknown,
        }
    }

    fn retry_after(response: &Response) -> Option<Duration> {
        response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}
