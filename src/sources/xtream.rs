//! Xtream-style catalog client
//!
//! Thin adapter over the retrying fetcher for the provider query protocol:
//! `GET {base}/player_api.php?username=&password=&action=...`. Responses are
//! weakly typed JSON; only the fields the sync engines consume are
//! extracted here, ids tolerating both string and integer encodings.

use std::time::Duration;

use serde_json::Value;

use crate::database::repositories::series_item::{EpisodeUpsert, SeasonUpsert};
use crate::errors::FetchError;
use crate::models::{CategoryKind, LiveChannelUpsert, SeriesUpsert, VodUpsert};
use crate::utils::http::Fetcher;
use crate::utils::url::UrlUtils;

/// Timeout for bulk stream listings; some panels take minutes to emit a
/// full VOD category.
const BULK_TIMEOUT: Duration = Duration::from_secs(120);

pub struct XtreamClient<'a> {
    fetcher: &'a Fetcher,
    base_url: String,
    username: String,
    password: String,
}

impl<'a> XtreamClient<'a> {
    pub fn new(fetcher: &'a Fetcher, base_url: &str, username: &str, password: &str) -> Self {
        Self {
            fetcher,
            base_url: UrlUtils::sanitize(base_url),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    fn api_url(&self) -> String {
        format!("{}/player_api.php", self.base_url)
    }

    async fn get(
        &self,
        action: &str,
        extra: &[(&str, String)],
        timeout: Option<Duration>,
    ) -> Result<Value, FetchError> {
        let mut params = vec![
            ("username".to_string(), self.username.clone()),
            ("password".to_string(), self.password.clone()),
            ("action".to_string(), action.to_string()),
        ];
        for (key, value) in extra {
            params.push((key.to_string(), value.clone()));
        }
        self.fetcher.get_json(&self.api_url(), &params, &[], timeout).await
    }

    /// List categories of one kind as `(ext_id, name)` pairs.
    pub async fn get_categories(&self, kind: CategoryKind) -> Result<Vec<(i32, String)>, FetchError> {
        let action = match kind {
            CategoryKind::Live => "get_live_categories",
            CategoryKind::Vod => "get_vod_categories",
            CategoryKind::Series => "get_series_categories",
        };
        let value = self.get(action, &[], None).await?;
        let items = expect_list(value)?;
        let mut categories = Vec::with_capacity(items.len());
        for item in items {
            let Some(ext_id) = int_field(&item, "category_id") else {
                continue;
            };
            let name = str_field(&item, "category_name")
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| format!("Category {ext_id}"));
            categories.push((ext_id, name));
        }
        Ok(categories)
    }

    pub async fn get_live_streams(
        &self,
        category_ext_id: i32,
    ) -> Result<Vec<LiveChannelUpsert>, FetchError> {
        let value = self
            .get(
                "get_live_streams",
                &[("category_id", category_ext_id.to_string())],
                None,
            )
            .await?;
        let items = expect_list(value)?;
        let mut channels = Vec::with_capacity(items.len());
        for item in items {
            let Some(ext_id) = int_field(&item, "stream_id") else {
                continue;
            };
            channels.push(LiveChannelUpsert {
                ext_id,
                name: str_field(&item, "name")
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| format!("Live {ext_id}")),
                icon: str_field(&item, "stream_icon"),
                epg_channel_id: str_field(&item, "epg_channel_id"),
            });
        }
        Ok(channels)
    }

    pub async fn get_vod_streams(&self, category_ext_id: i32) -> Result<Vec<VodUpsert>, FetchError> {
        let value = self
            .get(
                "get_vod_streams",
                &[("category_id", category_ext_id.to_string())],
                Some(BULK_TIMEOUT),
            )
            .await?;
        let items = expect_list(value)?;
        let mut streams = Vec::with_capacity(items.len());
        for item in items {
            let Some(ext_id) = int_field(&item, "stream_id") else {
                continue;
            };
            let tmdb_id = int_field(&item, "tmdb_id")
                .or_else(|| int_field(&item, "tmdb"))
                .filter(|id| *id > 0);
            streams.push(VodUpsert {
                ext_id,
                name: str_field(&item, "name")
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| format!("VOD {ext_id}")),
                icon: str_field(&item, "stream_icon"),
                container_extension: str_field(&item, "container_extension"),
                rating: str_field(&item, "rating"),
                added: str_field(&item, "added"),
                tmdb_id,
            });
        }
        Ok(streams)
    }

    pub async fn get_series(&self, category_ext_id: i32) -> Result<Vec<SeriesUpsert>, FetchError> {
        let value = self
            .get(
                "get_series",
                &[("category_id", category_ext_id.to_string())],
                None,
            )
            .await?;
        let items = expect_list(value)?;
        let mut series = Vec::with_capacity(items.len());
        for item in items {
            let Some(ext_id) = int_field(&item, "series_id") else {
                continue;
            };
            series.push(SeriesUpsert {
                ext_id,
                name: str_field(&item, "name")
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| format!("Series {ext_id}")),
                cover: str_field(&item, "cover").or_else(|| str_field(&item, "stream_icon")),
            });
        }
        Ok(series)
    }

    /// Fetch one series' seasons and episodes.
    pub async fn get_series_info(
        &self,
        series_ext_id: i32,
    ) -> Result<(Vec<SeasonUpsert>, Vec<EpisodeUpsert>), FetchError> {
        let value = self
            .get(
                "get_series_info",
                &[("series_id", series_ext_id.to_string())],
                None,
            )
            .await?;
        let Some(object) = value.as_object() else {
            return Err(FetchError::invalid("unexpected format (expected object)"));
        };

        let mut seasons = Vec::new();
        if let Some(raw_seasons) = object.get("seasons").and_then(Value::as_array) {
            for raw in raw_seasons {
                let Some(number) = int_field(raw, "season_number") else {
                    continue;
                };
                seasons.push(SeasonUpsert {
                    season_number: number,
                    name: str_field(raw, "name"),
                    overview: str_field(raw, "overview"),
                    air_date: str_field(raw, "air_date")
                        .and_then(|d| chrono::NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
                    episode_count: int_field(raw, "episode_count"),
                    cover: str_field(raw, "cover"),
                    raw: raw.clone(),
                });
            }
        }

        let mut episodes = Vec::new();
        if let Some(by_season) = object.get("episodes").and_then(Value::as_object) {
            for (season_key, raw_episodes) in by_season {
                let Ok(season_number) = season_key.parse::<i32>() else {
                    continue;
                };
                let Some(raw_episodes) = raw_episodes.as_array() else {
                    continue;
                };
                for raw in raw_episodes {
                    let Some(episode_id) = int_field(raw, "id") else {
                        continue;
                    };
                    let duration = raw
                        .get("info")
                        .and_then(|info| int_value(info.get("duration_secs")));
                    episodes.push(EpisodeUpsert {
                        season_number,
                        provider_episode_id: episode_id,
                        episode_number: int_field(raw, "episode_num"),
                        title: str_field(raw, "title"),
                        container_extension: str_field(raw, "container_extension"),
                        duration_seconds: duration,
                        raw: raw.clone(),
                    });
                }
            }
        }

        // Episodes can reference seasons absent from the seasons array.
        for episode in &episodes {
            if !seasons.iter().any(|s| s.season_number == episode.season_number) {
                seasons.push(SeasonUpsert {
                    season_number: episode.season_number,
                    name: None,
                    overview: None,
                    air_date: None,
                    episode_count: None,
                    cover: None,
                    raw: Value::Null,
                });
            }
        }

        Ok((seasons, episodes))
    }
}

fn expect_list(value: Value) -> Result<Vec<Value>, FetchError> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(FetchError::invalid("unexpected format (expected list)")),
    }
}

/// Extract an integer field that panels send as either number or string.
fn int_field(item: &Value, key: &str) -> Option<i32> {
    int_value(item.get(key))
}

fn int_value(value: Option<&Value>) -> Option<i32> {
    match value? {
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn str_field(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn int_field_tolerates_string_and_number() {
        let item = json!({"stream_id": "42", "category_id": 7, "bad": null});
        assert_eq!(int_field(&item, "stream_id"), Some(42));
        assert_eq!(int_field(&item, "category_id"), Some(7));
        assert_eq!(int_field(&item, "bad"), None);
        assert_eq!(int_field(&item, "absent"), None);
    }

    #[test]
    fn str_field_drops_empty_strings() {
        let item = json!({"name": "  ESPN  ", "icon": ""});
        assert_eq!(str_field(&item, "name"), Some("ESPN".to_string()));
        assert_eq!(str_field(&item, "icon"), None);
    }

    #[test]
    fn expect_list_rejects_objects() {
        assert!(expect_list(json!({"user_info": {}})).is_err());
        assert_eq!(expect_list(json!([1, 2])).unwrap().len(), 2);
    }
}
