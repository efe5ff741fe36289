//! Browse-endpoint dispatch for collections
//!
//! Maps a collection's `(source_type, source_id, filters)` onto a concrete
//! API call. Filter keys and sort orders are whitelisted; anything unknown
//! is rejected as `invalid` before a request is made.

use serde_json::Value;

use crate::errors::FetchError;

const TRENDING_KINDS: &[&str] = &["all", "movie", "tv"];
const TRENDING_WINDOWS: &[&str] = &["day", "week"];
const LIST_KINDS: &[&str] = &["movie", "tv"];
const MOVIE_LIST_KEYS: &[&str] = &["now_playing", "popular", "top_rated", "upcoming"];
const TV_LIST_KEYS: &[&str] = &["airing_today", "on_the_air", "popular", "top_rated"];

const MOVIE_SORTS: &[&str] = &[
    "popularity.asc",
    "popularity.desc",
    "primary_release_date.asc",
    "primary_release_date.desc",
    "vote_average.asc",
    "vote_average.desc",
    "vote_count.asc",
    "vote_count.desc",
];
const TV_SORTS: &[&str] = &[
    "popularity.asc",
    "popularity.desc",
    "first_air_date.asc",
    "first_air_date.desc",
    "vote_average.asc",
    "vote_average.desc",
    "vote_count.asc",
    "vote_count.desc",
];

const MOVIE_FILTERS: &[&str] = &[
    "with_genres",
    "without_genres",
    "with_original_language",
    "primary_release_year",
    "primary_release_date.gte",
    "primary_release_date.lte",
    "vote_count.gte",
    "vote_average.gte",
    "with_runtime.gte",
    "with_runtime.lte",
];
const TV_FILTERS: &[&str] = &[
    "with_genres",
    "without_genres",
    "with_original_language",
    "first_air_date_year",
    "first_air_date.gte",
    "first_air_date.lte",
    "vote_count.gte",
    "vote_average.gte",
];

/// Minimum vote-count floor required when sorting by vote average, so tiny
/// sample sizes cannot dominate the ranking.
const VOTE_AVERAGE_SORT_MIN_VOTES: f64 = 50.0;

/// A fully resolved browse call: path plus query parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowseCall {
    pub path: String,
    pub params: Vec<(String, String)>,
}

/// Resolve a collection definition to a browse call.
pub fn resolve_browse(
    source_type: &str,
    source_id: Option<i32>,
    filters: Option<&Value>,
    page: u32,
    default_language: &str,
) -> Result<BrowseCall, FetchError> {
    let filters = coerce_filters(filters);
    let language = filters
        .get("language")
        .and_then(Value::as_str)
        .unwrap_or(default_language)
        .to_string();
    let kind = filters.get("kind").and_then(Value::as_str);

    match source_type {
        "trending" => {
            let kind = kind.unwrap_or("all");
            let window = filters
                .get("time_window")
                .and_then(Value::as_str)
                .unwrap_or("day");
            if !TRENDING_KINDS.contains(&kind) {
                return Err(FetchError::invalid(format!("invalid trending kind '{kind}'")));
            }
            if !TRENDING_WINDOWS.contains(&window) {
                return Err(FetchError::invalid(format!(
                    "invalid trending time_window '{window}'"
                )));
            }
            Ok(BrowseCall {
                path: format!("/trending/{kind}/{window}"),
                params: base_params(language, page),
            })
        }
        "list" => {
            let kind = kind.ok_or_else(|| FetchError::invalid("list requires filters.kind"))?;
            let list_key = filters
                .get("list_key")
                .and_then(Value::as_str)
                .ok_or_else(|| FetchError::invalid("list requires filters.list_key"))?;
            if !LIST_KINDS.contains(&kind) {
                return Err(FetchError::invalid(format!("invalid list kind '{kind}'")));
            }
            let allowed = if kind == "movie" { MOVIE_LIST_KEYS } else { TV_LIST_KEYS };
            if !allowed.contains(&list_key) {
                return Err(FetchError::invalid(format!(
                    "invalid list_key '{list_key}' for kind '{kind}'"
                )));
            }
            let mut params = base_params(language, page);
            if kind == "movie" {
                if let Some(region) = filters.get("region").and_then(Value::as_str) {
                    params.push(("region".to_string(), region.to_string()));
                }
            }
            Ok(BrowseCall {
                path: format!("/{kind}/{list_key}"),
                params,
            })
        }
        "discover" => {
            let kind = kind.ok_or_else(|| FetchError::invalid("discover requires filters.kind"))?;
            if !LIST_KINDS.contains(&kind) {
                return Err(FetchError::invalid(format!("invalid discover kind '{kind}'")));
            }
            let mut params = base_params(language, page);

            let sort_by = filters.get("sort_by").and_then(Value::as_str);
            let extra = filters.get("filters").and_then(Value::as_object);

            if let Some(sort_by) = sort_by {
                let allowed = if kind == "movie" { MOVIE_SORTS } else { TV_SORTS };
                if !allowed.contains(&sort_by) {
                    return Err(FetchError::invalid(format!("invalid sort_by '{sort_by}'")));
                }
                if sort_by == "vote_average.desc" {
                    let min_votes = extra
                        .and_then(|map| map.get("vote_count.gte"))
                        .and_then(coerce_number);
                    if !min_votes.is_some_and(|v| v >= VOTE_AVERAGE_SORT_MIN_VOTES) {
                        return Err(FetchError::invalid(format!(
                            "sort_by=vote_average.desc requires vote_count.gte >= {VOTE_AVERAGE_SORT_MIN_VOTES}"
                        )));
                    }
                }
                params.push(("sort_by".to_string(), sort_by.to_string()));
            }

            if let Some(extra) = extra {
                let allowed = if kind == "movie" { MOVIE_FILTERS } else { TV_FILTERS };
                for (key, value) in extra {
                    if !allowed.contains(&key.as_str()) {
                        return Err(FetchError::invalid(format!(
                            "unknown discover filter '{key}' for kind '{kind}'"
                        )));
                    }
                    params.push((key.clone(), stringify(value)));
                }
            }

            Ok(BrowseCall {
                path: format!("/discover/{kind}"),
                params,
            })
        }
        "collection" => {
            let source_id =
                source_id.ok_or_else(|| FetchError::invalid("collection requires source_id"))?;
            if page != 1 {
                return Err(FetchError::invalid("collection only supports page=1"));
            }
            Ok(BrowseCall {
                path: format!("/collection/{source_id}"),
                params: vec![("language".to_string(), language)],
            })
        }
        other => Err(FetchError::invalid(format!(
            "invalid source_type '{other}' (allowed: collection, discover, list, trending)"
        ))),
    }
}

fn base_params(language: String, page: u32) -> Vec<(String, String)> {
    vec![
        ("language".to_string(), language),
        ("page".to_string(), page.to_string()),
    ]
}

/// Stored filters may arrive as a JSON object or as its string encoding.
fn coerce_filters(filters: Option<&Value>) -> serde_json::Map<String, Value> {
    match filters {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default(),
        _ => serde_json::Map::new(),
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trending_defaults_to_all_day() {
        let call = resolve_browse("trending", None, None, 1, "en-US").unwrap();
        assert_eq!(call.path, "/trending/all/day");
    }

    #[test]
    fn trending_rejects_unknown_window() {
        let filters = json!({"time_window": "month"});
        let err = resolve_browse("trending", None, Some(&filters), 1, "en-US").unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::Invalid);
    }

    #[test]
    fn list_requires_kind_and_key() {
        assert!(resolve_browse("list", None, None, 1, "en-US").is_err());
        let filters = json!({"kind": "movie", "list_key": "popular"});
        let call = resolve_browse("list", None, Some(&filters), 2, "en-US").unwrap();
        assert_eq!(call.path, "/movie/popular");
        assert!(call.params.contains(&("page".to_string(), "2".to_string())));
    }

    #[test]
    fn discover_rejects_unknown_filter_keys() {
        let filters = json!({"kind": "movie", "filters": {"with_cast": "500"}});
        let err = resolve_browse("discover", None, Some(&filters), 1, "en-US").unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::Invalid);
    }

    #[test]
    fn vote_average_sort_requires_vote_floor() {
        let filters = json!({
            "kind": "movie",
            "sort_by": "vote_average.desc",
            "filters": {"vote_count.gte": 49}
        });
        let err = resolve_browse("discover", None, Some(&filters), 1, "en-US").unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::Invalid);

        let filters = json!({
            "kind": "movie",
            "sort_by": "vote_average.desc",
            "filters": {"vote_count.gte": 50}
        });
        let call = resolve_browse("discover", None, Some(&filters), 1, "en-US").unwrap();
        assert_eq!(call.path, "/discover/movie");
        assert!(call.params.contains(&("vote_count.gte".to_string(), "50".to_string())));
    }

    #[test]
    fn collection_requires_source_id_and_first_page() {
        assert!(resolve_browse("collection", None, None, 1, "en-US").is_err());
        assert!(resolve_browse("collection", Some(10), None, 2, "en-US").is_err());
        let call = resolve_browse("collection", Some(10), None, 1, "en-US").unwrap();
        assert_eq!(call.path, "/collection/10");
    }

    #[test]
    fn filters_stored_as_string_are_parsed() {
        let filters = json!("{\"kind\": \"tv\", \"list_key\": \"top_rated\"}");
        let call = resolve_browse("list", None, Some(&filters), 1, "en-US").unwrap();
        assert_eq!(call.path, "/tv/top_rated");
    }
}
