//! URL utilities: scheme normalization, credential obfuscation, and
//! construction of provider streaming URLs.

use url::Url;

/// URL utilities for consistent URL handling
pub struct UrlUtils;

impl UrlUtils {
    /// Ensure a URL carries an HTTP/HTTPS scheme, defaulting to HTTP.
    pub fn normalize_scheme(url: &str) -> String {
        let trimmed = url.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}")
        }
    }

    /// Strip trailing slashes, keeping the one after the scheme.
    pub fn sanitize(url: &str) -> String {
        let mut sanitized = Self::normalize_scheme(url);
        while sanitized.len() > 8 && sanitized.ends_with('/') {
            sanitized.pop();
        }
        sanitized
    }

    /// Mask credential-looking query parameters and userinfo in a string so
    /// it is safe to log. Provider URLs embed username/password in both the
    /// query string and the path, so this is applied to every logged URL and
    /// upstream error message.
    pub fn obfuscate_credentials(input: &str) -> String {
        let mut out = input.to_string();
        if let Ok(mut parsed) = Url::parse(input) {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            let pairs: Vec<(String, String)> = parsed
                .query_pairs()
                .map(|(k, v)| {
                    let masked = if matches!(k.as_ref(), "username" | "password" | "api_key") {
                        "***".to_string()
                    } else {
                        v.to_string()
                    };
                    (k.to_string(), masked)
                })
                .collect();
            if !pairs.is_empty() {
                parsed
                    .query_pairs_mut()
                    .clear()
                    .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            }
            out = parsed.to_string();
        }
        out
    }
}

/// Construct the playable URL for a live channel.
pub fn live_stream_url(base_url: &str, username: &str, password: &str, stream_id: i32) -> String {
    format!(
        "{}/live/{}/{}/{}.m3u8",
        UrlUtils::sanitize(base_url),
        username,
        password,
        stream_id
    )
}

/// Construct the playable URL for a VOD item.
pub fn movie_stream_url(
    base_url: &str,
    username: &str,
    password: &str,
    stream_id: i32,
    container_extension: Option<&str>,
) -> String {
    let ext = container_extension
        .map(|e| e.trim().to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "mp4".to_string());
    format!(
        "{}/movie/{}/{}/{}.{}",
        UrlUtils::sanitize(base_url),
        username,
        password,
        stream_id,
        ext
    )
}

/// Construct the playable URL for a series episode.
pub fn episode_stream_url(
    base_url: &str,
    username: &str,
    password: &str,
    episode_id: i32,
    container_extension: Option<&str>,
) -> String {
    let ext = container_extension
        .map(|e| e.trim().to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "mp4".to_string());
    format!(
        "{}/series/{}/{}/{}.{}",
        UrlUtils::sanitize(base_url),
        username,
        password,
        episode_id,
        ext
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_scheme_defaults_to_http() {
        assert_eq!(UrlUtils::normalize_scheme("example.com"), "http://example.com");
        assert_eq!(
            UrlUtils::normalize_scheme("https://example.com"),
            "https://example.com"
        );
    }

    #[test]
    fn sanitize_strips_trailing_slashes() {
        assert_eq!(UrlUtils::sanitize("http://example.com///"), "http://example.com");
    }

    #[test]
    fn obfuscates_credential_query_params() {
        let masked = UrlUtils::obfuscate_credentials(
            "http://host/player_api.php?username=bob&password=hunter2&action=get_series",
        );
        assert!(!masked.contains("hunter2"));
        assert!(!masked.contains("bob"));
        assert!(masked.contains("action=get_series"));
    }

    #[test]
    fn movie_url_uses_container_extension() {
        let url = movie_stream_url("http://host:8080/", "u", "p", 42, Some("MKV"));
        assert_eq!(url, "http://host:8080/movie/u/p/42.mkv");
        let url = movie_stream_url("http://host:8080", "u", "p", 42, None);
        assert_eq!(url, "http://host:8080/movie/u/p/42.mp4");
    }

    #[test]
    fn live_url_is_hls() {
        assert_eq!(
            live_stream_url("http://host:8080", "u", "p", 7),
            "http://host:8080/live/u/p/7.m3u8"
        );
    }

    #[test]
    fn episode_url_uses_episode_id() {
        assert_eq!(
            episode_stream_url("http://host:8080", "u", "p", 901, Some("mp4")),
            "http://host:8080/series/u/p/901.mp4"
        );
    }
}
