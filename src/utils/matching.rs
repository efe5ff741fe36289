//! Channel-name normalization and fuzzy similarity
//!
//! Provider channel names ("ESPN HD US") and XMLTV display names
//! ("ESPN.us") rarely agree byte-for-byte. Both sides are normalized and
//! compared with a Ratcliff/Obershelp ratio before auto-binding a stream to
//! an EPG channel.

/// Quality/region noise tokens dropped during normalization.
const NOISE_TOKENS: &[&str] = &["hd", "fhd", "uhd", "4k", "us", "usa", "tv"];

/// Normalize a channel name for comparison: lowercase, strip noise tokens,
/// drop non-alphanumerics, collapse whitespace.
pub fn normalize_channel_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let mut cleaned = String::with_capacity(lowered.len());
    for ch in lowered.chars() {
        if ch.is_alphanumeric() {
            cleaned.push(ch);
        } else {
            cleaned.push(' ');
        }
    }
    cleaned
        .split_whitespace()
        .filter(|token| !NOISE_TOKENS.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Ratcliff/Obershelp similarity ratio in `[0, 1]`.
///
/// `2 * M / (|a| + |b|)` where `M` counts characters in recursively matched
/// longest common substrings.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let matched = matching_chars(&a, &b);
    (2.0 * matched as f64) / ((a.len() + b.len()) as f64)
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (ai, bi, len) = longest_common_substring(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..ai], &b[..bi]) + matching_chars(&a[ai + len..], &b[bi + len..])
}

fn longest_common_substring(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    // row-at-a-time DP over match lengths ending at (i, j)
    let mut prev = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        let mut current = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                let len = prev[j] + 1;
                current[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        prev = current;
    }
    best
}

/// A single auto-match candidate: `(xmltv_id, display_name)`.
pub type MatchCandidate = (String, String);

/// Best fuzzy match for `name` among `candidates`, or `None` when nothing
/// reaches `min_score`.
pub fn best_match<'a>(
    name: &str,
    candidates: &'a [MatchCandidate],
    min_score: f64,
) -> Option<(&'a str, &'a str, f64)> {
    let normalized = normalize_channel_name(name);
    let mut best: Option<(&str, &str, f64)> = None;
    for (xmltv_id, display_name) in candidates {
        let score = similarity(&normalized, &normalize_channel_name(display_name));
        if best.map_or(true, |(_, _, s)| score > s) {
            best = Some((xmltv_id, display_name, score));
        }
    }
    best.filter(|(_, _, score)| *score >= min_score)
}
