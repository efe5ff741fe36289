//! Title cleaning for metadata lookups
//!
//! Catalog names frequently arrive as file names ("Dune (2021).mkv") or carry
//! release years in assorted brackets. Search queries need the bare title and
//! a year hint.

use std::sync::LazyLock;

use regex::Regex;

static FILE_EXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(mkv|mp4|avi|mov|m4v|wmv|flv|webm|ts|m2ts)$").unwrap()
});
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
// One or more trailing years, each optionally wrapped in (), [] or {}.
static TRAILING_YEARS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\s*[\(\[\{]?\s*(?:19|20)\d{2}\s*[\)\]\}]?\s*)+$").unwrap()
});
static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(19\d{2}|20\d{2})").unwrap());
static EMPTY_BRACKETS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\(\[\{]\s*[\)\]\}]\s*$").unwrap());

/// Clean a raw catalog title and extract a trailing year hint.
///
/// Years are only recognized in the 1900–2099 range; when several trailing
/// years are present ("Movie (2025) (2025)") the last one wins.
pub fn clean_title_and_year(raw: &str) -> (String, Option<i32>) {
    let mut s = raw.trim().to_string();

    s = FILE_EXT_RE.replace(&s, "").trim().to_string();
    s = WHITESPACE_RE.replace_all(&s, " ").trim().to_string();

    let mut year: Option<i32> = None;
    if let Some(m) = TRAILING_YEARS_RE.find(&s) {
        year = YEAR_RE
            .find_iter(m.as_str())
            .last()
            .and_then(|y| y.as_str().parse().ok());
        s = s[..m.start()].trim_end().to_string();
    }

    s = EMPTY_BRACKETS_RE.replace(&s, "").trim().to_string();
    s = WHITESPACE_RE.replace_all(&s, " ").trim().to_string();

    (s, year)
}

/// Casefolded lookup key for matching EPG titles against the local library.
pub fn title_key(raw: &str) -> String {
    let (cleaned, _year) = clean_title_and_year(raw);
    cleaned.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_file_extension_and_year() {
        assert_eq!(clean_title_and_year("Dune (2021).mkv"), ("Dune".to_string(), Some(2021)));
    }

    #[test]
    fn takes_last_of_multiple_trailing_years() {
        assert_eq!(
            clean_title_and_year("Movie (2025) (2025)"),
            ("Movie".to_string(), Some(2025))
        );
        assert_eq!(
            clean_title_and_year("Movie [2019] (2021)"),
            ("Movie".to_string(), Some(2021))
        );
    }

    #[test]
    fn bare_trailing_year_is_extracted() {
        assert_eq!(clean_title_and_year("Heat 1995"), ("Heat".to_string(), Some(1995)));
    }

    #[test]
    fn year_outside_range_is_not_extracted() {
        assert_eq!(clean_title_and_year("Movie 1899"), ("Movie 1899".to_string(), None));
        assert_eq!(clean_title_and_year("Movie 2100"), ("Movie 2100".to_string(), None));
    }

    #[test]
    fn year_in_the_middle_is_kept() {
        assert_eq!(
            clean_title_and_year("2001 A Space Odyssey"),
            ("2001 A Space Odyssey".to_string(), None)
        );
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(
            clean_title_and_year("  The   Matrix   (1999) "),
            ("The Matrix".to_string(), Some(1999))
        );
    }

    #[test]
    fn cleaning_is_idempotent() {
        let inputs = ["Dune (2021).mkv", "Movie (2025) (2025)", "Plain Title", "Heat 1995"];
        for raw in inputs {
            let (once, _) = clean_title_and_year(raw);
            let (twice, _) = clean_title_and_year(&once);
            assert_eq!(once, twice, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn title_key_is_casefolded() {
        assert_eq!(title_key("The OFFICE (2005)"), "the office");
    }
}
