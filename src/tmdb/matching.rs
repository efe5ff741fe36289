//! Search-result scoring
//!
//! A search for a cleaned title returns loosely ranked candidates; the best
//! one is picked by a deterministic score over title equality, year
//! proximity, and popularity signals.

use serde_json::Value;

/// Pick the best candidate from a search result list.
///
/// `date_key` is `release_date` for movies and `first_air_date` for series.
pub fn pick_best_result<'a>(
    results: &'a [Value],
    wanted_title: &str,
    wanted_year: Option<i32>,
    date_key: &str,
) -> Option<&'a Value> {
    if results.is_empty() {
        return None;
    }

    let wanted = wanted_title.to_lowercase();
    let mut best: Option<&Value> = None;
    let mut best_score = f64::MIN;

    for result in results {
        let title = result
            .get("title")
            .or_else(|| result.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();

        let mut score = 0.0;
        if !title.is_empty() && title == wanted {
            score += 200.0;
        } else if !wanted.is_empty() && !title.is_empty() && title.contains(&wanted) {
            score += 80.0;
        }

        let candidate_year = result
            .get(date_key)
            .and_then(Value::as_str)
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse::<i32>().ok());
        if let (Some(wanted_year), Some(candidate_year)) = (wanted_year, candidate_year) {
            let diff = (wanted_year - candidate_year).abs() as f64;
            score += (60.0 - diff * 10.0).max(0.0);
        }

        score += result.get("popularity").and_then(Value::as_f64).unwrap_or(0.0) * 2.0;
        score += result.get("vote_count").and_then(Value::as_f64).unwrap_or(0.0) * 0.02;

        if score > best_score {
            best_score = score;
            best = Some(result);
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exact_title_and_year_beats_popularity() {
        let results = vec![
            json!({"id": 1, "title": "Dune Part Two", "release_date": "2024-02-27", "popularity": 90.0, "vote_count": 9000}),
            json!({"id": 2, "title": "Dune", "release_date": "2021-09-15", "popularity": 40.0, "vote_count": 8000}),
        ];
        let best = pick_best_result(&results, "Dune", Some(2021), "release_date").unwrap();
        assert_eq!(best["id"], 2);
    }

    #[test]
    fn year_proximity_decays_by_ten_per_year() {
        let results = vec![
            json!({"id": 1, "title": "Heat", "release_date": "1995-12-15"}),
            json!({"id": 2, "title": "Heat", "release_date": "1972-01-01"}),
        ];
        let best = pick_best_result(&results, "Heat", Some(1995), "release_date").unwrap();
        assert_eq!(best["id"], 1);
    }

    #[test]
    fn substring_match_scores_lower_than_exact() {
        let results = vec![
            json!({"id": 1, "name": "Alien Hunters"}),
            json!({"id": 2, "name": "alien"}),
        ];
        let best = pick_best_result(&results, "Alien", None, "first_air_date").unwrap();
        assert_eq!(best["id"], 2);
    }

    #[test]
    fn empty_results_yield_none() {
        assert!(pick_best_result(&[], "Anything", None, "release_date").is_none());
    }
}
