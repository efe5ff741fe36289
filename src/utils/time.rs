//! XMLTV timestamp handling
//!
//! XMLTV program times come as `YYYYMMDDHHMMSS ±HHMM` (the offset part is
//! optional and defaults to UTC). All times are normalized to UTC during
//! ingestion.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// Parse an XMLTV datetime like `20251231021521 +0000` into a UTC instant.
pub fn parse_xmltv_datetime(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty datetime".to_string());
    }

    let mut parts = raw.split_whitespace();
    let dt_raw = parts.next().unwrap_or_default();
    let tz_raw = parts.next().unwrap_or("+0000");

    let naive = NaiveDateTime::parse_from_str(dt_raw, "%Y%m%d%H%M%S")
        .map_err(|e| format!("invalid XMLTV datetime '{dt_raw}': {e}"))?;

    let offset = parse_offset(tz_raw)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("ambiguous local time: {dt_raw}"))
}

/// Re-emit a UTC instant in the XMLTV wire format (always `+0000`).
pub fn format_xmltv_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%d%H%M%S +0000").to_string()
}

fn parse_offset(tz_raw: &str) -> Result<FixedOffset, String> {
    if tz_raw.len() != 5 || !(tz_raw.starts_with('+') || tz_raw.starts_with('-')) {
        return Err(format!("invalid XMLTV offset '{tz_raw}'"));
    }
    let hh: i32 = tz_raw[1..3]
        .parse()
        .map_err(|_| format!("invalid XMLTV offset '{tz_raw}'"))?;
    let mm: i32 = tz_raw[3..5]
        .parse()
        .map_err(|_| format!("invalid XMLTV offset '{tz_raw}'"))?;
    let total = hh * 3600 + mm * 60;
    let total = if tz_raw.starts_with('-') { -total } else { total };
    FixedOffset::east_opt(total).ok_or_else(|| format!("offset out of range: '{tz_raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parses_utc_datetime() {
        let dt = parse_xmltv_datetime("20251231021521 +0000").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-12-31T02:15:21+00:00");
    }

    #[test]
    fn applies_positive_offset() {
        let dt = parse_xmltv_datetime("20250601120000 +0200").unwrap();
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn applies_negative_offset() {
        let dt = parse_xmltv_datetime("20250601120000 -0530").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-06-01T17:30:00+00:00");
    }

    #[test]
    fn missing_offset_defaults_to_utc() {
        let dt = parse_xmltv_datetime("20250601120000").unwrap();
        assert_eq!(dt.hour(), 12);
    }

    #[test]
    fn round_trips_through_wire_format() {
        let dt = parse_xmltv_datetime("20250601120000 +0130").unwrap();
        let reparsed = parse_xmltv_datetime(&format_xmltv_datetime(dt)).unwrap();
        assert_eq!(dt, reparsed);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_xmltv_datetime("").is_err());
        assert!(parse_xmltv_datetime("not-a-date").is_err());
        assert!(parse_xmltv_datetime("20250601120000 +9x00").is_err());
    }
}
