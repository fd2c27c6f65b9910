//! Timestamp parsing and Swedish-style date rendering for the report.

use chrono::{Datelike, NaiveDateTime};

/// Format produced by `to_char(..., 'YYYY-MM-DD HH24:MI:SS')` in the
/// queries.
const DB_TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses a text-cast database timestamp. Returns `None` on anything
/// malformed; timestamps are rendered as stored, without timezone
/// conversion.
#[must_use]
pub fn parse_db_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DB_TIMESTAMP_FMT).ok()
}

/// `YYYY-MM-DD vW` with the ISO week number, e.g. `2026-08-08 v32`.
#[must_use]
pub fn format_date(t: NaiveDateTime) -> String {
    format!("{} v{}", t.format("%Y-%m-%d"), t.iso_week().week())
}

/// `HH:MM`.
#[must_use]
pub fn format_time(t: NaiveDateTime) -> String {
    t.format("%H:%M").to_string()
}

/// `YYYY-MM-DD HH:MM`.
#[must_use]
pub fn format_datetime(t: NaiveDateTime) -> String {
    t.format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_db_timestamps() {
        let t = parse_db_timestamp("2026-08-08 14:05:33").unwrap();
        assert_eq!(format_datetime(t), "2026-08-08 14:05");
        assert_eq!(format_time(t), "14:05");
    }

    #[test]
    fn rejects_malformed_timestamps() {
        assert!(parse_db_timestamp("").is_none());
        assert!(parse_db_timestamp("2026-08-08").is_none());
    }

    #[test]
    fn date_includes_iso_week() {
        let t = parse_db_timestamp("2026-01-01 00:00:00").unwrap();
        // 2026-01-01 falls in ISO week 1.
        assert_eq!(format_date(t), "2026-01-01 v1");
    }
}
