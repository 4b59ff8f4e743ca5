//! Timestamp normalisation for post dates.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Formats tried when the value carries no offset at all; read as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a post timestamp into a UTC instant.
///
/// Accepts RFC 3339 with either a `Z` suffix or an explicit offset (`+00:00`, `-05:00`, ...),
/// the same with a space instead of `T`, and offset-less values, which are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // RFC 3339 allows a space separator but chrono's parser wants `T`.
    if let Some((date, time)) = s.split_once(' ')
        && let Ok(dt) = DateTime::parse_from_rfc3339(&format!("{date}T{time}"))
    {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}
