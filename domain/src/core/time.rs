//! Timestamp helpers.
//!
//! Round and output timestamps are stored as RFC 3339 strings with millisecond
//! precision and a `Z` suffix, so lexicographic order equals chronological order.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a timestamp in the canonical storage format.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a timestamp written by [`format_timestamp`] (or any RFC 3339 string).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
