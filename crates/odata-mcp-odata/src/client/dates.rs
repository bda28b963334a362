//! Bidirectional `/Date(epochMs)/` ↔ ISO 8601 conversion (`--legacy-dates`, §4.2).

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use std::sync::OnceLock;

fn legacy_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/Date\((-?\d+)\)/$").expect("static regex is valid"))
}

/// Convert a legacy `/Date(epochMs)/` literal to an ISO 8601 string (UTC).
/// Returns `None` if `s` is not a well-formed legacy date literal.
#[must_use]
pub fn legacy_to_iso(s: &str) -> Option<String> {
    let caps = legacy_date_re().captures(s)?;
    let millis: i64 = caps.get(1)?.as_str().parse().ok()?;
    let dt = DateTime::<Utc>::from_timestamp_millis(millis)?;
    Some(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Convert an ISO 8601 string to a legacy `/Date(epochMs)/` literal.
/// Returns `None` if `s` is not a well-formed, parseable timestamp.
#[must_use]
pub fn iso_to_legacy(s: &str) -> Option<String> {
    let dt = DateTime::parse_from_rfc3339(s).ok()?;
    Some(format!("/Date({})/", dt.timestamp_millis()))
}
