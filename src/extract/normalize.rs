//! DateNormalizer: raw value → canonical ISO-8601 instant
//!
//! Accepts epoch seconds, epoch milliseconds, numeric strings, ISO-prefixed
//! strings and a handful of human formats. Anything else is "not a date",
//! which is an ordinary `None`, never an error.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

use super::payload::Scalar;

/// Numbers below this are epoch seconds, at or above it epoch milliseconds.
pub const MILLIS_THRESHOLD: f64 = 1e12;

/// Largest magnitude a JS `Date` accepts (±100,000,000 days).
const MAX_TIME_MS: f64 = 8.64e15;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const HUMAN_DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

// =============================================================================
// Formatting
// =============================================================================

/// Format a UTC instant the way `Date.prototype.toISOString` does.
/// Years outside 0000-9999 are rejected so the output always re-parses.
pub fn format_utc(dt: DateTime<Utc>) -> Option<String> {
    if !(0..=9999).contains(&dt.year()) {
        return None;
    }
    Some(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Epoch milliseconds → ISO string.
pub fn millis_to_iso(ms: f64) -> Option<String> {
    if !ms.is_finite() || ms.abs() > MAX_TIME_MS {
        return None;
    }
    DateTime::from_timestamp_millis(ms.trunc() as i64).and_then(format_utc)
}

/// Epoch seconds → ISO string.
pub fn seconds_to_iso(secs: f64) -> Option<String> {
    millis_to_iso(secs * 1000.0)
}

// =============================================================================
// Normalization
// =============================================================================

pub fn normalize_number(n: f64) -> Option<String> {
    if !n.is_finite() {
        return None;
    }
    if n < MILLIS_THRESHOLD {
        seconds_to_iso(n)
    } else {
        millis_to_iso(n)
    }
}

pub fn normalize_text(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(n) = s.parse::<f64>() {
        if n.is_finite() {
            return normalize_number(n);
        }
    }

    if has_iso_date_prefix(s) {
        return parse_iso(s);
    }

    parse_generic(s)
}

pub fn normalize_scalar(value: &Scalar<'_>) -> Option<String> {
    match value {
        Scalar::Number(n) => normalize_number(*n),
        Scalar::Text(s) => normalize_text(s),
        Scalar::Bool(_) | Scalar::Null => None,
    }
}

/// Normalize a JSON value. Containers are never dates.
pub fn normalize(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n.as_f64().and_then(normalize_number),
        Value::String(s) => normalize_text(s),
        _ => None,
    }
}

fn has_iso_date_prefix(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 10
        && b[..4].iter().all(u8::is_ascii_digit)
        && b[4] == b'-'
        && b[5..7].iter().all(u8::is_ascii_digit)
        && b[7] == b'-'
        && b[8..10].iter().all(u8::is_ascii_digit)
}

fn parse_iso(s: &str) -> Option<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return format_utc(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return format_utc(naive.and_utc());
        }
    }
    if s.len() == 10 {
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return date.and_hms_opt(0, 0, 0).and_then(|n| format_utc(n.and_utc()));
        }
    }
    None
}

fn parse_generic(s: &str) -> Option<String> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return format_utc(dt.with_timezone(&Utc));
    }
    for fmt in HUMAN_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0).and_then(|n| format_utc(n.and_utc()));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_epoch_seconds() {
        assert_eq!(
            normalize_number(1_700_000_000.0).as_deref(),
            Some("2023-11-14T22:13:20.000Z")
        );
    }

    #[test]
    fn test_epoch_millis_at_threshold() {
        assert_eq!(
            normalize_number(1_700_000_000_000.0).as_deref(),
            Some("2023-11-14T22:13:20.000Z")
        );
        // 1e12 itself is milliseconds
        assert_eq!(
            normalize_number(1e12).as_deref(),
            Some("2001-09-09T01:46:40.000Z")
        );
    }

    #[test]
    fn test_numeric_string() {
        assert_eq!(
            normalize_text(" 1700000000 ").as_deref(),
            Some("2023-11-14T22:13:20.000Z")
        );
    }

    #[test]
    fn test_iso_variants() {
        assert_eq!(
            normalize_text("2024-03-01").as_deref(),
            Some("2024-03-01T00:00:00.000Z")
        );
        assert_eq!(
            normalize_text("2024-03-01T10:30:00+02:00").as_deref(),
            Some("2024-03-01T08:30:00.000Z")
        );
        assert_eq!(
            normalize_text("2024-03-01T10:30").as_deref(),
            Some("2024-03-01T10:30:00.000Z")
        );
        assert_eq!(normalize_text("2024-03-01garbage"), None);
    }

    #[test]
    fn test_generic_formats() {
        assert_eq!(
            normalize_text("03/15/2024").as_deref(),
            Some("2024-03-15T00:00:00.000Z")
        );
        assert_eq!(
            normalize_text("March 15, 2024").as_deref(),
            Some("2024-03-15T00:00:00.000Z")
        );
        assert_eq!(
            normalize_text("Fri, 15 Mar 2024 12:00:00 +0000").as_deref(),
            Some("2024-03-15T12:00:00.000Z")
        );
    }

    #[test]
    fn test_not_dates() {
        assert_eq!(normalize_text(""), None);
        assert_eq!(normalize_text("   "), None);
        assert_eq!(normalize_text("hello"), None);
        assert_eq!(normalize_text("NaN"), None);
        assert_eq!(normalize_number(f64::INFINITY), None);
        assert_eq!(normalize(&json!(true)), None);
        assert_eq!(normalize(&json!(null)), None);
        assert_eq!(normalize(&json!({"a": 1})), None);
        // year 33658: representable, but not re-parseable as ISO
        assert_eq!(normalize_number(999_999_999_999.0), None);
    }

    #[test]
    fn test_idempotent_on_output() {
        let inputs = [
            json!(1_700_000_000),
            json!(1_700_000_000_123_i64),
            json!("1700259200"),
            json!("2024-03-01"),
            json!("2024-03-01T10:30:00.5-05:00"),
            json!("March 15, 2024"),
            json!(-86_400),
        ];
        for input in inputs {
            let once = normalize(&input).expect("date");
            let twice = normalize_text(&once).expect("date");
            assert_eq!(once, twice, "input {input}");
        }
    }

    #[test]
    fn test_seconds_to_iso_truncates_millis() {
        assert_eq!(
            seconds_to_iso(1_700_259_199.0).as_deref(),
            Some("2023-11-17T22:13:19.000Z")
        );
        assert_eq!(millis_to_iso(f64::NAN), None);
    }
}
