//! RangeCandidate: one element's date range, derived from its attributes.

use serde::{Deserialize, Serialize};

use crate::config::AttributePair;
use crate::extract::seconds_to_iso;

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeCandidate {
    #[serde(rename = "frameIdentifier")]
    pub frame: String,
    pub tag: String,
    pub element_id: Option<String>,
    pub start_epoch_seconds: Option<f64>,
    pub end_epoch_seconds: Option<f64>,
    #[serde(rename = "startISO")]
    pub start_iso: Option<String>,
    #[serde(rename = "endExclusiveISO")]
    pub end_exclusive_iso: Option<String>,
    #[serde(rename = "endInclusiveISO")]
    pub end_inclusive_iso: Option<String>,
    pub duration_days: Option<i64>,
    /// Attribute pair the epochs were read from.
    pub attributes: Option<AttributePair>,
}

impl RangeCandidate {
    /// `start_raw`/`end_raw` are attribute values; the end is exclusive.
    pub fn from_attributes(
        frame: &str,
        tag: &str,
        element_id: Option<String>,
        attributes: Option<AttributePair>,
        start_raw: Option<&str>,
        end_raw: Option<&str>,
    ) -> Self {
        let start = parse_epoch(start_raw);
        let end = parse_epoch(end_raw);

        let duration_days = match (start, end) {
            (Some(s), Some(e)) => Some(((e - s) / SECONDS_PER_DAY).round().max(1.0) as i64),
            _ => None,
        };

        Self {
            frame: frame.to_string(),
            tag: tag.to_string(),
            element_id,
            start_epoch_seconds: start,
            end_epoch_seconds: end,
            start_iso: start.and_then(seconds_to_iso),
            end_exclusive_iso: end.and_then(seconds_to_iso),
            end_inclusive_iso: end.and_then(|e| seconds_to_iso(e - 1.0)),
            duration_days,
            attributes,
        }
    }

    /// Both boundaries parsed.
    pub fn is_complete(&self) -> bool {
        self.start_epoch_seconds.is_some() && self.end_epoch_seconds.is_some()
    }

    /// Grouping key: exact (start, end) pair, absent epochs included.
    pub fn range_key(&self) -> (Option<u64>, Option<u64>) {
        (
            self.start_epoch_seconds.map(f64::to_bits),
            self.end_epoch_seconds.map(f64::to_bits),
        )
    }
}

/// Finite, non-zero numeric attribute text.
fn parse_epoch(raw: Option<&str>) -> Option<f64> {
    let n = raw?.trim().parse::<f64>().ok()?;
    (n.is_finite() && n != 0.0).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(start: Option<&str>, end: Option<&str>) -> RangeCandidate {
        RangeCandidate::from_attributes(
            "https://www.example.com/",
            "range-datepicker-cell",
            None,
            Some(AttributePair::new("date-from", "date-to")),
            start,
            end,
        )
    }

    #[test]
    fn test_three_day_range() {
        let c = candidate(Some("1700000000"), Some("1700259200"));
        assert_eq!(c.duration_days, Some(3));
        assert_eq!(c.start_iso.as_deref(), Some("2023-11-14T22:13:20.000Z"));
        assert_eq!(c.end_exclusive_iso.as_deref(), Some("2023-11-17T22:13:20.000Z"));
        assert_eq!(c.end_inclusive_iso.as_deref(), Some("2023-11-17T22:13:19.000Z"));
        assert!(c.is_complete());
    }

    #[test]
    fn test_days_never_below_one() {
        let c = candidate(Some("1700000000"), Some("1700003600"));
        assert_eq!(c.duration_days, Some(1));
        let c = candidate(Some("1700259200"), Some("1700000000"));
        assert_eq!(c.duration_days, Some(1));
    }

    #[test]
    fn test_unusable_values_are_null() {
        for raw in [None, Some(""), Some("0"), Some("soon"), Some("NaN"), Some("Infinity")] {
            let c = candidate(raw, Some("1700259200"));
            assert_eq!(c.start_epoch_seconds, None, "{:?}", raw);
            assert_eq!(c.start_iso, None);
            assert_eq!(c.duration_days, None);
            assert!(!c.is_complete());
            assert!(c.end_inclusive_iso.is_some());
        }
    }

    #[test]
    fn test_serialized_field_names() {
        let c = candidate(Some("1700000000"), Some("1700259200"));
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["frameIdentifier"], "https://www.example.com/");
        assert_eq!(v["endInclusiveISO"], "2023-11-17T22:13:19.000Z");
        assert_eq!(v["durationDays"], 3);
        assert!(v["elementId"].is_null());
    }
}
