//! Results sink shared by the interceptor and the DOM scanner
//!
//! Append-only list of `DateHit`s in event-completion order, plus the latest
//! DOM scan report. The presentation layer reads it at any time.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dom::ScanReport;
use crate::extract::ExtractedDate;

/// Where a hit was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HitSource {
    RequestQuery,
    RequestBody,
    MessageOut,
    MessageIn,
    DomAttribute,
    StorageSnapshot,
}

impl HitSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            HitSource::RequestQuery => "request-query",
            HitSource::RequestBody => "request-body",
            HitSource::MessageOut => "message-out",
            HitSource::MessageIn => "message-in",
            HitSource::DomAttribute => "dom-attribute",
            HitSource::StorageSnapshot => "storage-snapshot",
        }
    }

    pub fn is_network(&self) -> bool {
        !matches!(self, HitSource::DomAttribute | HitSource::StorageSnapshot)
    }
}

impl std::fmt::Display for HitSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed date value. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateHit {
    pub key: String,
    pub raw_value: Value,
    pub iso: Option<String>,
    pub source: HitSource,
    /// Request URL, message origin, frame URL or storage key.
    pub origin: String,
}

impl DateHit {
    pub fn from_extracted(date: ExtractedDate, source: HitSource, origin: &str) -> Self {
        Self {
            key: date.key,
            raw_value: date.raw,
            iso: Some(date.iso),
            source,
            origin: origin.to_string(),
        }
    }
}

/// Hits produced by a single intercepted call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkReport {
    pub source: HitSource,
    pub origin: String,
    pub hits: Vec<DateHit>,
}

impl NetworkReport {
    pub fn new(source: HitSource, origin: &str, dates: Vec<ExtractedDate>) -> Self {
        let hits = dates
            .into_iter()
            .map(|d| DateHit::from_extracted(d, source, origin))
            .collect();
        Self {
            source,
            origin: origin.to_string(),
            hits,
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.hits.iter().map(|h| h.key.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsSink {
    hits: Vec<DateHit>,
    reports: usize,
    scan: Option<ScanReport>,
}

impl ResultsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, report: NetworkReport) {
        self.reports += 1;
        self.hits.extend(report.hits);
    }

    pub fn push_hit(&mut self, hit: DateHit) {
        self.hits.push(hit);
    }

    pub fn publish_scan(&mut self, report: ScanReport) {
        self.scan = Some(report);
    }

    pub fn hits(&self) -> &[DateHit] {
        &self.hits
    }

    pub fn hits_from(&self, source: HitSource) -> impl Iterator<Item = &DateHit> {
        self.hits.iter().filter(move |h| h.source == source)
    }

    /// Number of network reports appended.
    pub fn report_count(&self) -> usize {
        self.reports
    }

    pub fn scan(&self) -> Option<&ScanReport> {
        self.scan.as_ref()
    }
}
