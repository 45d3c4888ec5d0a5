//! ScanAggregator and the published scan report.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::candidate::RangeCandidate;
use super::node::BlockedFrame;

/// A distinct (start, end) range and how many elements carried it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueRange {
    #[serde(flatten)]
    pub range: RangeCandidate,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    /// 1 for the activation pass, incremented per retry.
    pub pass: u32,
    pub elements_visited: usize,
    pub frames_scanned: usize,
    pub frames_blocked: usize,
    pub candidates: usize,
    pub unique_ranges: usize,
    pub elapsed_us: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub all: Vec<RangeCandidate>,
    pub unique: Vec<UniqueRange>,
    pub blocked: Vec<BlockedFrame>,
    pub stats: ScanStats,
}

impl ScanReport {
    /// Most frequent range.
    pub fn top(&self) -> Option<&UniqueRange> {
        self.unique.first()
    }

    /// At least one candidate with both boundaries.
    pub fn is_qualifying(&self) -> bool {
        self.all.iter().any(RangeCandidate::is_complete)
    }
}

/// Fold candidates into unique ranges, most frequent first. Ties keep
/// first-seen order; the first occurrence supplies the range's fields.
pub fn aggregate(candidates: &[RangeCandidate]) -> Vec<UniqueRange> {
    let mut index: HashMap<(Option<u64>, Option<u64>), usize> = HashMap::new();
    let mut unique: Vec<UniqueRange> = Vec::new();

    for candidate in candidates {
        match index.get(&candidate.range_key()) {
            Some(&i) => unique[i].count += 1,
            None => {
                index.insert(candidate.range_key(), unique.len());
                unique.push(UniqueRange {
                    range: candidate.clone(),
                    count: 1,
                });
            }
        }
    }

    // stable: equal counts stay in first-seen order
    unique.sort_by(|a, b| b.count.cmp(&a.count));
    unique
}
