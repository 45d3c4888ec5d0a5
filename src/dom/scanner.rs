//! DomRangeScanner: one pass over the element tree.
//!
//! Depth-first, document order. At each element: the element itself, then
//! an embedded frame document (at the frame element's position), then the
//! attached shadow root, then light children. Iterative with an explicit
//! stack, so deep trees do not grow the call stack.

use std::rc::Rc;

use regex::Regex;
use tracing::{debug, warn};

use super::aggregate::{aggregate, ScanReport, ScanStats};
use super::candidate::RangeCandidate;
use super::node::{DomElement, FrameAccess};
use crate::config::{AttributePair, ScanConfig};
use crate::error::{ProbeError, Result};

struct Pending<E> {
    element: E,
    frame: Rc<str>,
    frame_depth: usize,
}

pub struct DomRangeScanner {
    range_tags: Vec<String>,
    pairs: Vec<AttributePair>,
    broadened: Option<Regex>,
    max_frame_depth: usize,
}

impl DomRangeScanner {
    pub fn new(config: &ScanConfig) -> Result<Self> {
        let broadened = if config.broadened {
            Some(Regex::new(&config.broadened_pattern).map_err(|e| ProbeError::pattern("scan.broadenedPattern", e))?)
        } else {
            None
        };
        Ok(Self {
            range_tags: config.range_tags.iter().map(|t| t.to_ascii_lowercase()).collect(),
            pairs: config.attribute_pairs.clone(),
            broadened,
            max_frame_depth: config.max_frame_depth,
        })
    }

    /// Scan the tree under `root`, a document whose URL is `frame_url`.
    pub fn scan<E: DomElement>(&self, root: &E, frame_url: &str, pass: u32) -> ScanReport {
        let started = instant::Instant::now();
        let mut report = ScanReport::default();
        let mut stats = ScanStats {
            pass,
            ..ScanStats::default()
        };

        let mut stack = vec![Pending {
            element: root.clone(),
            frame: Rc::from(frame_url),
            frame_depth: 0,
        }];

        while let Some(Pending {
            element,
            frame,
            frame_depth,
        }) = stack.pop()
        {
            stats.elements_visited += 1;
            if let Some(candidate) = self.inspect(&element, &frame) {
                report.all.push(candidate);
            }

            // Pushed in reverse of visiting order
            for child in element.children().into_iter().rev() {
                stack.push(Pending {
                    element: child,
                    frame: Rc::clone(&frame),
                    frame_depth,
                });
            }
            for child in element.shadow_children().into_iter().rev() {
                stack.push(Pending {
                    element: child,
                    frame: Rc::clone(&frame),
                    frame_depth,
                });
            }

            match element.frame() {
                None => {}
                Some(FrameAccess::Blocked(blocked)) => {
                    debug!(src = ?blocked.src, reason = %blocked.reason, "frame not accessible");
                    stats.frames_blocked += 1;
                    report.blocked.push(blocked);
                }
                Some(FrameAccess::Accessible { url, root }) => {
                    if frame_depth >= self.max_frame_depth {
                        warn!(url = %url, depth = frame_depth, "frame nesting limit reached, not descending");
                    } else {
                        stats.frames_scanned += 1;
                        stack.push(Pending {
                            element: root,
                            frame: Rc::from(url.as_str()),
                            frame_depth: frame_depth + 1,
                        });
                    }
                }
            }
        }

        report.unique = aggregate(&report.all);
        stats.candidates = report.all.len();
        stats.unique_ranges = report.unique.len();
        stats.elapsed_us = started.elapsed().as_micros() as u64;
        report.stats = stats;
        report
    }

    fn inspect<E: DomElement>(&self, element: &E, frame: &str) -> Option<RangeCandidate> {
        let tag = element.tag_name();
        let complete = self
            .pairs
            .iter()
            .find(|p| element.has_attribute(&p.start) && element.has_attribute(&p.end));

        let qualifies = complete.is_some() || self.range_tags.contains(&tag) || self.matches_broadened(element);
        if !qualifies {
            return None;
        }

        // Partial pairs still say which attributes a range cell uses
        let pair = complete.or_else(|| {
            self.pairs
                .iter()
                .find(|p| element.has_attribute(&p.start) || element.has_attribute(&p.end))
        });
        let (start_raw, end_raw) = match pair {
            Some(p) => (element.attribute(&p.start), element.attribute(&p.end)),
            None => (None, None),
        };

        Some(RangeCandidate::from_attributes(
            frame,
            &tag,
            element.element_id(),
            pair.cloned(),
            start_raw.as_deref(),
            end_raw.as_deref(),
        ))
    }

    fn matches_broadened<E: DomElement>(&self, element: &E) -> bool {
        let Some(pattern) = &self.broadened else {
            return false;
        };
        element.accessible_name().is_some_and(|name| pattern.is_match(&name))
            || element.attribute_names().iter().any(|n| pattern.is_match(n))
    }
}
