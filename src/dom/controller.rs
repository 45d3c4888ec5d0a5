//! RangeScanController: one scan activation and its retry loop.
//!
//! State machine: Idle → Retrying → Finished(reason), or Idle → Finished
//! directly when the first pass qualifies. A new activation supersedes the
//! previous one. The driver (wasm timer + mutation observer) keeps its
//! watchers alive only while `is_watching()` holds and re-arms its single
//! timer to `next_wakeup()` after every call.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::aggregate::ScanReport;
use super::retry::{RetryAction, RetryScheduler};
use super::scanner::DomRangeScanner;
use super::DomElement;
use crate::config::ScanConfig;
use crate::error::Result;
use crate::extract::Scalar;
use crate::session::{DateHit, HitSource, SessionHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Found,
    Ceiling,
    Superseded,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Retrying,
    Finished(FinishReason),
}

pub struct RangeScanController {
    session: SessionHandle,
    scanner: DomRangeScanner,
    config: ScanConfig,
    retry: Option<RetryScheduler>,
    phase: ScanPhase,
    activation: u64,
    pass: u32,
}

impl RangeScanController {
    pub fn new(session: SessionHandle) -> Result<Self> {
        let config = session.borrow().config().scan.clone();
        Ok(Self {
            scanner: DomRangeScanner::new(&config)?,
            session,
            config,
            retry: None,
            phase: ScanPhase::Idle,
            activation: 0,
            pass: 0,
        })
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    /// Number of activations started so far.
    pub fn activation(&self) -> u64 {
        self.activation
    }

    /// Whether the driver should keep its mutation watch and timer.
    pub fn is_watching(&self) -> bool {
        self.phase == ScanPhase::Retrying
    }

    pub fn next_wakeup(&self) -> Option<f64> {
        match self.phase {
            ScanPhase::Retrying => self.retry.as_ref().and_then(RetryScheduler::next_wakeup),
            _ => None,
        }
    }

    /// First pass. Publishes unconditionally; starts the retry loop when
    /// nothing qualifying turned up.
    pub fn activate<E: DomElement>(&mut self, root: &E, frame_url: &str) -> ScanReport {
        if self.phase == ScanPhase::Retrying {
            info!(activation = self.activation, "scan superseded by new activation");
            self.finish(FinishReason::Superseded);
        }
        self.activation += 1;
        self.pass = 1;

        let report = self.scanner.scan(root, frame_url, self.pass);
        self.publish(&report);

        if report.is_qualifying() {
            self.finish(FinishReason::Found);
        } else {
            let now = self.session.borrow().now();
            self.retry = Some(RetryScheduler::start(now, &self.config));
            self.phase = ScanPhase::Retrying;
            info!(
                activation = self.activation,
                ceiling_ms = self.config.ceiling_ms,
                "no date-range elements yet, watching for hydration"
            );
        }
        report
    }

    /// Structural-change notification from the driver.
    pub fn on_structure_change(&mut self) {
        if self.phase != ScanPhase::Retrying {
            return;
        }
        let now = self.session.borrow().now();
        if let Some(retry) = self.retry.as_mut() {
            retry.notify_change(now);
        }
    }

    /// Timer callback. Returns the report of a rescan when one ran.
    pub fn on_timer<E: DomElement>(&mut self, root: &E, frame_url: &str) -> Option<ScanReport> {
        if self.phase != ScanPhase::Retrying {
            return None;
        }
        let now = self.session.borrow().now();
        let action = self.retry.as_mut().map_or(RetryAction::Expired, |r| r.poll(now));

        match action {
            RetryAction::Idle => None,
            RetryAction::Expired => {
                self.finish(FinishReason::Ceiling);
                None
            }
            RetryAction::Rescan => {
                self.pass += 1;
                let report = self.scanner.scan(root, frame_url, self.pass);
                debug!(pass = self.pass, candidates = report.all.len(), "rescan");
                if !report.unique.is_empty() {
                    self.publish(&report);
                }
                if report.is_qualifying() {
                    self.finish(FinishReason::Found);
                } else if self.retry.as_ref().is_some_and(|r| r.is_past_ceiling(now)) {
                    self.finish(FinishReason::Ceiling);
                }
                Some(report)
            }
        }
    }

    pub fn cancel(&mut self) {
        if self.phase == ScanPhase::Retrying {
            self.finish(FinishReason::Cancelled);
        }
    }

    fn finish(&mut self, reason: FinishReason) {
        if let Some(retry) = self.retry.as_mut() {
            retry.finish();
        }
        self.retry = None;
        self.phase = ScanPhase::Finished(reason);
        debug!(activation = self.activation, pass = self.pass, reason = ?reason, "scan finished");
    }

    /// Store the report and mirror the top complete range as DOM hits.
    fn publish(&self, report: &ScanReport) {
        let mut ctx = self.session.borrow_mut();
        ctx.sink_mut().publish_scan(report.clone());

        match report.top() {
            Some(top) => info!(
                frame = %top.range.frame,
                start = ?top.range.start_iso,
                end_inclusive = ?top.range.end_inclusive_iso,
                days = ?top.range.duration_days,
                count = top.count,
                unique = report.unique.len(),
                blocked = report.blocked.len(),
                "most common range"
            ),
            None => info!(blocked = report.blocked.len(), "no date-range elements found (yet)"),
        }

        let Some(top) = report.top().filter(|t| t.range.is_complete()) else {
            return;
        };
        let range = &top.range;
        let (start_key, end_key) = match &range.attributes {
            Some(pair) => (pair.start.clone(), pair.end.clone()),
            None => ("start".to_string(), "end".to_string()),
        };
        let bounds = [
            (start_key, range.start_epoch_seconds, range.start_iso.clone()),
            (end_key, range.end_epoch_seconds, range.end_exclusive_iso.clone()),
        ];
        for (key, epoch, iso) in bounds {
            let raw_value = epoch.map(|e| Scalar::Number(e).to_json()).unwrap_or(Value::Null);
            ctx.sink_mut().push_hit(DateHit {
                key,
                raw_value,
                iso,
                source: HitSource::DomAttribute,
                origin: range.frame.clone(),
            });
        }
    }
}
