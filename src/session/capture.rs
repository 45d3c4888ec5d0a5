//! CaptureWindow: time- and count-bounded arming
//!
//! Invariant: armed ⇔ now < armed_until ∧ matches_so_far < max_matches.
//! Expiry is evaluated lazily against the caller's `now`; there is no timer.

use serde::{Deserialize, Serialize};

/// Observable state at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureState {
    Disarmed,
    Armed,
}

/// Emitted once when an armed window lapses (by time or by match budget).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSummary {
    pub matches: u32,
    pub exhausted: bool,
    pub discovered_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureWindow {
    armed_until: f64,
    matches_so_far: u32,
    max_matches: u32,
    #[serde(skip)]
    summary_pending: bool,
}

impl CaptureWindow {
    pub fn new(max_matches: u32) -> Self {
        Self {
            armed_until: 0.0,
            matches_so_far: 0,
            max_matches: max_matches.max(1),
            summary_pending: false,
        }
    }

    /// Arm (or re-arm) for `duration_ms` from `now`. Counters always reset.
    pub fn arm(&mut self, now: f64, duration_ms: f64) {
        let duration = if duration_ms.is_finite() { duration_ms.max(0.0) } else { 0.0 };
        self.arm_until(now + duration);
    }

    /// Arm with an absolute deadline (used when resuming a pre-arm record).
    pub fn arm_until(&mut self, deadline: f64) {
        self.armed_until = deadline;
        self.matches_so_far = 0;
        self.summary_pending = true;
    }

    pub fn is_armed(&self, now: f64) -> bool {
        now < self.armed_until && self.matches_so_far < self.max_matches
    }

    pub fn state(&self, now: f64) -> CaptureState {
        if self.is_armed(now) {
            CaptureState::Armed
        } else {
            CaptureState::Disarmed
        }
    }

    /// Count one reported match. Returns true when this match used up the
    /// budget and the window disarmed.
    pub fn record_match(&mut self) -> bool {
        let was_open = self.matches_so_far < self.max_matches;
        self.matches_so_far = self.matches_so_far.saturating_add(1);
        was_open && self.matches_so_far >= self.max_matches
    }

    /// Watchdog check. Returns `(matches, exhausted)` exactly once per arm,
    /// on the first call after the window stops being armed.
    pub fn poll_expiry(&mut self, now: f64) -> Option<(u32, bool)> {
        if !self.summary_pending || self.is_armed(now) {
            return None;
        }
        self.summary_pending = false;
        Some((self.matches_so_far, self.matches_so_far >= self.max_matches))
    }

    pub fn armed_until(&self) -> f64 {
        self.armed_until
    }

    pub fn matches_so_far(&self) -> u32 {
        self.matches_so_far
    }

    pub fn max_matches(&self) -> u32 {
        self.max_matches
    }

    pub fn remaining_ms(&self, now: f64) -> f64 {
        if self.is_armed(now) {
            self.armed_until - now
        } else {
            0.0
        }
    }
}
