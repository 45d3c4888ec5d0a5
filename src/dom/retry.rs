//! RetryScheduler: debounce with an absolute ceiling, plus seed rescans.
//!
//! Pure state machine over caller-supplied timestamps (epoch ms). A
//! structural-change signal (re)sets the single pending deadline; seeds are
//! fixed absolute rescans that fire even if no change signal ever arrives.
//! Nothing is scheduled past the ceiling.

use tracing::debug;

use crate::config::ScanConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Nothing due yet.
    Idle,
    /// A debounced or seeded rescan is due now.
    Rescan,
    /// Ceiling reached with nothing left to run; the scheduler is finished.
    Expired,
}

#[derive(Debug, Clone)]
pub struct RetryScheduler {
    ceiling_at: f64,
    debounce_ms: f64,
    pending: Option<f64>,
    /// Absolute seed times, ascending.
    seeds: Vec<f64>,
    finished: bool,
}

impl RetryScheduler {
    pub fn start(now: f64, config: &ScanConfig) -> Self {
        let ceiling_at = now + config.ceiling_ms;
        let mut seeds: Vec<f64> = config
            .seed_delays_ms
            .iter()
            .map(|d| now + d)
            .filter(|t| *t <= ceiling_at)
            .collect();
        seeds.sort_by(|a, b| a.total_cmp(b));
        Self {
            ceiling_at,
            debounce_ms: config.debounce_ms,
            pending: None,
            seeds,
            finished: false,
        }
    }

    /// Coalesce a change signal into the pending rescan. Returns false once
    /// the scheduler is finished or past its ceiling.
    pub fn notify_change(&mut self, now: f64) -> bool {
        if self.finished || now >= self.ceiling_at {
            return false;
        }
        self.pending = Some((now + self.debounce_ms).min(self.ceiling_at));
        true
    }

    pub fn poll(&mut self, now: f64) -> RetryAction {
        if self.finished {
            return RetryAction::Idle;
        }

        let mut due = false;
        if self.pending.is_some_and(|t| t <= now) {
            self.pending = None;
            due = true;
        }
        let before = self.seeds.len();
        self.seeds.retain(|t| *t > now);
        if self.seeds.len() < before {
            due = true;
        }

        if due {
            return RetryAction::Rescan;
        }
        if now >= self.ceiling_at {
            debug!("retry ceiling reached");
            self.finished = true;
            return RetryAction::Expired;
        }
        RetryAction::Idle
    }

    /// Earliest time `poll` can return something other than `Idle`.
    pub fn next_wakeup(&self) -> Option<f64> {
        if self.finished {
            return None;
        }
        let mut next = self.ceiling_at;
        if let Some(p) = self.pending {
            next = next.min(p);
        }
        if let Some(s) = self.seeds.first() {
            next = next.min(*s);
        }
        Some(next)
    }

    pub fn is_past_ceiling(&self, now: f64) -> bool {
        now >= self.ceiling_at
    }

    pub fn finish(&mut self) {
        self.finished = true;
        self.pending = None;
        self.seeds.clear();
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn ceiling_at(&self) -> f64 {
        self.ceiling_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ScanConfig {
        ScanConfig::default()
    }

    #[test]
    fn test_burst_coalesces_into_one_rescan() {
        let mut s = RetryScheduler::start(0.0, &config());
        s.notify_change(100.0);
        s.notify_change(180.0);
        s.notify_change(250.0);
        assert_eq!(s.next_wakeup(), Some(400.0));
        assert_eq!(s.poll(399.0), RetryAction::Idle);
        assert_eq!(s.poll(400.0), RetryAction::Rescan);
        assert_eq!(s.poll(450.0), RetryAction::Idle);
    }

    #[test]
    fn test_seeds_fire_without_changes() {
        let mut s = RetryScheduler::start(0.0, &config());
        assert_eq!(s.next_wakeup(), Some(500.0));
        assert_eq!(s.poll(500.0), RetryAction::Rescan);
        assert_eq!(s.next_wakeup(), Some(1_500.0));
        // a late poll consumes every overdue seed at once
        assert_eq!(s.poll(3_200.0), RetryAction::Rescan);
        assert_eq!(s.next_wakeup(), Some(5_000.0));
    }

    #[test]
    fn test_stops_at_ceiling() {
        let mut s = RetryScheduler::start(0.0, &config());
        assert_eq!(s.poll(5_000.0), RetryAction::Rescan);
        assert_eq!(s.next_wakeup(), Some(6_000.0));
        s.notify_change(5_950.0);
        assert_eq!(s.next_wakeup(), Some(6_000.0), "debounce clamped to the ceiling");
        assert_eq!(s.poll(6_000.0), RetryAction::Rescan);
        assert_eq!(s.poll(6_000.0), RetryAction::Expired);
        assert!(s.is_finished());
        assert!(!s.notify_change(6_100.0));
        assert_eq!(s.next_wakeup(), None);
    }

    #[test]
    fn test_seeds_beyond_ceiling_dropped() {
        let cfg = ScanConfig {
            ceiling_ms: 2_000.0,
            ..config()
        };
        let mut s = RetryScheduler::start(1_000.0, &cfg);
        assert_eq!(s.poll(2_500.0), RetryAction::Rescan);
        assert_eq!(s.next_wakeup(), Some(3_000.0));
        assert_eq!(s.poll(3_000.0), RetryAction::Expired);
    }

    #[test]
    fn test_finish_cancels_everything() {
        let mut s = RetryScheduler::start(0.0, &config());
        s.notify_change(10.0);
        s.finish();
        assert_eq!(s.poll(10_000.0), RetryAction::Idle);
        assert_eq!(s.next_wakeup(), None);
    }
}
