//! SessionContext: the per-execution-context state
//!
//! Owns the capture window, learned filter, results sink and discovery log,
//! together with the storage and clock they are persisted/evaluated against.
//! Created at context start (reading learned state and any pending pre-arm
//! record), shared as a `SessionHandle`, and dropped with the context.

pub mod storage;
pub mod capture;
pub mod learning;
pub mod sink;

pub use storage::*;
pub use capture::*;
pub use learning::*;
pub use sink::*;

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::config::ProbeConfig;
use crate::intercept::{Directive, DiscoveryLog};

/// Single-threaded shared handle.
pub type SessionHandle = Rc<RefCell<SessionContext>>;

pub struct SessionContext {
    config: ProbeConfig,
    storage: Box<dyn SessionStorage>,
    clock: Box<dyn Clock>,
    capture: CaptureWindow,
    learning: LearningStore,
    sink: ResultsSink,
    discovery: DiscoveryLog,
}

impl SessionContext {
    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    pub fn start(
        config: ProbeConfig,
        storage: impl SessionStorage + 'static,
        clock: impl Clock + 'static,
    ) -> Self {
        let learning = LearningStore::load(&storage, &config.storage);
        let capture = CaptureWindow::new(config.capture.max_matches);
        let discovery = DiscoveryLog::new(config.endpoints.discovery_log_limit);

        let mut ctx = Self {
            config,
            storage: Box::new(storage),
            clock: Box::new(clock),
            capture,
            learning,
            sink: ResultsSink::new(),
            discovery,
        };
        ctx.resume_prearm();
        ctx
    }

    pub fn into_handle(self) -> SessionHandle {
        Rc::new(RefCell::new(self))
    }

    /// A pre-arm record is consumed on read, so a window survives exactly
    /// one navigation.
    fn resume_prearm(&mut self) {
        let key = self.config.storage.prearm_key();
        let Some(raw) = self.storage.get(&key) else {
            return;
        };
        if let Err(e) = self.storage.remove(&key) {
            warn!(error = %e, category = %e.category(), "could not consume pre-arm record");
        }

        let now = self.now();
        match raw.trim().parse::<f64>() {
            Ok(deadline) if deadline.is_finite() && deadline > now => {
                self.capture.arm_until(deadline);
                info!(remaining_ms = deadline - now, "resumed capture window after navigation");
            }
            Ok(_) => debug!("discarded stale pre-arm record"),
            Err(_) => warn!(value = %raw, "discarded unreadable pre-arm record"),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn now(&self) -> f64 {
        self.clock.now_ms()
    }

    pub fn storage(&self) -> &dyn SessionStorage {
        self.storage.as_ref()
    }

    pub fn capture(&self) -> &CaptureWindow {
        &self.capture
    }

    pub fn is_armed(&self) -> bool {
        self.capture.is_armed(self.now())
    }

    pub fn learned(&self) -> &LearnedFilter {
        self.learning.filter()
    }

    pub fn sink(&self) -> &ResultsSink {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut ResultsSink {
        &mut self.sink
    }

    pub fn discovery(&self) -> &DiscoveryLog {
        &self.discovery
    }

    pub fn discovery_mut(&mut self) -> &mut DiscoveryLog {
        &mut self.discovery
    }

    // -------------------------------------------------------------------------
    // Capture window
    // -------------------------------------------------------------------------

    /// Arm (or re-arm) the capture window and persist the pre-arm record.
    /// `None` or a non-finite duration falls back to the configured default.
    pub fn arm(&mut self, duration_ms: Option<f64>) {
        let duration = duration_ms
            .filter(|d| d.is_finite())
            .unwrap_or(self.config.capture.default_duration_ms);
        let now = self.now();
        self.capture.arm(now, duration);
        self.discovery.clear();

        let key = self.config.storage.prearm_key();
        let deadline = self.capture.armed_until();
        let persisted = if deadline > now {
            self.storage.set(&key, &format!("{:.0}", deadline))
        } else {
            self.storage.remove(&key)
        };
        if let Err(e) = persisted {
            warn!(error = %e, "pre-arm record not persisted; window will not survive navigation");
        }
        info!(duration_ms = duration, max_matches = self.capture.max_matches(), "capture window armed");
    }

    pub fn record_match(&mut self) {
        if self.capture.record_match() {
            if let Err(e) = self.storage.remove(&self.config.storage.prearm_key()) {
                warn!(error = %e, "could not clear pre-arm record");
            }
            info!(matches = self.capture.matches_so_far(), "match budget exhausted, capture window disarmed");
        }
    }

    /// Watchdog: summary of a window that has just lapsed.
    pub fn poll_expiry(&mut self) -> Option<CaptureSummary> {
        let now = self.now();
        let (matches, exhausted) = self.capture.poll_expiry(now)?;
        let summary = CaptureSummary {
            matches,
            exhausted,
            discovered_paths: self.discovery.paths().to_vec(),
        };
        info!(
            matches = summary.matches,
            exhausted = summary.exhausted,
            discovered = summary.discovered_paths.len(),
            "capture window closed"
        );
        Some(summary)
    }

    // -------------------------------------------------------------------------
    // Learning / reporting
    // -------------------------------------------------------------------------

    pub fn reset_learning(&mut self) {
        if let Err(e) = self.learning.clear(self.storage.as_ref()) {
            warn!(error = %e, "learned filter cleared in memory only");
        }
        info!("learned filter reset");
    }

    pub fn apply_directive(&mut self, directive: Directive) {
        match directive {
            Directive::Arm { duration_ms } => self.arm(duration_ms),
            Directive::Reset => self.reset_learning(),
        }
    }

    /// Append a report, learn from it if nothing is learned yet, and count
    /// one match against the window.
    pub fn report(&mut self, report: NetworkReport, endpoint: Option<&str>) {
        let keys = report.keys();
        self.append_report(report, endpoint, &keys);
    }

    /// Reports produced by one intercepted call, in order. Learning takes
    /// the keys of the whole call. Each non-empty report counts one match
    /// and reporting stops as soon as the window closes. Returns the number
    /// of hits appended.
    pub fn report_call(&mut self, reports: Vec<NetworkReport>, endpoint: Option<&str>) -> usize {
        let keys: Vec<String> = reports.iter().flat_map(NetworkReport::keys).collect();
        let mut appended = 0;
        for report in reports {
            if report.hits.is_empty() {
                continue;
            }
            if !self.is_armed() {
                break;
            }
            appended += report.hits.len();
            self.append_report(report, endpoint, &keys);
        }
        appended
    }

    fn append_report(&mut self, report: NetworkReport, endpoint: Option<&str>, learn_keys: &[String]) {
        if report.hits.is_empty() {
            return;
        }
        info!(
            source = %report.source,
            origin = %report.origin,
            hits = report.hits.len(),
            "date hits reported"
        );
        self.sink.append(report);

        match self.learning.record_if_empty(self.storage.as_ref(), endpoint, learn_keys) {
            Ok(true) => info!(endpoint = ?endpoint, keys = ?learn_keys, "learned filter recorded"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "learned filter kept in memory only"),
        }
        self.record_match();
    }
}
