//! Configuration types and defaults for RangeTap
//!
//! Every field has a default, so `{}` is a valid configuration. The wasm
//! binding deserializes the same structure from a `JsValue`.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, Result};

// =============================================================================
// Capture Window
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureConfig {
    /// Duration used when an arm request carries no usable `durationMs`. Default: 15000
    pub default_duration_ms: f64,
    /// Reports accepted before the window disarms itself. Default: 3
    pub max_matches: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: 15_000.0,
            max_matches: 3,
        }
    }
}

// =============================================================================
// Endpoint Classification
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EndpointConfig {
    /// Path substring that pins inspection to one endpoint family.
    pub pinned_path: Option<String>,
    /// Trusted domain family for discovery mode. Empty means "the page's own
    /// registrable-looking suffix" (last two host labels).
    pub trusted_domains: Vec<String>,
    /// Upper bound on remembered discovery paths. Default: 50
    pub discovery_log_limit: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            pinned_path: None,
            trusted_domains: Vec::new(),
            discovery_log_limit: 50,
        }
    }
}

// =============================================================================
// Key Classification
// =============================================================================

pub const DEFAULT_KEY_WHITELIST: &[&str] = &[
    "checkInDate",
    "checkOutDate",
    "checkIn",
    "checkOut",
    "check_in",
    "check_out",
    "checkin",
    "checkout",
    "arrivalDate",
    "departureDate",
    "startDate",
    "endDate",
    "fromDate",
    "toDate",
    "dateFrom",
    "dateTo",
    "date-from",
    "date-to",
];

pub const DEFAULT_KEY_PATTERN: &str = concat!(
    r"(?i)^(?:",
    r"check[\s_-]?(?:in|out)(?:[\s_-]?(?:date|day|time))?",
    r"|(?:arrival|departure|arrive|depart)(?:[\s_-]?(?:date|day|time))?",
    r"|(?:stay[\s_-]?)?(?:start|end)(?:[\s_-]?(?:date|day|time))?",
    r"|(?:date[\s_-]?)?(?:from|to)(?:[\s_-]?date)?",
    r")$"
);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeyConfig {
    pub whitelist: Vec<String>,
    pub pattern: String,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            whitelist: DEFAULT_KEY_WHITELIST.iter().map(|s| s.to_string()).collect(),
            pattern: DEFAULT_KEY_PATTERN.to_string(),
        }
    }
}

// =============================================================================
// Object Walker
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WalkerConfig {
    /// Container nesting levels entered below the root. Default: 3
    pub max_depth: usize,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self { max_depth: 3 }
    }
}

// =============================================================================
// DOM Scanner
// =============================================================================

/// Pair of attribute names carrying range boundaries (epoch seconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributePair {
    pub start: String,
    pub end: String,
}

impl AttributePair {
    pub fn new(start: &str, end: &str) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
        }
    }
}

pub const DEFAULT_RANGE_TAGS: &[&str] = &["range-datepicker-cell"];

pub const DEFAULT_ATTRIBUTE_PAIRS: &[(&str, &str)] = &[
    ("date-from", "date-to"),
    ("data-date-from", "data-date-to"),
    ("data-start-date", "data-end-date"),
    ("start-date", "end-date"),
    ("data-checkin", "data-checkout"),
];

pub const DEFAULT_BROADENED_PATTERN: &str =
    r"(?i)check[\s_-]?(?:in|out)|date[\s_-]?range|arrival|departure|(?:start|end)[\s_-]?date";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanConfig {
    pub range_tags: Vec<String>,
    pub attribute_pairs: Vec<AttributePair>,
    /// Also qualify elements by accessible name / attribute names. Default: false
    pub broadened: bool,
    pub broadened_pattern: String,
    /// Hard ceiling for the retry loop. Default: 6000
    pub ceiling_ms: f64,
    /// Coalescing window for structural-change bursts. Default: 150
    pub debounce_ms: f64,
    /// Absolute-delay fallback rescans. Default: 500, 1500, 3000, 5000
    pub seed_delays_ms: Vec<f64>,
    /// How many nested embedded frames are entered. Default: 3
    pub max_frame_depth: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            range_tags: DEFAULT_RANGE_TAGS.iter().map(|s| s.to_string()).collect(),
            attribute_pairs: DEFAULT_ATTRIBUTE_PAIRS
                .iter()
                .map(|(s, e)| AttributePair::new(s, e))
                .collect(),
            broadened: false,
            broadened_pattern: DEFAULT_BROADENED_PATTERN.to_string(),
            ceiling_ms: 6_000.0,
            debounce_ms: 150.0,
            seed_delays_ms: vec![500.0, 1_500.0, 3_000.0, 5_000.0],
            max_frame_depth: 3,
        }
    }
}

// =============================================================================
// Storage Keys
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageConfig {
    pub key_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key_prefix: "rangetap".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn prearm_key(&self) -> String {
        format!("{}.prearm", self.key_prefix)
    }

    pub fn endpoint_key(&self) -> String {
        format!("{}.learned.endpoint", self.key_prefix)
    }

    pub fn keys_key(&self) -> String {
        format!("{}.learned.keys", self.key_prefix)
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProbeConfig {
    pub capture: CaptureConfig,
    pub endpoints: EndpointConfig,
    pub keys: KeyConfig,
    pub walker: WalkerConfig,
    pub scan: ScanConfig,
    pub storage: StorageConfig,
}

impl ProbeConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ProbeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capture.max_matches == 0 {
            return Err(ProbeError::config("capture.maxMatches must be at least 1"));
        }
        if !self.capture.default_duration_ms.is_finite() || self.capture.default_duration_ms < 0.0 {
            return Err(ProbeError::config(
                "capture.defaultDurationMs must be a non-negative number",
            ));
        }
        if self.walker.max_depth == 0 {
            return Err(ProbeError::config("walker.maxDepth must be at least 1"));
        }
        if !(self.scan.debounce_ms > 0.0) {
            return Err(ProbeError::config("scan.debounceMs must be positive"));
        }
        if !(self.scan.ceiling_ms >= self.scan.debounce_ms) {
            return Err(ProbeError::config(
                "scan.ceilingMs must be at least scan.debounceMs",
            ));
        }
        if self.scan.seed_delays_ms.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err(ProbeError::config("scan.seedDelaysMs must be non-negative"));
        }
        if self.storage.key_prefix.is_empty() {
            return Err(ProbeError::config("storage.keyPrefix must not be empty"));
        }
        Regex::new(&self.keys.pattern).map_err(|e| ProbeError::pattern("keys.pattern", e))?;
        Regex::new(&self.scan.broadened_pattern)
            .map_err(|e| ProbeError::pattern("scan.broadenedPattern", e))?;
        Ok(())
    }
}
