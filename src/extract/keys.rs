//! KeyClassifier: does a field name look like a stay boundary?
//!
//! Three tiers, first applicable wins:
//! 1. learned keys (exact membership) once the session has a confirmed hit
//! 2. fixed whitelist of canonical field names
//! 3. case-insensitive pattern over check-in/out, arrival/departure,
//!    start/end and from/to variants

use std::collections::HashSet;

use regex::Regex;

use crate::config::KeyConfig;
use crate::error::{ProbeError, Result};

/// Which tier accepted a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTier {
    Learned,
    Whitelist,
    Pattern,
}

pub struct KeyClassifier {
    whitelist: HashSet<String>,
    pattern: Regex,
}

impl KeyClassifier {
    pub fn new(config: &KeyConfig) -> Result<Self> {
        let pattern =
            Regex::new(&config.pattern).map_err(|e| ProbeError::pattern("keys.pattern", e))?;
        Ok(Self {
            whitelist: config.whitelist.iter().cloned().collect(),
            pattern,
        })
    }

    /// Classify `key` given the session's learned keys.
    pub fn classify(&self, key: &str, learned: &[String]) -> Option<KeyTier> {
        if !learned.is_empty() {
            return learned
                .iter()
                .any(|k| k == key)
                .then_some(KeyTier::Learned);
        }
        if self.whitelist.contains(key) {
            return Some(KeyTier::Whitelist);
        }
        self.pattern.is_match(key).then_some(KeyTier::Pattern)
    }

    pub fn allows(&self, key: &str, learned: &[String]) -> bool {
        self.classify(key, learned).is_some()
    }
}

impl Default for KeyClassifier {
    fn default() -> Self {
        Self {
            whitelist: crate::config::DEFAULT_KEY_WHITELIST
                .iter()
                .map(|s| s.to_string())
                .collect(),
            pattern: Regex::new(crate::config::DEFAULT_KEY_PATTERN)
                .expect("default key pattern compiles"),
        }
    }
}
