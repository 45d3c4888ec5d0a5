//! ObjectWalker / DateExtractor
//!
//! Bounded-depth, cycle-safe traversal of a nested payload. Every keyed
//! scalar whose key passes the `KeyClassifier` and whose value normalizes to
//! an instant becomes an `ExtractedDate`. Sequence elements inherit the key
//! of the field holding the sequence.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::keys::KeyClassifier;
use super::normalize::normalize_scalar;
use super::payload::PayloadNode;

/// One key/value pair that classified and normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDate {
    pub key: String,
    pub raw: Value,
    pub iso: String,
}

pub struct DateExtractor<'a> {
    classifier: &'a KeyClassifier,
    learned_keys: &'a [String],
    max_depth: usize,
}

struct WalkState {
    visited: HashSet<usize>,
    hits: Vec<ExtractedDate>,
}

impl<'a> DateExtractor<'a> {
    pub fn new(classifier: &'a KeyClassifier, learned_keys: &'a [String], max_depth: usize) -> Self {
        Self {
            classifier,
            learned_keys,
            max_depth,
        }
    }

    pub fn extract<N: PayloadNode>(&self, root: &N) -> Vec<ExtractedDate> {
        let mut state = WalkState {
            visited: HashSet::new(),
            hits: Vec::new(),
        };
        self.walk(root, None, 0, &mut state);
        state.hits
    }

    fn walk<N: PayloadNode>(&self, node: &N, key: Option<&str>, depth: usize, state: &mut WalkState) {
        if let Some(scalar) = node.scalar() {
            let Some(key) = key else { return };
            if !self.classifier.allows(key, self.learned_keys) {
                return;
            }
            if let Some(iso) = normalize_scalar(&scalar) {
                state.hits.push(ExtractedDate {
                    key: key.to_string(),
                    raw: node.raw(),
                    iso,
                });
            }
            return;
        }

        if depth >= self.max_depth {
            return;
        }
        if let Some(id) = node.identity() {
            if !state.visited.insert(id) {
                return;
            }
        }

        node.for_each_entry(&mut |child_key, child| {
            let effective = child_key.or(key);
            self.walk(child, effective, depth + 1, state);
        });
    }
}
