//! LearningStore: learn-once, narrow-thereafter
//!
//! The first report that produces hits records its endpoint (origin + path)
//! and keys. Until the filter is cleared, later writes are ignored and the
//! classifiers run in precision mode.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::storage::SessionStorage;
use crate::config::StorageConfig;
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedFilter {
    pub endpoint: Option<String>,
    pub keys: Vec<String>,
}

impl LearnedFilter {
    pub fn is_empty(&self) -> bool {
        self.endpoint.is_none() && self.keys.is_empty()
    }
}

pub struct LearningStore {
    filter: LearnedFilter,
    endpoint_key: String,
    keys_key: String,
}

impl LearningStore {
    /// Read the learned filter persisted by an earlier context, if any.
    pub fn load(storage: &dyn SessionStorage, config: &StorageConfig) -> Self {
        let endpoint_key = config.endpoint_key();
        let keys_key = config.keys_key();

        let endpoint = storage
            .get(&endpoint_key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let keys = match storage.get(&keys_key) {
            None => Vec::new(),
            Some(raw) => match serde_json::from_str::<Vec<Option<String>>>(&raw) {
                Ok(list) => list.into_iter().flatten().collect(),
                Err(e) => {
                    warn!(key = %keys_key, error = %e, "ignoring unreadable learned keys");
                    Vec::new()
                }
            },
        };

        Self {
            filter: LearnedFilter { endpoint, keys },
            endpoint_key,
            keys_key,
        }
    }

    pub fn filter(&self) -> &LearnedFilter {
        &self.filter
    }

    /// Record the first success. Returns `Ok(true)` when this call learned
    /// something. The in-memory filter narrows even if persisting fails.
    pub fn record_if_empty(
        &mut self,
        storage: &dyn SessionStorage,
        endpoint: Option<&str>,
        keys: &[String],
    ) -> Result<bool> {
        if !self.filter.is_empty() {
            return Ok(false);
        }

        let mut unique: Vec<String> = Vec::with_capacity(keys.len());
        for key in keys {
            if !unique.contains(key) {
                unique.push(key.clone());
            }
        }

        self.filter = LearnedFilter {
            endpoint: endpoint.map(str::to_string),
            keys: unique,
        };
        if self.filter.is_empty() {
            return Ok(false);
        }

        if let Some(ep) = &self.filter.endpoint {
            storage.set(&self.endpoint_key, ep)?;
        }
        if !self.filter.keys.is_empty() {
            let encoded = serde_json::to_string(&self.filter.keys)
                .map_err(|e| crate::error::ProbeError::internal(e.to_string()))?;
            storage.set(&self.keys_key, &encoded)?;
        }
        Ok(true)
    }

    /// Forget the learned filter, in memory and in storage.
    pub fn clear(&mut self, storage: &dyn SessionStorage) -> Result<()> {
        self.filter = LearnedFilter::default();
        storage.remove(&self.endpoint_key)?;
        storage.remove(&self.keys_key)?;
        Ok(())
    }
}
