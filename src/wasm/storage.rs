use web_sys::Storage;

use super::describe_js;
use crate::error::{ProbeError, Result};
use crate::session::SessionStorage;

/// Web Storage area. Reads that throw (disabled storage, opaque origins)
/// behave like absent keys.
pub struct WebSessionStorage {
    area: Storage,
}

impl WebSessionStorage {
    pub fn session() -> Option<Self> {
        let area = web_sys::window()?.session_storage().ok()??;
        Some(Self { area })
    }

    pub fn local() -> Option<Self> {
        let area = web_sys::window()?.local_storage().ok()??;
        Some(Self { area })
    }
}

impl SessionStorage for WebSessionStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.area.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.area
            .set_item(key, value)
            .map_err(|e| ProbeError::storage(key, "write", describe_js(&e)))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.area
            .remove_item(key)
            .map_err(|e| ProbeError::storage(key, "remove", describe_js(&e)))
    }

    fn entries(&self) -> Vec<(String, String)> {
        let len = self.area.length().unwrap_or(0);
        (0..len)
            .filter_map(|i| self.area.key(i).ok().flatten())
            .filter_map(|k| self.get(&k).map(|v| (k, v)))
            .collect()
    }
}
