//! Session storage abstraction
//!
//! The session state lives in whatever the embedding client can
//! persist — browser storage, a config dir, plain memory. The trait is
//! deliberately infallible: storage trouble degrades to "no session",
//! it never surfaces as an error to the session logic.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// String key/value store for session state.
pub trait SessionStore: Send + Sync {
    /// Read a value, `None` when absent.
    fn get(&self, key: &str) -> Option<String>;
    /// Write a value.
    fn set(&self, key: &str, value: &str);
    /// Remove a single key.
    fn remove(&self, key: &str);
    /// Remove everything.
    fn clear(&self);
}

/// In-memory store, the default for tests and embedded use.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.remove(key);
        }
    }

    fn clear(&self) {
        if let Ok(mut values) = self.values.lock() {
            values.clear();
        }
    }
}

/// File-backed store persisting the session map as a JSON object.
///
/// Mirrors the durability of browser local storage: state survives a
/// restart. IO or parse failures are logged and treated as an empty
/// store.
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl JsonFileStore {
    pub fn open(path: PathBuf) -> Self {
        let values = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    fn persist(&self, values: &HashMap<String, String>) {
        match serde_json::to_string_pretty(values) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    tracing::warn!(path = ?self.path, error = %e, "Failed to persist session store");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize session store");
            }
        }
    }
}

impl SessionStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
            self.persist(&values);
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.remove(key);
            self.persist(&values);
        }
    }

    fn clear(&self) {
        if let Ok(mut values) = self.values.lock() {
            values.clear();
            self.persist(&values);
        }
    }
}
