//! Durable key-value storage trait and the in-memory backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use passvault_common::{Error, Result};

/// Durable key-value storage for session state.
///
/// Implementations must apply each `write` atomically: either every put and
/// every removal becomes visible, or none does.
pub trait KeyValueStore: Send {
    /// Backend name for logging (e.g. "sqlite", "memory").
    fn name(&self) -> &str;

    /// Read one value.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Apply `puts` and `removals` in one atomic step.
    fn write(&mut self, puts: &[(&str, String)], removals: &[&str]) -> Result<()>;
}

/// In-memory key-value store.
///
/// Clones share the same map, which lets tests simulate a restart by opening
/// a second `SessionStore` over a clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> Error {
        Error::Storage("memory store lock poisoned".to_string())
    }
}

impl KeyValueStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn write(&mut self, puts: &[(&str, String)], removals: &[&str]) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        for (key, value) in puts {
            entries.insert((*key).to_string(), value.clone());
        }
        for key in removals {
            entries.remove(*key);
        }
        Ok(())
    }
}
