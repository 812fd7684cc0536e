use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};

use super::{StorageBackend, StoredEntry};

/// In-process storage. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held, expired or not
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, name: &str) -> Result<Option<StoredEntry>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("Memory storage lock poisoned"))?;
        Ok(entries.get(name).cloned())
    }

    fn set(&self, name: &str, entry: StoredEntry) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("Memory storage lock poisoned"))?;
        entries.insert(name.to_string(), entry);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("Memory storage lock poisoned"))?;
        entries.remove(name);
        Ok(())
    }
}
