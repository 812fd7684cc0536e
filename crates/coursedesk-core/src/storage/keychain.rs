use anyhow::{Context, Result};
use keyring::Entry;

use super::{StorageBackend, StoredEntry};

const SERVICE_NAME: &str = "coursedesk";

/// Stores each entry as a JSON envelope in the OS keychain.
#[derive(Debug, Clone)]
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, name: &str) -> Result<Entry> {
        Entry::new(&self.service, name).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for KeyringStorage {
    fn get(&self, name: &str) -> Result<Option<StoredEntry>> {
        match self.entry(name)?.get_password() {
            Ok(raw) => {
                let entry = serde_json::from_str(&raw)
                    .context("Failed to parse keychain entry")?;
                Ok(Some(entry))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve entry from keychain"),
        }
    }

    fn set(&self, name: &str, entry: StoredEntry) -> Result<()> {
        let raw = serde_json::to_string(&entry)?;
        self.entry(name)?
            .set_password(&raw)
            .context("Failed to store entry in keychain")?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        match self.entry(name)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete entry from keychain"),
        }
    }
}
