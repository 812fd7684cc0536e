//! Named, expiry-bound key-value storage for session credentials.
//!
//! Every entry carries its own expiry horizon and cookie-style security
//! attributes. Expired entries read as absent and are dropped lazily on
//! read, so callers never see a value past its horizon.
//!
//! Backends:
//! - `MemoryStorage`: process-local map (tests, ephemeral sessions)
//! - `FileStorage`: JSON document in the cache directory, owner-only permissions
//! - `KeyringStorage`: OS keychain via `keyring`

pub mod file;
pub mod keychain;
pub mod memory;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use self::file::FileStorage;
pub use self::keychain::KeyringStorage;
pub use self::memory::MemoryStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// Security markers attached to each stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryAttributes {
    /// Not exposed to scripts or other readers where the medium allows it
    pub http_only: bool,
    /// Only ever sent over secure transport
    pub secure: bool,
    pub same_site: SameSite,
}

impl EntryAttributes {
    /// Attributes for credential entries. `secure` is only set in production.
    pub fn credential(production: bool) -> Self {
        Self {
            http_only: true,
            secure: production,
            same_site: SameSite::Strict,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub attributes: EntryAttributes,
}

impl StoredEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A storage medium exposing get/set/remove by name.
pub trait StorageBackend: Send + Sync {
    fn get(&self, name: &str) -> Result<Option<StoredEntry>>;

    fn set(&self, name: &str, entry: StoredEntry) -> Result<()>;

    /// Removing a missing entry is not an error.
    fn remove(&self, name: &str) -> Result<()>;

    /// Read an entry's value if it exists and hasn't expired.
    ///
    /// Never fails: backend errors are logged and read as absent. Expired
    /// entries are removed on the way out.
    fn get_live(&self, name: &str) -> Option<String> {
        match self.get(name) {
            Ok(Some(entry)) if entry.is_expired_at(Utc::now()) => {
                debug!(name, expired_at = %entry.expires_at, "Dropping expired entry");
                if let Err(e) = self.remove(name) {
                    warn!(name, error = %e, "Failed to remove expired entry");
                }
                None
            }
            Ok(Some(entry)) => Some(entry.value),
            Ok(None) => None,
            Err(e) => {
                warn!(name, error = %e, "Failed to read storage entry");
                None
            }
        }
    }
}

/// Which backend holds the credentials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    File,
    Keyring,
    Memory,
}

impl std::str::FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(StorageKind::File),
            "keyring" => Ok(StorageKind::Keyring),
            "memory" => Ok(StorageKind::Memory),
            other => Err(format!("Unknown storage backend: {}", other)),
        }
    }
}

/// Open the configured backend. `cache_dir` is only used by the file backend.
pub fn open(kind: StorageKind, cache_dir: &Path) -> Result<Arc<dyn StorageBackend>> {
    debug!(?kind, ?cache_dir, "Opening credential storage");
    Ok(match kind {
        StorageKind::File => Arc::new(FileStorage::new(cache_dir)?),
        StorageKind::Keyring => Arc::new(KeyringStorage::new()),
        StorageKind::Memory => Arc::new(MemoryStorage::new()),
    })
}
