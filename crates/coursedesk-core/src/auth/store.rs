use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use tracing::{debug, warn};

use crate::models::UserProfile;
use crate::storage::{EntryAttributes, StorageBackend, StoredEntry};

/// Storage entry names
pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_KEY: &str = "user_data";

/// Access token, refresh token and the user they were issued to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserProfile,
}

/// Expiry horizons for persisted entries.
///
/// The user snapshot lives as long as the refresh token, since it's only
/// useful while a session can still be resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtl {
    pub access: Duration,
    pub refresh: Duration,
}

impl TokenTtl {
    pub fn access_minutes(&self) -> i64 {
        self.access.num_minutes()
    }
}

impl Default for TokenTtl {
    fn default() -> Self {
        Self {
            access: Duration::minutes(30),
            refresh: Duration::days(7),
        }
    }
}

/// Persisted credential entries on top of a storage backend.
///
/// Reads never fail: missing, expired or unparsable entries are absent.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn StorageBackend>,
    attributes: EntryAttributes,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn StorageBackend>, production: bool) -> Self {
        Self {
            backend,
            attributes: EntryAttributes::credential(production),
        }
    }

    pub fn attributes(&self) -> EntryAttributes {
        self.attributes
    }

    /// Full credential, only if all three entries are present and valid.
    pub fn read(&self) -> Option<Credential> {
        Some(Credential {
            access_token: self.access_token()?,
            refresh_token: self.refresh_token()?,
            user: self.user()?,
        })
    }

    pub fn access_token(&self) -> Option<String> {
        self.backend
            .get_live(ACCESS_TOKEN_KEY)
            .filter(|t| !t.is_empty())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.backend
            .get_live(REFRESH_TOKEN_KEY)
            .filter(|t| !t.is_empty())
    }

    pub fn user(&self) -> Option<UserProfile> {
        let raw = self.backend.get_live(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Cached user snapshot is corrupt, treating as absent");
                None
            }
        }
    }

    /// Persist all three entries with their own expiry horizons.
    pub fn write(&self, credential: &Credential, ttl: &TokenTtl) -> Result<()> {
        let user_json =
            serde_json::to_string(&credential.user).context("Failed to serialize user snapshot")?;

        self.write_access_token(&credential.access_token, ttl)?;
        self.write_refresh_token(&credential.refresh_token, ttl)?;
        self.put(USER_KEY, user_json, ttl.refresh)?;

        debug!(user_id = credential.user.id, "Credential written");
        Ok(())
    }

    pub fn write_access_token(&self, token: &str, ttl: &TokenTtl) -> Result<()> {
        self.put(ACCESS_TOKEN_KEY, token.to_string(), ttl.access)
    }

    pub fn write_refresh_token(&self, token: &str, ttl: &TokenTtl) -> Result<()> {
        self.put(REFRESH_TOKEN_KEY, token.to_string(), ttl.refresh)
    }

    /// Remove every entry. Idempotent; failures are logged, not returned.
    pub fn clear(&self) {
        for name in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.backend.remove(name) {
                warn!(name, error = %e, "Failed to remove credential entry");
            }
        }
        debug!("Credential store cleared");
    }

    fn put(&self, name: &str, value: String, ttl: Duration) -> Result<()> {
        let entry = StoredEntry {
            value,
            expires_at: Utc::now() + ttl,
            attributes: self.attributes,
        };
        self.backend
            .set(name, entry)
            .with_context(|| format!("Failed to store {}", name))
    }
}
