//! Application configuration management.
//!
//! Configuration is stored at `~/.config/coursedesk/config.json` and can be
//! overridden by environment variables:
//!
//! - `COURSEDESK_AUTH_API_URL`: auth service base URL
//! - `COURSEDESK_COURSE_API_URL`: course service base URL
//! - `COURSEDESK_PRODUCTION`: `true`/`1` marks stored credentials secure and
//!   requires https base URLs
//! - `COURSEDESK_STORAGE`: `file`, `keyring` or `memory`

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::auth::{SessionSettings, TokenTtl};
use crate::storage::StorageKind;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "coursedesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_AUTH_API_URL: &str = "COURSEDESK_AUTH_API_URL";
const ENV_COURSE_API_URL: &str = "COURSEDESK_COURSE_API_URL";
const ENV_PRODUCTION: &str = "COURSEDESK_PRODUCTION";
const ENV_STORAGE: &str = "COURSEDESK_STORAGE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub auth_api_url: Option<String>,
    pub course_api_url: Option<String>,
    pub production: bool,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub skew_buffer_seconds: i64,
    pub storage: StorageKind,
    pub last_identifier: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth_api_url: None,
            course_api_url: None,
            production: false,
            access_token_ttl_minutes: 30,
            refresh_token_ttl_days: 7,
            skew_buffer_seconds: 60,
            storage: StorageKind::File,
            last_identifier: None,
        }
    }
}

impl Config {
    /// Load from the config file, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Environment overrides applied at load time are written back as well.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production code).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_AUTH_API_URL).filter(|v| !v.is_empty()) {
            self.auth_api_url = Some(url);
        }
        if let Some(url) = lookup(ENV_COURSE_API_URL).filter(|v| !v.is_empty()) {
            self.course_api_url = Some(url);
        }
        if let Some(flag) = lookup(ENV_PRODUCTION) {
            self.production = matches!(flag.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(kind) = lookup(ENV_STORAGE) {
            self.storage = kind
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .with_context(|| format!("Invalid {}", ENV_STORAGE))?;
        }
        Ok(())
    }

    /// Check that both services are configured and, in production, reachable
    /// only over https.
    pub fn validate(&self) -> Result<()> {
        let auth = self.auth_api_url()?;
        let course = self.course_api_url()?;

        if self.production {
            for (name, url) in [("auth", auth), ("course", course)] {
                if !url.starts_with("https://") {
                    bail!("{} service URL must use https in production: {}", name, url);
                }
            }
        }
        if self.access_token_ttl_minutes <= 0 || self.refresh_token_ttl_days <= 0 {
            bail!("Token lifetimes must be positive");
        }
        if self.skew_buffer_seconds < 0 {
            bail!("Skew buffer must not be negative");
        }
        Ok(())
    }

    pub fn auth_api_url(&self) -> Result<&str> {
        self.auth_api_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .with_context(|| format!("Auth service URL not configured (set {})", ENV_AUTH_API_URL))
    }

    pub fn course_api_url(&self) -> Result<&str> {
        self.course_api_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .with_context(|| {
                format!("Course service URL not configured (set {})", ENV_COURSE_API_URL)
            })
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            ttl: TokenTtl {
                access: Duration::minutes(self.access_token_ttl_minutes),
                refresh: Duration::days(self.refresh_token_ttl_days),
            },
            skew_buffer: Duration::seconds(self.skew_buffer_seconds),
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Cache directory for credentials and logs. Independent of the loaded
    /// config, so logging can start before it is read.
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("COURSEDESK_AUTH_API_URL", "https://dummyjson.com"),
                ("COURSEDESK_COURSE_API_URL", "https://example.mockapi.io/api/v1"),
                ("COURSEDESK_PRODUCTION", "true"),
                ("COURSEDESK_STORAGE", "memory"),
            ]))
            .expect("apply_env failed");

        assert_eq!(config.auth_api_url().ok(), Some("https://dummyjson.com"));
        assert!(config.production);
        assert_eq!(config.storage, StorageKind::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_storage_override() {
        let mut config = Config::default();
        assert!(config
            .apply_env(env(&[("COURSEDESK_STORAGE", "redis")]))
            .is_err());
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.auth_api_url = Some("http://localhost:3000".to_string());
        config.course_api_url = Some("http://localhost:4000".to_string());
        assert!(config.validate().is_ok());

        config.production = true;
        assert!(config.validate().is_err());

        config.production = false;
        config.skew_buffer_seconds = -5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cache_dir_needs_no_config() {
        if let Ok(dir) = Config::cache_dir() {
            assert!(dir.ends_with(APP_NAME));
        }
    }

    #[test]
    fn test_session_settings() {
        let settings = Config::default().session_settings();
        assert_eq!(settings.ttl.access, Duration::minutes(30));
        assert_eq!(settings.ttl.refresh, Duration::days(7));
        assert_eq!(settings.skew_buffer, Duration::seconds(60));
    }

    #[test]
    fn test_save_and_load_round_trip_with_defaults() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("nested").join(CONFIG_FILE);

        assert_eq!(Config::load_from(&path).expect("load failed"), Config::default());

        let config = Config {
            last_identifier: Some("a@b.com".to_string()),
            ..Config::default()
        };
        config.save_to(&path).expect("save failed");
        assert_eq!(Config::load_from(&path).expect("load failed"), config);

        // Missing fields fall back to defaults
        std::fs::write(&path, r#"{"production": true}"#).expect("write failed");
        let partial = Config::load_from(&path).expect("load failed");
        assert!(partial.production);
        assert_eq!(partial.access_token_ttl_minutes, 30);
    }
}
