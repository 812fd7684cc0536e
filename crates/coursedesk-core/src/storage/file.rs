use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, warn};

use super::{StorageBackend, StoredEntry};

/// Credentials file name in cache directory
const CREDENTIALS_FILE: &str = "credentials.json";

/// Stores every entry in a single JSON document.
///
/// The file is replaced atomically on each change and always ends up with
/// owner-only permissions on unix. A corrupt file reads as empty.
pub struct FileStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir).with_context(|| {
            format!("Failed to create cache directory: {}", cache_dir.display())
        })?;
        Ok(Self {
            path: cache_dir.join(CREDENTIALS_FILE),
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> HashMap<String, StoredEntry> {
        if !self.path.exists() {
            return HashMap::new();
        }
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to read credentials file");
                return HashMap::new();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to parse credentials file, ignoring it");
                HashMap::new()
            }
        }
    }

    fn save(&self, entries: &HashMap<String, StoredEntry>) -> Result<()> {
        if entries.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path).context("Failed to remove credentials file")?;
            }
            return Ok(());
        }

        let contents = serde_json::to_string_pretty(entries)?;
        let dir = self
            .path
            .parent()
            .ok_or_else(|| anyhow!("Credentials file has no parent directory"))?;

        // Replace by renaming a sibling temp file over the target
        let mut file = tempfile::NamedTempFile::new_in(dir)
            .context("Failed to create temporary credentials file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))
                .context("Failed to restrict credentials file permissions")?;
        }
        file.write_all(contents.as_bytes())
            .context("Failed to write credentials file")?;
        file.as_file()
            .sync_all()
            .context("Failed to flush credentials file")?;
        file.persist(&self.path)
            .map_err(|e| e.error)
            .context("Failed to replace credentials file")?;
        debug!(path = ?self.path, entries = entries.len(), "Credentials file saved");
        Ok(())
    }
}

impl StorageBackend for FileStorage {
    fn get(&self, name: &str) -> Result<Option<StoredEntry>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("File storage lock poisoned"))?;
        Ok(self.load().remove(name))
    }

    fn set(&self, name: &str, entry: StoredEntry) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("File storage lock poisoned"))?;
        let mut entries = self.load();
        entries.insert(name.to_string(), entry);
        self.save(&entries)
    }

    fn remove(&self, name: &str) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("File storage lock poisoned"))?;
        let mut entries = self.load();
        if entries.remove(name).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}
