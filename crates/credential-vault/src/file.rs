//! File-backed storage backend.
//!
//! Persists entries as a single JSON document at a caller-supplied path.
//! The file is created owner-readable only on unix.

use crate::{SecureStore, StoreError, StoreResult};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEntry {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl FileEntry {
    fn is_live(&self) -> bool {
        match self.expires_at {
            Some(at) => Utc::now() < at,
            None => true,
        }
    }
}

/// `SecureStore` backend persisting to a JSON file.
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles against the file.
    lock: Mutex<()>,
}

impl FileStore {
    /// Open a file store at `path`, creating parent directories as needed.
    pub fn new(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    fn read_entries(&self) -> StoreResult<HashMap<String, FileEntry>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&contents).map_err(|e| StoreError::Encoding(e.to_string()))
    }

    fn write_entries(&self, entries: &HashMap<String, FileEntry>) -> StoreResult<()> {
        let json =
            serde_json::to_string_pretty(entries).map_err(|e| StoreError::Encoding(e.to_string()))?;
        write_owner_only(&self.path, &json)?;
        Ok(())
    }

    fn insert(
        &self,
        key: &str,
        value: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let _guard = self.lock.lock().unwrap();
        let mut entries = self.read_entries()?;
        entries.retain(|_, e| e.is_live());
        entries.insert(
            key.to_string(),
            FileEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        self.write_entries(&entries)
    }
}

#[cfg(unix)]
fn write_owner_only(path: &Path, contents: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents.as_bytes())
}

#[cfg(not(unix))]
fn write_owner_only(path: &Path, contents: &str) -> std::io::Result<()> {
    std::fs::write(path, contents)
}

impl SecureStore for FileStore {
    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.insert(key, value, None)
    }

    fn set_expiring(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let expires_at = Utc::now()
            + ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::zero());
        self.insert(key, value, Some(expires_at))
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let _guard = self.lock.lock().unwrap();
        let entries = self.read_entries()?;
        match entries.get(key) {
            Some(entry) if entry.is_live() => Ok(Some(entry.value.clone())),
            _ => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        let _guard = self.lock.lock().unwrap();
        let mut entries = self.read_entries()?;
        let removed = entries.remove(key).is_some();
        if removed {
            self.write_entries(&entries)?;
        }
        Ok(removed)
    }
}
