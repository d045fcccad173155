//! In-memory storage backend.

use crate::{SecureStore, StoreResult};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self) -> bool {
        match self.expires_at {
            Some(at) => Utc::now() < at,
            None => true,
        }
    }
}

/// In-memory `SecureStore` backend.
///
/// Used by tests and by callers that want a session confined to the process
/// lifetime.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, key: &str, value: &str, expires_at: Option<DateTime<Utc>>) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
    }
}

impl SecureStore for MemoryStore {
    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.insert(key, value, None);
        Ok(())
    }

    fn set_expiring(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let expires_at = Utc::now()
            + ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::zero());
        self.insert(key, value, Some(expires_at));
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.is_live() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }
}
