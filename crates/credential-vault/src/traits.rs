//! Storage trait definitions.

use crate::StoreResult;
use std::time::Duration;

/// Trait for scoped storage backends.
///
/// Entries may carry an expiry; implementations must treat an expired entry
/// as absent on read.
pub trait SecureStore: Send + Sync {
    /// Store a value with no expiry.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Store a value that lapses after `ttl`.
    fn set_expiring(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Retrieve a value. Expired entries read back as `None`.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Delete a value. Returns whether an entry was present.
    fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Check if a live entry exists for a key.
    fn has(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
