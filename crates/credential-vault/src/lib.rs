//! Scoped credential storage for the authentication core.
//!
//! This crate provides:
//! - A `SecureStore` trait for key/value storage with per-entry expiry
//! - A `MemoryStore` backend for tests and ephemeral sessions
//! - A `FileStore` backend persisting to a single owner-readable file
//! - The `TokenStore` that owns the current credential pair

mod file;
mod keys;
mod memory;
mod token_store;
mod traits;

pub use file::FileStore;
pub use keys::StoreKeys;
pub use memory::MemoryStore;
pub use token_store::{CredentialPair, SessionMeta, TokenStore, REFRESH_HORIZON};
pub use traits::SecureStore;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend-specific storage error
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;
