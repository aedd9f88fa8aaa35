//! Core traits for the tile cache.
//!
//! The `Cache` trait is a small key-value interface over raw bytes. Keys are
//! the deterministic strings produced by
//! [`TileIdentity::cache_key`](crate::coord::TileIdentity::cache_key); values
//! are the encoded tile payloads exactly as the remote source served them.
//!
//! # Design Principles
//!
//! - **String keys**: Human-readable in logs and on disk
//! - **Vec<u8> values**: Raw bytes, decoding is the caller's concern
//! - **Dyn-compatible**: Uses `Pin<Box<dyn Future>>` so callers can hold `Arc<dyn Cache>`

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum ServiceCacheError {
    /// I/O error during cache operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key contains characters that cannot appear in a file name.
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),

    /// Failed to run a blocking cache operation.
    #[error("Failed to spawn task: {0}")]
    SpawnError(String),
}

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Content cache for tile payloads.
///
/// Implementations must tolerate concurrent calls for distinct keys. A
/// concurrent `set` and `get` on the same key must never expose a partially
/// written value.
pub trait Cache: Send + Sync {
    /// Store a value with the given key, replacing any previous value.
    fn set(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), ServiceCacheError>>;

    /// Retrieve a value by key.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(data))` if the key exists
    /// - `Ok(None)` if the key is not found
    /// - `Err(_)` if an error occurs
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, ServiceCacheError>>;

    /// Delete a value by key.
    ///
    /// Returns `Ok(true)` if the key existed and was deleted.
    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>>;

    /// Check if a key exists without retrieving the value.
    fn contains(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>>;
}

/// Validates that a key only uses `[A-Za-z0-9_.-]` and is not a dot path.
pub fn validate_key(key: &str) -> Result<(), ServiceCacheError> {
    let valid_chars = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if key.is_empty() || !valid_chars || key.starts_with('.') {
        return Err(ServiceCacheError::InvalidKey(key.to_string()));
    }
    Ok(())
}
