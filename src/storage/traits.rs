// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Backend {operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },
    #[error("Corrupt entry for '{key}': {reason}")]
    Corruption {
        key: String,
        reason: String,
    },
}

/// Byte-persistence backend behind the persistent tier.
///
/// The backend stores opaque strings; the cache does all serialization.
/// Implementations only need to be correct per key, the tier serializes
/// its own mutations.
#[async_trait]
pub trait PersistentBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Full keys (prefix included) starting with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}
