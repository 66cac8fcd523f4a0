// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Errors surfaced by the cache service.
//!
//! Only correctness-path failures reach callers: serialization failures and
//! backend failures on writes that skipped the memory tier. Everything on a
//! background path (cleanup, optimizer ticks, preloads) is logged instead.

use thiserror::Error;

use crate::storage::traits::StorageError;

/// Error returned by a [`ValueProducer`](crate::ValueProducer).
pub type ProducerError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum CacheError {
    /// Value could not be turned into (or read back from) JSON.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persistent tier failure on a path that depended on it.
    #[error("Persistent tier failure: {0}")]
    Backend(#[from] StorageError),

    /// A value producer failed or timed out.
    #[error("Producer failed for '{key}': {reason}")]
    Producer {
        key: String,
        reason: String,
    },

    /// An operation needed an existing live entry.
    #[error("Key not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_converts() {
        let err: CacheError = StorageError::Backend("disk full".into()).into();
        assert!(matches!(err, CacheError::Backend(_)));
        assert_eq!(err.to_string(), "Persistent tier failure: Storage backend error: disk full");
    }

    #[test]
    fn test_serde_error_converts() {
        let parse: Result<u32, _> = serde_json::from_str::<u32>("\"nope\"");
        let err: CacheError = parse.unwrap_err().into();
        assert!(matches!(err, CacheError::Serialization(_)));
    }

    #[test]
    fn test_timeout_message() {
        let err = StorageError::Timeout { operation: "set", timeout_ms: 250 };
        assert_eq!(err.to_string(), "Backend set timed out after 250ms");
    }

    #[test]
    fn test_producer_message() {
        let err = CacheError::Producer { key: "k".into(), reason: "boom".into() };
        assert_eq!(err.to_string(), "Producer failed for 'k': boom");
    }
}
