// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use dashmap::DashMap;
use super::traits::{PersistentBackend, StorageError};

/// Process-local [`PersistentBackend`] over a `DashMap`.
///
/// Used as the default backend in tests and demos, and by embedders that
/// only need the persistent tier as a larger, item-bounded second level.
pub struct InMemoryBackend {
    data: DashMap<String, String>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Get current key count
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw stored value, bypassing the cache (inspection in tests and demos).
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.data.get(key).map(|r| r.value().clone())
    }

    /// Write a raw value, bypassing the cache.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.data.insert(key.to_string(), value.to_string());
    }

    /// Clear all keys
    pub fn clear(&self) {
        self.data.clear();
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistentBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.data.get(key).map(|r| r.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.data.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .data
            .iter()
            .filter(|r| r.key().starts_with(prefix))
            .map(|r| r.key().clone())
            .collect())
    }
}
