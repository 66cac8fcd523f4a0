// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Persistent tier over a [`PersistentBackend`].
//!
//! Entries are stored as JSON envelopes under `{prefix}{key}`. The tier keeps
//! an in-process index of the keys it knows about; the index carries the
//! authoritative access bookkeeping (the envelope keeps write-time metadata),
//! so reads never write back to the backend.
//!
//! Every operation holds the index lock for its whole duration, including
//! backend I/O. Backend calls are bounded by a timeout so the lock is never
//! held indefinitely.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::entry::CacheEntry;
use crate::eviction::{batch_size_for, EvictionCandidate, EvictionPolicy};
use crate::storage::traits::{PersistentBackend, StorageError};
use super::Lookup;

#[derive(Debug, Clone)]
struct IndexedMeta {
    created_at: u64,
    last_access: u64,
    access_count: u64,
    ttl_secs: u64,
    size_bytes: usize,
    seq: u64,
}

impl IndexedMeta {
    fn from_entry(entry: &CacheEntry, seq: u64) -> Self {
        Self {
            created_at: entry.created_at,
            last_access: entry.last_access,
            access_count: entry.access_count,
            ttl_secs: entry.ttl_secs,
            size_bytes: entry.size_bytes,
            seq,
        }
    }

    fn is_expired_at(&self, now: u64) -> bool {
        self.ttl_secs == 0 || now.saturating_sub(self.created_at) > self.ttl_secs.saturating_mul(1000)
    }
}

#[derive(Default)]
struct PersistentIndex {
    entries: HashMap<String, IndexedMeta>,
    next_seq: u64,
}

impl PersistentIndex {
    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn candidates(&self) -> Vec<EvictionCandidate> {
        self.entries
            .iter()
            .map(|(key, meta)| EvictionCandidate {
                key: key.clone(),
                size_bytes: meta.size_bytes,
                created_at: meta.created_at,
                last_access: meta.last_access,
                access_count: meta.access_count,
                seq: meta.seq,
            })
            .collect()
    }
}

/// Counts from an index warm-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmupSummary {
    pub loaded: usize,
    pub expired: usize,
    pub corrupt: usize,
}

enum Decoded {
    Live(CacheEntry),
    Expired,
    Corrupt(StorageError),
}

/// The larger, slower tier: bounded by item count only.
pub struct PersistentTier {
    backend: Arc<dyn PersistentBackend>,
    index: Mutex<PersistentIndex>,
    item_count: AtomicUsize,
    prefix: String,
    max_items: usize,
    policy: EvictionPolicy,
    timeout: Duration,
}

impl PersistentTier {
    pub fn new(
        backend: Arc<dyn PersistentBackend>,
        prefix: impl Into<String>,
        max_items: usize,
        policy: EvictionPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            index: Mutex::new(PersistentIndex::default()),
            item_count: AtomicUsize::new(0),
            prefix: prefix.into(),
            max_items,
            policy,
            timeout,
        }
    }

    /// Indexed entry count (no I/O).
    #[must_use]
    pub fn len(&self) -> usize {
        self.item_count.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Backend key for a cache key.
    #[must_use]
    pub fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Write `entry` under `key`, evicting by policy when the tier is full.
    /// Returns the number of entries evicted to make room.
    pub async fn put(&self, key: &str, entry: &CacheEntry) -> Result<usize, StorageError> {
        let envelope = serde_json::to_string(entry)
            .map_err(|e| StorageError::Backend(format!("envelope encoding failed: {}", e)))?;

        let mut index = self.index.lock().await;

        let mut evicted = 0;
        if !index.entries.contains_key(key) && index.entries.len() + 1 > self.max_items {
            let overflow = index.entries.len() + 1 - self.max_items;
            let count = batch_size_for(self.max_items).max(overflow);
            let victims = self.policy.select_victims(&index.candidates(), count);
            evicted = self.evict_locked(&mut index, &victims).await;
        }

        let storage_key = self.storage_key(key);
        match self.io("set", self.backend.set(&storage_key, &envelope)).await {
            Ok(()) => {
                let seq = index.next_seq();
                index.entries.insert(key.to_string(), IndexedMeta::from_entry(entry, seq));
                self.sync_count(&index);
                Ok(evicted)
            }
            Err(e) => {
                // The backend may still hold an older value; drop it so reads
                // cannot resurface it behind the new write
                if index.entries.remove(key).is_some() {
                    let _ = self.io("remove", self.backend.remove(&storage_key)).await;
                }
                self.sync_count(&index);
                Err(e)
            }
        }
    }

    /// Read `key`, applying access bookkeeping on a hit.
    ///
    /// Expired and corrupt envelopes are removed from the backend before
    /// returning; corruption is reported as [`Lookup::Miss`].
    pub async fn get(&self, key: &str, now: u64) -> Result<Lookup, StorageError> {
        self.load(key, now, true).await
    }

    /// Read `key` without counting an access.
    pub async fn peek(&self, key: &str, now: u64) -> Result<Option<CacheEntry>, StorageError> {
        Ok(self.load(key, now, false).await?.into_hit())
    }

    /// True if `key` is indexed and not expired (no I/O).
    pub async fn contains(&self, key: &str, now: u64) -> bool {
        self.index
            .lock()
            .await
            .entries
            .get(key)
            .is_some_and(|meta| !meta.is_expired_at(now))
    }

    async fn load(&self, key: &str, now: u64, touch: bool) -> Result<Lookup, StorageError> {
        let mut index = self.index.lock().await;
        let storage_key = self.storage_key(key);

        let Some(raw) = self.io("get", self.backend.get(&storage_key)).await? else {
            if index.entries.remove(key).is_some() {
                self.sync_count(&index);
            }
            return Ok(Lookup::Miss);
        };

        match Self::decode(key, &raw, now) {
            Decoded::Corrupt(err) => {
                warn!(error = %err, "Corrupt persistent entry, removing");
                crate::metrics::record_corruption("persistent");
                self.remove_locked(&mut index, key).await;
                Ok(Lookup::Miss)
            }
            Decoded::Expired => {
                debug!(key = %key, "Persistent entry expired");
                self.remove_locked(&mut index, key).await;
                Ok(Lookup::Expired)
            }
            Decoded::Live(mut entry) => {
                let meta = match index.entries.get_mut(key) {
                    Some(meta) => meta,
                    None => {
                        // Written by an earlier process; adopt envelope metadata
                        let seq = index.next_seq();
                        index
                            .entries
                            .entry(key.to_string())
                            .or_insert_with(|| IndexedMeta::from_entry(&entry, seq))
                    }
                };
                if touch {
                    meta.last_access = now;
                    meta.access_count = meta.access_count.saturating_add(1);
                }
                entry.last_access = meta.last_access;
                entry.access_count = meta.access_count;
                self.sync_count(&index);
                Ok(Lookup::Hit(entry))
            }
        }
    }

    /// Remove `key` from index and backend. Returns whether it was indexed.
    pub async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let mut index = self.index.lock().await;
        let was_indexed = index.entries.remove(key).is_some();
        self.sync_count(&index);
        self.io("remove", self.backend.remove(&self.storage_key(key))).await?;
        Ok(was_indexed)
    }

    /// Remove every prefixed key from the backend and reset the index.
    pub async fn clear(&self) -> Result<usize, StorageError> {
        let mut index = self.index.lock().await;
        let mut keys: Vec<String> = self.io("keys_with_prefix", self.backend.keys_with_prefix(&self.prefix)).await?;
        for key in index.entries.keys() {
            let storage_key = self.storage_key(key);
            if !keys.contains(&storage_key) {
                keys.push(storage_key);
            }
        }

        let mut removed = 0;
        for storage_key in &keys {
            match self.io("remove", self.backend.remove(storage_key)).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(key = %storage_key, error = %e, "Failed to remove persistent entry during clear"),
            }
        }
        index.entries.clear();
        self.sync_count(&index);
        Ok(removed)
    }

    /// Remove expired entries, then evict by policy while over budget.
    /// Returns `(expired, evicted)`.
    pub async fn purge(&self, now: u64) -> (usize, usize) {
        let mut index = self.index.lock().await;

        let expired: Vec<String> = index
            .entries
            .iter()
            .filter(|(_, meta)| meta.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove_locked(&mut index, key).await;
        }

        let mut evicted = 0;
        if index.entries.len() > self.max_items {
            let victims = self
                .policy
                .select_victims(&index.candidates(), index.entries.len() - self.max_items);
            evicted = self.evict_locked(&mut index, &victims).await;
        }

        self.sync_count(&index);
        (expired.len(), evicted)
    }

    /// Rebuild the index from the backend, dropping expired and corrupt
    /// envelopes along the way.
    pub async fn warm_index(&self, now: u64) -> Result<WarmupSummary, StorageError> {
        let mut index = self.index.lock().await;
        let keys = self.io("keys_with_prefix", self.backend.keys_with_prefix(&self.prefix)).await?;
        let mut summary = WarmupSummary::default();

        for storage_key in keys {
            let Some(key) = storage_key.strip_prefix(&self.prefix).map(str::to_string) else {
                continue;
            };
            let raw = match self.io("get", self.backend.get(&storage_key)).await {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping unreadable persistent entry during warm-up");
                    continue;
                }
            };
            match Self::decode(&key, &raw, now) {
                Decoded::Live(entry) => {
                    let seq = index.next_seq();
                    index.entries.insert(key, IndexedMeta::from_entry(&entry, seq));
                    summary.loaded += 1;
                }
                Decoded::Expired => {
                    self.remove_locked(&mut index, &key).await;
                    summary.expired += 1;
                }
                Decoded::Corrupt(err) => {
                    warn!(error = %err, "Corrupt persistent entry found during warm-up, removing");
                    crate::metrics::record_corruption("persistent");
                    self.remove_locked(&mut index, &key).await;
                    summary.corrupt += 1;
                }
            }
        }

        self.sync_count(&index);
        info!(
            loaded = summary.loaded,
            expired = summary.expired,
            corrupt = summary.corrupt,
            "Persistent index warm-up complete"
        );
        Ok(summary)
    }

    fn decode(key: &str, raw: &str, now: u64) -> Decoded {
        let corrupt = |reason: String| {
            Decoded::Corrupt(StorageError::Corruption {
                key: key.to_string(),
                reason,
            })
        };
        let entry: CacheEntry = match serde_json::from_str(raw) {
            Ok(entry) => entry,
            Err(e) => return corrupt(e.to_string()),
        };
        if let Err(reason) = entry.validate() {
            return corrupt(reason);
        }
        if entry.is_expired_at(now) {
            return Decoded::Expired;
        }
        Decoded::Live(entry)
    }

    async fn evict_locked(&self, index: &mut PersistentIndex, victims: &[String]) -> usize {
        let mut count = 0;
        let mut bytes = 0;
        for key in victims {
            if let Some(meta) = index.entries.get(key) {
                bytes += meta.size_bytes;
            }
            self.remove_locked(index, key).await;
            count += 1;
        }
        if count > 0 {
            debug!(evicted = count, "Evicted entries from persistent tier");
            crate::metrics::record_eviction("persistent", "items", count, bytes);
        }
        count
    }

    /// Best-effort removal from backend and index.
    async fn remove_locked(&self, index: &mut PersistentIndex, key: &str) {
        index.entries.remove(key);
        if let Err(e) = self.io("remove", self.backend.remove(&self.storage_key(key))).await {
            warn!(key = %key, error = %e, "Failed to remove persistent entry");
            crate::metrics::record_error("persistent", "remove", "backend");
        }
    }

    fn sync_count(&self, index: &PersistentIndex) {
        self.item_count.store(index.entries.len(), Ordering::Release);
    }

    /// Run one backend call under the configured timeout.
    async fn io<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                crate::metrics::record_timeout("persistent", operation);
                Err(StorageError::Timeout {
                    operation,
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }
}
