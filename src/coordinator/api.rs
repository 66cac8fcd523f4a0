// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Core cache operations.
//!
//! - `set()` / `set_with()` - write-through admission
//! - `get()` / `get_raw()` - read-through with promotion
//! - `delete()` / `has()` / `clear()`
//! - `cleanup()` - expiry purge and budget enforcement
//! - `promote()` / `extend_ttl()` - optimizer hooks

use std::sync::atomic::Ordering;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::entry::{now_millis, CacheEntry};
use crate::error::CacheError;
use crate::metrics::LatencyTimer;
use crate::tier::Lookup;

use super::{CleanupSummary, SetOptions, SetOutcome, TieredCache};

impl TieredCache {
    // --- Core CRUD Operations ---

    /// Store `value` under `key` with an optional TTL in seconds.
    ///
    /// `None` uses the configured default; `Some(0)` is a no-op that returns
    /// [`SetOutcome::NotCacheable`].
    pub async fn set<T>(&self, key: &str, value: &T, ttl_secs: Option<u64>) -> Result<SetOutcome, CacheError>
    where
        T: Serialize + ?Sized,
    {
        self.set_with(key, value, SetOptions { ttl_secs, ..Default::default() }).await
    }

    /// Store `value` under `key`.
    ///
    /// The value is serialized once. Entries up to `max_entry_bytes` are
    /// admitted to the memory tier (evicting as needed); every entry is
    /// written through to the persistent tier. When memory is skipped any
    /// older memory copy is dropped so the tiers never disagree. Reads that
    /// overlap the write cannot promote the value it replaces.
    ///
    /// A persistent failure is only an error if the memory tier was skipped.
    #[tracing::instrument(skip(self, value), fields(memory, persistent))]
    pub async fn set_with<T>(&self, key: &str, value: &T, options: SetOptions) -> Result<SetOutcome, CacheError>
    where
        T: Serialize + ?Sized,
    {
        let _timer = LatencyTimer::new("cache", "set");

        let ttl_secs = options.ttl_secs.unwrap_or(self.config.default_ttl_secs);
        if ttl_secs == 0 {
            debug!("TTL is zero, not caching");
            crate::metrics::record_operation("cache", "set", "not_cacheable");
            return Ok(SetOutcome::NotCacheable);
        }

        let payload = serde_json::to_string(value)?;
        let entry = CacheEntry::new(payload, ttl_secs, now_millis());
        let size = entry.size_bytes;

        let memory_copy = if options.force_persistent_only || size > self.config.max_entry_bytes {
            None
        } else {
            Some(entry.clone())
        };
        let ticket = self.memory.begin_write(key, memory_copy);
        let memory = ticket.outcome.admitted;
        if memory {
            crate::metrics::record_bytes_written("memory", size);
        }

        let written = self.persistent.put(key, &entry).await;
        self.memory.finish_write(key, &ticket);

        let persistent = match written {
            Ok(_) => {
                crate::metrics::record_bytes_written("persistent", size);
                true
            }
            Err(e) if memory => {
                warn!(error = %e, "Persistent write failed, value held in memory only");
                crate::metrics::record_error("persistent", "set", "backend");
                false
            }
            Err(e) => {
                warn!(error = %e, "Persistent write failed and memory tier was skipped");
                crate::metrics::record_error("persistent", "set", "backend");
                crate::metrics::record_operation("cache", "set", "error");
                return Err(e.into());
            }
        };

        tracing::Span::current().record("memory", memory);
        tracing::Span::current().record("persistent", persistent);
        self.tracker.record_write(key);
        crate::metrics::record_operation("cache", "set", "success");
        Ok(SetOutcome::Stored { memory, persistent })
    }

    /// Read `key` and deserialize it as `T`.
    ///
    /// Checks memory first, then the persistent tier. A persistent hit whose
    /// access count reaches `promotion_min_accesses` is copied into memory.
    /// A stored payload that does not match `T` is a
    /// [`CacheError::Serialization`].
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.fetch(key).await {
            Some(entry) => Ok(Some(serde_json::from_str(&entry.payload)?)),
            None => Ok(None),
        }
    }

    /// Read the raw JSON payload for `key`.
    pub async fn get_raw(&self, key: &str) -> Option<String> {
        self.fetch(key).await.map(|entry| entry.payload)
    }

    /// True if `get` would return a value. Counts as an access.
    pub async fn has(&self, key: &str) -> bool {
        self.fetch(key).await.is_some()
    }

    #[tracing::instrument(skip(self), fields(tier))]
    async fn fetch(&self, key: &str) -> Option<CacheEntry> {
        let _timer = LatencyTimer::new("cache", "get");
        let now = now_millis();

        // 1. Memory tier
        match self.memory.get(key, now) {
            Lookup::Hit(entry) => {
                self.memory_hits.fetch_add(1, Ordering::Relaxed);
                self.tracker.record_access(key, true);
                tracing::Span::current().record("tier", "memory");
                crate::metrics::record_operation("memory", "get", "hit");
                return Some(entry);
            }
            Lookup::Expired => {
                debug!("Memory entry expired");
                crate::metrics::record_expired("memory", 1);
            }
            Lookup::Miss => {
                crate::metrics::record_operation("memory", "get", "miss");
            }
        }

        // 2. Persistent tier
        let observed = self.memory.write_generation(key);
        match self.persistent.get(key, now).await {
            Ok(Lookup::Hit(entry)) => {
                self.persistent_hits.fetch_add(1, Ordering::Relaxed);
                self.tracker.record_access(key, true);
                tracing::Span::current().record("tier", "persistent");
                crate::metrics::record_operation("persistent", "get", "hit");

                if entry.access_count >= self.config.promotion_min_accesses
                    && entry.size_bytes <= self.config.max_entry_bytes
                {
                    let outcome = self.memory.admit_if_absent(key, entry.clone(), now, observed);
                    if outcome.admitted {
                        debug!(access_count = entry.access_count, "Promoted to memory tier");
                        crate::metrics::record_promotion("read");
                    }
                }
                return Some(entry);
            }
            Ok(Lookup::Expired) => {
                debug!("Persistent entry expired");
                crate::metrics::record_expired("persistent", 1);
            }
            Ok(Lookup::Miss) => {
                crate::metrics::record_operation("persistent", "get", "miss");
            }
            Err(e) => {
                warn!(error = %e, "Persistent lookup failed");
                crate::metrics::record_operation("persistent", "get", "error");
                crate::metrics::record_error("persistent", "get", "backend");
            }
        }

        // 3. Miss everywhere
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.tracker.record_access(key, false);
        None
    }

    /// Remove `key` from both tiers. Missing keys are not an error.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let _timer = LatencyTimer::new("cache", "delete");
        let ticket = self.memory.begin_write(key, None);
        let removed = self.persistent.remove(key).await;
        self.memory.finish_write(key, &ticket);
        let in_persistent = removed?;
        let in_memory = ticket.displaced;
        crate::metrics::record_operation("cache", "delete", "success");
        Ok(in_memory || in_persistent)
    }

    /// Empty both tiers and reset hit/miss counters.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), CacheError> {
        let memory = self.memory.clear();
        let persistent = self.persistent.clear().await?;
        self.reset_counters();
        info!(memory, persistent, "Cache cleared");
        crate::metrics::record_operation("cache", "clear", "success");
        Ok(())
    }

    /// Purge expired entries from both tiers, then re-enforce budgets.
    #[tracing::instrument(skip(self))]
    pub async fn cleanup(&self) -> CleanupSummary {
        let _timer = LatencyTimer::new("cache", "cleanup");
        let now = now_millis();

        let (memory_expired, memory_evicted) = self.memory.purge(now);
        let (persistent_expired, persistent_evicted) = self.persistent.purge(now).await;

        let summary = CleanupSummary {
            memory_expired,
            memory_evicted,
            persistent_expired,
            persistent_evicted,
        };
        if summary.total_removed() > 0 {
            info!(
                memory_expired,
                memory_evicted,
                persistent_expired,
                persistent_evicted,
                "Cleanup removed entries"
            );
        }
        crate::metrics::record_expired("memory", memory_expired);
        crate::metrics::record_expired("persistent", persistent_expired);
        crate::metrics::record_operation("cache", "cleanup", "success");
        self.update_gauge_metrics();
        summary
    }

    // --- Optimizer hooks ---

    /// Copy the persistent entry for `key` into memory regardless of its
    /// access count. Returns `Ok(false)` if already resident or too large.
    #[tracing::instrument(skip(self))]
    pub async fn promote(&self, key: &str) -> Result<bool, CacheError> {
        let now = now_millis();
        if self.memory.contains(key, now) {
            return Ok(false);
        }
        let observed = self.memory.write_generation(key);
        let entry = self
            .persistent
            .peek(key, now)
            .await?
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;

        if entry.size_bytes > self.config.max_entry_bytes {
            debug!(size = entry.size_bytes, "Entry too large to promote");
            return Ok(false);
        }
        let outcome = self.memory.admit_if_absent(key, entry, now, observed);
        if outcome.admitted {
            crate::metrics::record_promotion("forced");
        }
        Ok(outcome.admitted)
    }

    /// Re-store the live value for `key` with a fresh `ttl_secs` lifetime.
    ///
    /// The entry is rewritten (creation time and access count reset), keeping
    /// its current memory residency.
    #[tracing::instrument(skip(self))]
    pub async fn extend_ttl(&self, key: &str, ttl_secs: u64) -> Result<SetOutcome, CacheError> {
        let now = now_millis();
        let in_memory = self.memory.contains(key, now);
        let entry = match self.persistent.peek(key, now).await? {
            Some(entry) => entry,
            None => self
                .memory
                .get(key, now)
                .into_hit()
                .ok_or_else(|| CacheError::NotFound(key.to_string()))?,
        };

        let value: serde_json::Value = serde_json::from_str(&entry.payload)?;
        let options = SetOptions {
            ttl_secs: Some(ttl_secs),
            force_persistent_only: !in_memory,
        };
        self.set_with(key, &value, options).await
    }
}
