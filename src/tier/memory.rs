// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::entry::CacheEntry;
use crate::eviction::{batch_size_for, select_for_bytes, EvictionCandidate, EvictionPolicy};
use super::Lookup;

struct MemorySlot {
    entry: CacheEntry,
    seq: u64,
}

/// Per-key write generations, guarded by the tier's write lock.
///
/// A coordinated write bumps its key's generation when it starts and again
/// when it finishes. A promotion carries the generation observed before its
/// persistent read and only lands if that generation is still current.
#[derive(Default)]
struct WriteLog {
    next: u64,
    /// Reported for keys with no write in flight; raised whenever one retires.
    floor: u64,
    in_flight: HashMap<String, KeyWrites>,
}

struct KeyWrites {
    generation: u64,
    /// Generation of the most recently started write.
    latest_start: u64,
    pending: usize,
}

impl WriteLog {
    fn generation(&self, key: &str) -> u64 {
        self.in_flight.get(key).map_or(self.floor, |w| w.generation)
    }

    fn bump(&mut self) -> u64 {
        self.next += 1;
        self.next
    }
}

/// Handle for a write started with [`MemoryTier::begin_write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteTicket {
    generation: u64,
    slot_seq: Option<u64>,
    pub outcome: AdmitOutcome,
    /// A previous copy of the key was resident when the write started.
    pub displaced: bool,
}

/// Outcome of a memory-tier admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmitOutcome {
    pub admitted: bool,
    pub evicted: usize,
}

/// The fast tier: bounded by item count and cumulative payload bytes.
///
/// Reads go straight to the `DashMap` (shard-level locking only). Structural
/// mutations (admission, eviction, delete, purge, clear) are serialized by
/// `write_lock`, so the budget check and the insert it guards are atomic with
/// respect to other writers. The lock also holds the [`WriteLog`] that keeps
/// read-path promotions from resurrecting a value a write has replaced.
pub struct MemoryTier {
    entries: DashMap<String, MemorySlot>,
    total_bytes: AtomicUsize,
    next_seq: AtomicU64,
    write_lock: Mutex<WriteLog>,
    max_items: usize,
    max_bytes: usize,
    policy: EvictionPolicy,
}

impl MemoryTier {
    pub fn new(max_items: usize, max_bytes: usize, policy: EvictionPolicy) -> Self {
        Self {
            entries: DashMap::new(),
            total_bytes: AtomicUsize::new(0),
            next_seq: AtomicU64::new(0),
            write_lock: Mutex::new(WriteLog::default()),
            max_items,
            max_bytes,
            policy,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.total_bytes.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn max_items(&self) -> usize {
        self.max_items
    }

    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Byte usage as a fraction of the budget (0.0 - 1.0+).
    #[must_use]
    pub fn usage_ratio(&self) -> f64 {
        if self.max_bytes == 0 {
            0.0
        } else {
            self.total_bytes() as f64 / self.max_bytes as f64
        }
    }

    /// Look up a key, applying access bookkeeping on a hit.
    ///
    /// An expired entry is removed before returning [`Lookup::Expired`].
    pub fn get(&self, key: &str, now: u64) -> Lookup {
        match self.entries.get_mut(key) {
            None => return Lookup::Miss,
            Some(mut slot) => {
                if !slot.entry.is_expired_at(now) {
                    slot.entry.record_access(now);
                    return Lookup::Hit(slot.entry.clone());
                }
            }
        }
        self.remove_if_expired(key, now);
        Lookup::Expired
    }

    /// True if a live entry is resident. No bookkeeping.
    #[must_use]
    pub fn contains(&self, key: &str, now: u64) -> bool {
        self.entries
            .get(key)
            .is_some_and(|slot| !slot.entry.is_expired_at(now))
    }

    /// Insert or replace `key`, evicting as needed to stay within budget.
    ///
    /// Any previous copy of `key` is dropped even when the new entry is not
    /// admitted, so the tier never serves a stale value.
    pub fn admit(&self, key: &str, entry: CacheEntry) -> AdmitOutcome {
        let _guard = self.write_lock.lock();
        self.admit_locked(key, entry).0
    }

    /// Current write generation for `key`. Read it before fetching a copy
    /// from the persistent tier and hand it to [`admit_if_absent`].
    ///
    /// [`admit_if_absent`]: MemoryTier::admit_if_absent
    #[must_use]
    pub fn write_generation(&self, key: &str) -> u64 {
        self.write_lock.lock().generation(key)
    }

    /// Admit a copy read from the persistent tier.
    ///
    /// Refused when a live entry is already resident, or when a write to
    /// `key` started or finished after `observed` was read: the copy may
    /// predate that write.
    pub fn admit_if_absent(&self, key: &str, entry: CacheEntry, now: u64, observed: u64) -> AdmitOutcome {
        let log = self.write_lock.lock();
        if log.generation(key) != observed {
            debug!(key = %key, "Promotion skipped, key was written during the read");
            return AdmitOutcome { admitted: false, evicted: 0 };
        }
        if self.contains(key, now) {
            return AdmitOutcome { admitted: false, evicted: 0 };
        }
        self.admit_locked(key, entry).0
    }

    /// Start a write to `key`: admit `entry`, or drop the resident copy when
    /// `entry` is `None`. Pair with [`finish_write`] once the persistent tier
    /// has been updated, whatever the outcome.
    ///
    /// [`finish_write`]: MemoryTier::finish_write
    pub fn begin_write(&self, key: &str, entry: Option<CacheEntry>) -> WriteTicket {
        let mut log = self.write_lock.lock();
        let generation = log.bump();
        let writes = log.in_flight.entry(key.to_string()).or_insert(KeyWrites {
            generation,
            latest_start: generation,
            pending: 0,
        });
        writes.generation = generation;
        writes.latest_start = generation;
        writes.pending += 1;

        let displaced = self.entries.contains_key(key);
        let (outcome, slot_seq) = match entry {
            Some(entry) => self.admit_locked(key, entry),
            None => {
                self.remove_unlocked(key);
                (AdmitOutcome { admitted: false, evicted: 0 }, None)
            }
        };
        WriteTicket { generation, slot_seq, outcome, displaced }
    }

    /// Finish a write started with [`begin_write`].
    ///
    /// If no later write has started, any resident copy this write did not
    /// insert came from a promotion that read around it and is dropped.
    ///
    /// [`begin_write`]: MemoryTier::begin_write
    pub fn finish_write(&self, key: &str, ticket: &WriteTicket) {
        let mut log = self.write_lock.lock();
        let generation = log.bump();
        let Some(writes) = log.in_flight.get_mut(key) else {
            return;
        };
        let latest = writes.latest_start == ticket.generation;
        writes.generation = generation;
        writes.pending = writes.pending.saturating_sub(1);
        if writes.pending == 0 {
            log.in_flight.remove(key);
            log.floor = generation;
        }

        if latest {
            let foreign = self
                .entries
                .get(key)
                .is_some_and(|slot| Some(slot.seq) != ticket.slot_seq);
            if foreign && self.remove_unlocked(key) {
                debug!(key = %key, "Dropped promoted copy superseded by a write");
            }
        }
    }

    /// Returns the outcome and, when admitted, the new slot's sequence number.
    fn admit_locked(&self, key: &str, entry: CacheEntry) -> (AdmitOutcome, Option<u64>) {
        self.remove_unlocked(key);

        let size = entry.size_bytes;
        if self.max_items == 0 || size > self.max_bytes {
            return (AdmitOutcome { admitted: false, evicted: 0 }, None);
        }

        let mut evicted = 0;

        if self.entries.len() + 1 > self.max_items {
            let overflow = self.entries.len() + 1 - self.max_items;
            let count = batch_size_for(self.max_items).max(overflow);
            let victims = self.policy.select_victims(&self.candidates(), count);
            evicted += self.evict_unlocked(&victims, "items");
        }

        let total = self.total_bytes();
        if total + size > self.max_bytes {
            // Drain to 90% of the budget, and far enough for the new entry to fit
            let target = (self.max_bytes as f64 * 0.9) as usize;
            let to_free = total
                .saturating_sub(target)
                .max((total + size).saturating_sub(self.max_bytes));
            let victims = select_for_bytes(&self.candidates(), to_free);
            evicted += self.evict_unlocked(&victims, "bytes");
        }

        // Re-check after eviction; admission only happens if both bounds hold
        if self.entries.len() + 1 > self.max_items || self.total_bytes() + size > self.max_bytes {
            debug!(key = %key, size, "Memory admission rejected after eviction");
            return (AdmitOutcome { admitted: false, evicted }, None);
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(size, Ordering::Release);
        if let Some(old) = self.entries.insert(key.to_string(), MemorySlot { entry, seq }) {
            self.total_bytes.fetch_sub(old.entry.size_bytes, Ordering::Release);
        }

        (AdmitOutcome { admitted: true, evicted }, Some(seq))
    }

    /// Remove `key`. Returns whether it was resident.
    pub fn remove(&self, key: &str) -> bool {
        let _guard = self.write_lock.lock();
        self.remove_unlocked(key)
    }

    /// Remove every expired entry, then evict until both budgets hold.
    /// Returns `(expired, evicted)`.
    pub fn purge(&self, now: u64) -> (usize, usize) {
        let _guard = self.write_lock.lock();

        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|r| r.value().entry.is_expired_at(now))
            .map(|r| r.key().clone())
            .collect();
        let mut expired_count = 0;
        for key in &expired {
            if self.remove_unlocked(key) {
                expired_count += 1;
            }
        }

        let mut evicted = 0;
        if self.entries.len() > self.max_items {
            let victims = self
                .policy
                .select_victims(&self.candidates(), self.entries.len() - self.max_items);
            evicted += self.evict_unlocked(&victims, "items");
        }
        let total = self.total_bytes();
        if total > self.max_bytes {
            let victims = select_for_bytes(&self.candidates(), total - self.max_bytes);
            evicted += self.evict_unlocked(&victims, "bytes");
        }

        (expired_count, evicted)
    }

    /// Drop everything. Returns the number of entries removed.
    pub fn clear(&self) -> usize {
        let _guard = self.write_lock.lock();
        let count = self.entries.len();
        self.entries.clear();
        self.total_bytes.store(0, Ordering::Release);
        count
    }

    /// Snapshot of the metadata eviction needs.
    fn candidates(&self) -> Vec<EvictionCandidate> {
        self.entries
            .iter()
            .map(|r| {
                let slot = r.value();
                EvictionCandidate {
                    key: r.key().clone(),
                    size_bytes: slot.entry.size_bytes,
                    created_at: slot.entry.created_at,
                    last_access: slot.entry.last_access,
                    access_count: slot.entry.access_count,
                    seq: slot.seq,
                }
            })
            .collect()
    }

    fn evict_unlocked(&self, victims: &[String], reason: &'static str) -> usize {
        let mut count = 0usize;
        let mut bytes = 0usize;
        for key in victims {
            if let Some((_, slot)) = self.entries.remove(key) {
                self.total_bytes.fetch_sub(slot.entry.size_bytes, Ordering::Release);
                bytes += slot.entry.size_bytes;
                count += 1;
            }
        }
        if count > 0 {
            debug!(evicted = count, evicted_bytes = bytes, reason, "Evicted entries from memory tier");
            crate::metrics::record_eviction("memory", reason, count, bytes);
        }
        count
    }

    fn remove_unlocked(&self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some((_, slot)) => {
                self.total_bytes.fetch_sub(slot.entry.size_bytes, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Read-path removal: only succeeds while the resident entry is still
    /// expired, so a concurrent re-`set` is never clobbered. Skipped while a
    /// writer holds the lock; the next read or `purge` picks it up.
    fn remove_if_expired(&self, key: &str, now: u64) {
        let Some(_guard) = self.write_lock.try_lock() else {
            return;
        };
        if let Some((_, slot)) = self.entries.remove_if(key, |_, slot| slot.entry.is_expired_at(now)) {
            self.total_bytes.fetch_sub(slot.entry.size_bytes, Ordering::Release);
        }
    }
}
