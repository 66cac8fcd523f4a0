// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Tiered cache coordinator.
//!
//! The [`TieredCache`] is the main orchestrator that ties together:
//! - Memory tier with item and byte budgets
//! - Persistent tier over a [`PersistentBackend`]
//! - Access tracker feeding the optimizer
//!
//! # Lifecycle
//!
//! ```text
//! Created → Running → Stopped
//! ```
//!
//! The cache serves requests in every state; `start()` only warms the
//! persistent index and launches periodic cleanup.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tiered_cache::{CacheConfig, CacheState, InMemoryBackend, TieredCache};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cache = Arc::new(TieredCache::new(CacheConfig::default(), Arc::new(InMemoryBackend::new())));
//! assert_eq!(cache.state(), CacheState::Created);
//!
//! cache.set("greeting", &"hello", None).await.unwrap();
//! let value: Option<String> = cache.get("greeting").await.unwrap();
//! assert_eq!(value.as_deref(), Some("hello"));
//! # }
//! ```

mod types;
mod api;
mod lifecycle;

pub use types::{CacheState, CacheStats, CleanupSummary, SetOptions, SetOutcome, TierStats};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::analytics::AccessTracker;
use crate::config::CacheConfig;
use crate::entry::now_millis;
use crate::pressure::MemoryPressure;
use crate::storage::traits::PersistentBackend;
use crate::tier::{MemoryTier, PersistentTier};

/// Two-tier cache service.
///
/// # Thread Safety
///
/// The cache is `Send + Sync`; share it behind an `Arc`. Each tier serializes
/// its own mutations, there is no global lock.
pub struct TieredCache {
    pub(super) config: CacheConfig,

    /// Fast tier
    pub(super) memory: MemoryTier,

    /// Larger, slower tier
    pub(super) persistent: PersistentTier,

    /// Per-key access history for hot-data analysis
    pub(super) tracker: Arc<AccessTracker>,

    /// Hit/miss counters (reset by `clear`)
    pub(super) memory_hits: AtomicU64,
    pub(super) persistent_hits: AtomicU64,
    pub(super) misses: AtomicU64,

    /// Cache state (broadcast to watchers)
    pub(super) state: watch::Sender<CacheState>,
    pub(super) state_rx: watch::Receiver<CacheState>,

    /// Stops the cleanup task
    pub(super) shutdown_tx: watch::Sender<bool>,

    pub(super) cleanup_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl TieredCache {
    /// Create a cache over `backend`. No I/O happens until [`start`](Self::start).
    pub fn new(config: CacheConfig, backend: Arc<dyn PersistentBackend>) -> Self {
        let (state_tx, state_rx) = watch::channel(CacheState::Created);
        let (shutdown_tx, _) = watch::channel(false);

        let memory = MemoryTier::new(
            config.memory_max_items,
            config.memory_max_bytes,
            config.eviction_policy,
        );
        let persistent = PersistentTier::new(
            backend,
            config.key_prefix.clone(),
            config.persistent_max_items,
            config.eviction_policy,
            config.backend_timeout(),
        );

        Self {
            config,
            memory,
            persistent,
            tracker: Arc::new(AccessTracker::new()),
            memory_hits: AtomicU64::new(0),
            persistent_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            state: state_tx,
            state_rx,
            shutdown_tx,
            cleanup_task: parking_lot::Mutex::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get current cache state.
    #[must_use]
    pub fn state(&self) -> CacheState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<CacheState> {
        self.state_rx.clone()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self.state(), CacheState::Running)
    }

    /// Access history shared with the optimizer.
    #[must_use]
    pub fn tracker(&self) -> &Arc<AccessTracker> {
        &self.tracker
    }

    /// True if a live copy of `key` is resident in the memory tier.
    #[must_use]
    pub fn is_in_memory(&self, key: &str) -> bool {
        self.memory.contains(key, now_millis())
    }

    /// Memory tier byte usage (0.0 - 1.0+).
    #[must_use]
    pub fn memory_usage_ratio(&self) -> f64 {
        self.memory.usage_ratio()
    }

    /// Current memory pressure level.
    #[must_use]
    pub fn pressure(&self) -> MemoryPressure {
        MemoryPressure::from_usage(self.memory_usage_ratio())
    }

    /// Point-in-time statistics. No side effects.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let memory_hits = self.memory_hits.load(Ordering::Acquire);
        let persistent_hits = self.persistent_hits.load(Ordering::Acquire);
        let misses = self.misses.load(Ordering::Acquire);

        // Every request reaches memory; only memory misses reach persistent
        let memory_misses = persistent_hits + misses;
        let (memory_hit_rate, memory_miss_rate) = types::rates(memory_hits, memory_misses);
        let (persistent_hit_rate, persistent_miss_rate) = types::rates(persistent_hits, misses);

        let hits = memory_hits + persistent_hits;
        let (hit_rate, miss_rate) = types::rates(hits, misses);

        CacheStats {
            memory: TierStats {
                items: self.memory.len(),
                max_items: self.memory.max_items(),
                bytes: Some(self.memory.total_bytes()),
                max_bytes: Some(self.memory.max_bytes()),
                hits: memory_hits,
                misses: memory_misses,
                hit_rate: memory_hit_rate,
                miss_rate: memory_miss_rate,
            },
            persistent: TierStats {
                items: self.persistent.len(),
                max_items: self.persistent.max_items(),
                bytes: None,
                max_bytes: None,
                hits: persistent_hits,
                misses,
                hit_rate: persistent_hit_rate,
                miss_rate: persistent_miss_rate,
            },
            hits,
            misses,
            requests: hits + misses,
            hit_rate,
            miss_rate,
        }
    }

    /// Push tier sizes, pressure and hit rate to the metrics gauges.
    pub fn update_gauge_metrics(&self) {
        let stats = self.stats();
        crate::metrics::set_tier_items("memory", stats.memory.items);
        crate::metrics::set_tier_items("persistent", stats.persistent.items);
        crate::metrics::set_memory_bytes(self.memory.total_bytes());
        crate::metrics::set_memory_pressure(self.memory_usage_ratio());
        crate::metrics::set_hit_rate(stats.hit_rate);
    }

    pub(super) fn reset_counters(&self) {
        self.memory_hits.store(0, Ordering::Release);
        self.persistent_hits.store(0, Ordering::Release);
        self.misses.store(0, Ordering::Release);
    }
}
