// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the cache coordinator.

use serde::Serialize;

/// Cache lifecycle state.
///
/// Use [`super::TieredCache::state()`] to check current state or
/// [`super::TieredCache::state_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Just created, background cleanup not started
    Created,
    /// Index warmed, cleanup task running
    Running,
    /// Shut down; the cache still serves requests but nothing runs in the background
    Stopped,
}

impl std::fmt::Display for CacheState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Running => write!(f, "Running"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Per-write options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Lifetime in seconds; `None` uses the configured default, `Some(0)` skips caching
    pub ttl_secs: Option<u64>,
    /// Write to the persistent tier only
    pub force_persistent_only: bool,
}

impl SetOptions {
    #[must_use]
    pub fn ttl(ttl_secs: u64) -> Self {
        Self { ttl_secs: Some(ttl_secs), ..Default::default() }
    }

    #[must_use]
    pub fn persistent_only() -> Self {
        Self { force_persistent_only: true, ..Default::default() }
    }
}

/// What a `set` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// TTL resolved to zero; nothing was stored
    NotCacheable,
    /// Stored in at least one tier
    Stored {
        memory: bool,
        persistent: bool,
    },
}

impl SetOutcome {
    #[must_use]
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored { .. })
    }
}

/// Statistics for one tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierStats {
    pub items: usize,
    pub max_items: usize,
    /// Cumulative payload bytes (memory tier only)
    pub bytes: Option<usize>,
    pub max_bytes: Option<usize>,
    /// Lookups answered by this tier
    pub hits: u64,
    /// Lookups that reached this tier and were not answered by it
    pub misses: u64,
    pub hit_rate: f64,
    pub miss_rate: f64,
}

/// Snapshot returned by [`super::TieredCache::stats()`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub memory: TierStats,
    pub persistent: TierStats,
    pub hits: u64,
    pub misses: u64,
    pub requests: u64,
    /// Combined hit rate over both tiers (0.0 with no requests)
    pub hit_rate: f64,
    pub miss_rate: f64,
}

impl CacheStats {
    /// Memory tier byte usage (0.0 - 1.0+).
    #[must_use]
    pub fn memory_usage_ratio(&self) -> f64 {
        match (self.memory.bytes, self.memory.max_bytes) {
            (Some(bytes), Some(max)) if max > 0 => bytes as f64 / max as f64,
            _ => 0.0,
        }
    }
}

/// `(hit_rate, miss_rate)` for a hit/miss pair; zeros when idle.
pub(crate) fn rates(hits: u64, misses: u64) -> (f64, f64) {
    let total = hits + misses;
    if total == 0 {
        (0.0, 0.0)
    } else {
        let hit_rate = hits as f64 / total as f64;
        (hit_rate, 1.0 - hit_rate)
    }
}

/// Counts from one [`super::TieredCache::cleanup()`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    pub memory_expired: usize,
    pub memory_evicted: usize,
    pub persistent_expired: usize,
    pub persistent_evicted: usize,
}

impl CleanupSummary {
    #[must_use]
    pub fn total_removed(&self) -> usize {
        self.memory_expired + self.memory_evicted + self.persistent_expired + self.persistent_evicted
    }
}
