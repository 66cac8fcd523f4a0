// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use serde::{Deserialize, Serialize};

/// Item-count eviction policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EvictionPolicy {
    /// Oldest `last_access` first
    #[default]
    Lru,
    /// Lowest `access_count` first
    Lfu,
    /// Oldest `created_at` first
    Fifo,
}

impl std::fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lru => write!(f, "LRU"),
            Self::Lfu => write!(f, "LFU"),
            Self::Fifo => write!(f, "FIFO"),
        }
    }
}

/// Snapshot of the metadata eviction needs for one resident key.
#[derive(Debug, Clone)]
pub struct EvictionCandidate {
    pub key: String,
    pub size_bytes: usize,
    pub created_at: u64,
    pub last_access: u64,
    pub access_count: u64,
    /// Tier insertion sequence, the tie-breaker for every policy
    pub seq: u64,
}

impl EvictionPolicy {
    fn sort_key(&self, c: &EvictionCandidate) -> (u64, u64) {
        match self {
            Self::Lru => (c.last_access, c.seq),
            Self::Lfu => (c.access_count, c.seq),
            Self::Fifo => (c.created_at, c.seq),
        }
    }

    /// Order candidates so the first one is evicted first.
    pub fn order(&self, candidates: &mut [EvictionCandidate]) {
        candidates.sort_by_key(|c| self.sort_key(c));
    }

    /// Select up to `count` victims (returns keys, evict-first order).
    pub fn select_victims(&self, candidates: &[EvictionCandidate], count: usize) -> Vec<String> {
        let mut ordered = candidates.to_vec();
        self.order(&mut ordered);
        ordered.into_iter().take(count).map(|c| c.key).collect()
    }
}

/// Victims per item-count eviction round: ⌈10% of `max_items`⌉, at least one.
#[must_use]
pub fn batch_size_for(max_items: usize) -> usize {
    max_items.div_ceil(10).max(1)
}

/// Select least-recently-used victims until at least `bytes_to_free` bytes
/// are reclaimed. Byte pressure ignores the configured policy.
pub fn select_for_bytes(candidates: &[EvictionCandidate], bytes_to_free: usize) -> Vec<String> {
    if bytes_to_free == 0 {
        return Vec::new();
    }
    let mut ordered = candidates.to_vec();
    EvictionPolicy::Lru.order(&mut ordered);

    let mut freed = 0usize;
    let mut victims = Vec::new();
    for c in ordered {
        if freed >= bytes_to_free {
            break;
        }
        freed += c.size_bytes;
        victims.push(c.key);
    }
    victims
}
