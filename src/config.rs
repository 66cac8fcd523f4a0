// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the tiered cache and its optimizer.
//!
//! # Example
//!
//! ```
//! use tiered_cache::{CacheConfig, EvictionPolicy};
//!
//! // Minimal config (uses defaults)
//! let config = CacheConfig::default();
//! assert_eq!(config.memory_max_bytes, 50 * 1024 * 1024); // 50 MiB
//! assert_eq!(config.eviction_policy, EvictionPolicy::Lru);
//!
//! // Small memory tier, LFU eviction
//! let config = CacheConfig {
//!     memory_max_items: 5,
//!     eviction_policy: EvictionPolicy::Lfu,
//!     ..Default::default()
//! };
//! assert_eq!(config.persistent_max_items, 500);
//! ```

use std::time::Duration;
use serde::Deserialize;

use crate::eviction::EvictionPolicy;

/// Configuration for the tiered cache.
///
/// All fields have defaults, so a partial JSON document deserializes into a
/// complete config:
///
/// ```
/// use tiered_cache::CacheConfig;
///
/// let config: CacheConfig = serde_json::from_str(r#"{"memory_max_items": 64, "eviction_policy": "FIFO"}"#).unwrap();
/// assert_eq!(config.memory_max_items, 64);
/// assert_eq!(config.default_ttl_secs, 3600);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Memory tier max entry count (default: 1000)
    #[serde(default = "default_memory_max_items")]
    pub memory_max_items: usize,

    /// Memory tier max cumulative payload size in bytes (default: 50 MiB)
    #[serde(default = "default_memory_max_bytes")]
    pub memory_max_bytes: usize,

    /// Persistent tier max entry count (default: 500)
    #[serde(default = "default_persistent_max_items")]
    pub persistent_max_items: usize,

    /// TTL used when `set` is called without one (default: 1 hour)
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Item-count eviction policy, shared by both tiers (default: LRU)
    #[serde(default)]
    pub eviction_policy: EvictionPolicy,

    /// Largest payload admitted to the memory tier (default: 1 MiB)
    #[serde(default = "default_max_entry_bytes")]
    pub max_entry_bytes: usize,

    /// Persistent hits needed before a copy is promoted to memory
    #[serde(default = "default_promotion_min_accesses")]
    pub promotion_min_accesses: u64,

    /// Prefix for every key written to the persistent backend
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Upper bound on a single backend call
    #[serde(default = "default_backend_timeout_ms")]
    pub backend_timeout_ms: u64,

    /// Expired-entry sweep interval (default: 5 minutes)
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,

    /// Access window used for hot-data analysis (default: 5 minutes)
    #[serde(default = "default_prediction_window_ms")]
    pub prediction_window_ms: u64,

    /// Hot score a key must exceed before it is promoted or preloaded
    #[serde(default = "default_min_hot_score")]
    pub min_hot_score: f64,

    /// Preload cap per optimizer tick
    #[serde(default = "default_max_preload_items")]
    pub max_preload_items: usize,

    /// Optimizer tick interval (default: 30 seconds)
    #[serde(default = "default_optimizer_interval_ms")]
    pub optimizer_interval_ms: u64,

    /// How far ahead a predicted access triggers a preload
    #[serde(default = "default_preload_horizon_ms")]
    pub preload_horizon_ms: u64,

    /// Access history retention (default: 24 hours)
    #[serde(default = "default_history_retention_ms")]
    pub history_retention_ms: u64,

    /// Upper bound on a single value-producer call
    #[serde(default = "default_producer_timeout_ms")]
    pub producer_timeout_ms: u64,
}

fn default_memory_max_items() -> usize { 1000 }
fn default_memory_max_bytes() -> usize { 50 * 1024 * 1024 } // 50 MiB
fn default_persistent_max_items() -> usize { 500 }
fn default_ttl_secs() -> u64 { 3600 }
fn default_max_entry_bytes() -> usize { 1024 * 1024 } // 1 MiB
fn default_promotion_min_accesses() -> u64 { 2 }
fn default_key_prefix() -> String { "cache_".to_string() }
fn default_backend_timeout_ms() -> u64 { 5_000 }
fn default_cleanup_interval_ms() -> u64 { 300_000 }
fn default_prediction_window_ms() -> u64 { 300_000 }
fn default_min_hot_score() -> f64 { 70.0 }
fn default_max_preload_items() -> usize { 10 }
fn default_optimizer_interval_ms() -> u64 { 30_000 }
fn default_preload_horizon_ms() -> u64 { 60_000 }
fn default_history_retention_ms() -> u64 { 24 * 60 * 60 * 1000 }
fn default_producer_timeout_ms() -> u64 { 10_000 }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_max_items: default_memory_max_items(),
            memory_max_bytes: default_memory_max_bytes(),
            persistent_max_items: default_persistent_max_items(),
            default_ttl_secs: default_ttl_secs(),
            eviction_policy: EvictionPolicy::default(),
            max_entry_bytes: default_max_entry_bytes(),
            promotion_min_accesses: default_promotion_min_accesses(),
            key_prefix: default_key_prefix(),
            backend_timeout_ms: default_backend_timeout_ms(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
            prediction_window_ms: default_prediction_window_ms(),
            min_hot_score: default_min_hot_score(),
            max_preload_items: default_max_preload_items(),
            optimizer_interval_ms: default_optimizer_interval_ms(),
            preload_horizon_ms: default_preload_horizon_ms(),
            history_retention_ms: default_history_retention_ms(),
            producer_timeout_ms: default_producer_timeout_ms(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    #[must_use]
    pub fn producer_timeout(&self) -> Duration {
        Duration::from_millis(self.producer_timeout_ms)
    }

    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms.max(1))
    }

    #[must_use]
    pub fn optimizer_interval(&self) -> Duration {
        Duration::from_millis(self.optimizer_interval_ms.max(1))
    }
}
