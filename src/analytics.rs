// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Access tracking and hot-data analysis.
//!
//! Every read outcome (and every write) leaves a timestamp in a bounded
//! per-key history. [`AccessTracker::analyze_hot_data`] turns those histories
//! into [`HotDataInfo`] records scored 0-100 from three components:
//!
//! | Component  | Range | Formula                                          |
//! |------------|-------|--------------------------------------------------|
//! | frequency  | 0-50  | `min(samples × 5, 50)`                           |
//! | recency    | 0-30  | `max(0, 30 − minutes_since_last × 10)`           |
//! | regularity | 0-20  | `max(0, 20 − (variance / mean_interval) × 10)`   |
//!
//! Hit/miss outcomes also feed a global performance history used for the
//! health score's response-time proxy.

use std::collections::VecDeque;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::entry::now_millis;

/// Samples kept per key (oldest dropped first)
pub const MAX_SAMPLES_PER_KEY: usize = 100;

/// Hit/miss outcomes kept for the global performance history
pub const MAX_PERFORMANCE_SAMPLES: usize = 1000;

const FREQUENCY_WEIGHT: f64 = 5.0;
const FREQUENCY_CAP: f64 = 50.0;
const RECENCY_MAX: f64 = 30.0;
const RECENCY_DECAY_PER_MINUTE: f64 = 10.0;
const REGULARITY_MAX: f64 = 20.0;
const REGULARITY_DECAY: f64 = 10.0;

/// Derived access statistics for one key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotDataInfo {
    pub key: String,
    /// Samples inside the analysis window
    pub access_count: usize,
    /// Latest sample (epoch millis)
    pub last_access: u64,
    /// Mean gap between consecutive samples (millis)
    pub average_interval: f64,
    /// `last_access + average_interval` (epoch millis)
    pub predicted_next_access: u64,
    /// 0-100
    pub hot_score: f64,
}

/// Per-key access history plus a global hit/miss history.
pub struct AccessTracker {
    history: DashMap<String, VecDeque<u64>>,
    performance: Mutex<VecDeque<bool>>,
}

impl AccessTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            history: DashMap::new(),
            performance: Mutex::new(VecDeque::with_capacity(MAX_PERFORMANCE_SAMPLES)),
        }
    }

    /// Record a read outcome for `key`.
    pub fn record_access(&self, key: &str, was_hit: bool) {
        self.record_access_at(key, was_hit, now_millis());
    }

    pub fn record_access_at(&self, key: &str, was_hit: bool, now: u64) {
        self.push_sample(key, now);

        let mut performance = self.performance.lock();
        if performance.len() >= MAX_PERFORMANCE_SAMPLES {
            performance.pop_front();
        }
        performance.push_back(was_hit);
    }

    /// Record a write. Counts toward hot scoring, not toward the hit ratio.
    pub fn record_write(&self, key: &str) {
        self.record_write_at(key, now_millis());
    }

    pub fn record_write_at(&self, key: &str, now: u64) {
        self.push_sample(key, now);
    }

    fn push_sample(&self, key: &str, now: u64) {
        let mut samples = self.history.entry(key.to_string()).or_default();
        if samples.len() >= MAX_SAMPLES_PER_KEY {
            samples.pop_front();
        }
        samples.push_back(now);
    }

    /// Hot keys seen in the last `window_ms`, hottest first.
    #[must_use]
    pub fn analyze_hot_data(&self, window_ms: u64) -> Vec<HotDataInfo> {
        self.analyze_hot_data_at(window_ms, now_millis())
    }

    #[must_use]
    pub fn analyze_hot_data_at(&self, window_ms: u64, now: u64) -> Vec<HotDataInfo> {
        let since = now.saturating_sub(window_ms);

        // Snapshot first; scoring never holds a shard lock
        let snapshot: Vec<(String, Vec<u64>)> = self
            .history
            .iter()
            .map(|r| {
                let mut recent: Vec<u64> = r.value().iter().copied().filter(|&t| t >= since).collect();
                recent.sort_unstable();
                (r.key().clone(), recent)
            })
            .filter(|(_, recent)| recent.len() >= 2)
            .collect();

        let mut hot: Vec<HotDataInfo> = snapshot
            .into_iter()
            .map(|(key, samples)| score_samples(key, &samples, now))
            .collect();

        hot.sort_by(|a, b| {
            b.hot_score
                .total_cmp(&a.hot_score)
                .then_with(|| a.key.cmp(&b.key))
        });
        hot
    }

    /// Drop samples older than `max_age_ms`; keys left empty are forgotten.
    /// Returns the number of keys forgotten.
    pub fn cleanup_history(&self, max_age_ms: u64) -> usize {
        self.cleanup_history_at(max_age_ms, now_millis())
    }

    pub fn cleanup_history_at(&self, max_age_ms: u64, now: u64) -> usize {
        let cutoff = now.saturating_sub(max_age_ms);
        let before = self.history.len();
        self.history.retain(|_, samples| {
            samples.retain(|&t| t >= cutoff);
            !samples.is_empty()
        });
        let removed = before.saturating_sub(self.history.len());
        if removed > 0 {
            debug!(removed, remaining = self.history.len(), "Pruned access history");
        }
        removed
    }

    /// Fraction of hits over the performance history, `None` when empty.
    #[must_use]
    pub fn recent_hit_ratio(&self) -> Option<f64> {
        let performance = self.performance.lock();
        if performance.is_empty() {
            return None;
        }
        let hits = performance.iter().filter(|&&hit| hit).count();
        Some(hits as f64 / performance.len() as f64)
    }

    /// Number of keys with at least one sample.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.history.len()
    }

    /// Forget everything.
    pub fn clear(&self) {
        self.history.clear();
        self.performance.lock().clear();
    }
}

impl Default for AccessTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Score a key's in-window samples (at least two, sorted ascending).
fn score_samples(key: String, samples: &[u64], now: u64) -> HotDataInfo {
    let intervals: Vec<f64> = samples
        .windows(2)
        .map(|pair| pair[1].saturating_sub(pair[0]) as f64)
        .collect();
    let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
    let variance = intervals.iter().map(|i| (i - mean).powi(2)).sum::<f64>() / intervals.len() as f64;

    let last_access = samples.iter().copied().max().unwrap_or(now);
    let access_count = samples.len();

    let frequency = (access_count as f64 * FREQUENCY_WEIGHT).min(FREQUENCY_CAP);
    let minutes_since = now.saturating_sub(last_access) as f64 / 60_000.0;
    let recency = (RECENCY_MAX - minutes_since * RECENCY_DECAY_PER_MINUTE).max(0.0);
    let regularity = if mean > 0.0 {
        (REGULARITY_MAX - (variance / mean) * REGULARITY_DECAY).max(0.0)
    } else if variance == 0.0 {
        // burst of same-millisecond samples
        REGULARITY_MAX
    } else {
        0.0
    };

    HotDataInfo {
        key,
        access_count,
        last_access,
        average_interval: mean,
        predicted_next_access: last_access.saturating_add(mean.round() as u64),
        hot_score: (frequency + recency + regularity).min(100.0),
    }
}
