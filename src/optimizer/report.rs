// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Optimization report and health score.
//!
//! ```text
//! health = 0.4 × hit-rate score + 0.3 × memory score + 0.3 × response score
//!
//! hit-rate score = combined hit rate × 100
//! memory score   = max(0, 100 − |usage% − 70| × 2)
//! response score = clamp(100 − 2 × proxy_ms, 0, 100)
//!   proxy_ms     = ratio × 1ms + (1 − ratio) × 50ms   (ratio = recent hit ratio)
//! ```

use serde::Serialize;

use crate::analytics::HotDataInfo;
use crate::coordinator::CacheStats;
use super::recommendations::Recommendation;

const HIT_RATE_WEIGHT: f64 = 0.4;
const MEMORY_WEIGHT: f64 = 0.3;
const RESPONSE_WEIGHT: f64 = 0.3;

/// Memory usage the memory score is centred on
const OPTIMAL_USAGE_PERCENT: f64 = 70.0;

/// Latency proxy for a hit and for a miss
const HIT_LATENCY_MS: f64 = 1.0;
const MISS_LATENCY_MS: f64 = 50.0;

/// Read-only snapshot for dashboards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationReport {
    /// Epoch millis
    pub generated_at: u64,
    pub stats: CacheStats,
    pub hot_data: Vec<HotDataInfo>,
    pub recommendations: Vec<Recommendation>,
    /// 0-100
    pub health_score: f64,
}

#[must_use]
pub fn hit_rate_score(hit_rate: f64) -> f64 {
    (hit_rate * 100.0).clamp(0.0, 100.0)
}

#[must_use]
pub fn memory_score(usage_ratio: f64) -> f64 {
    (100.0 - (usage_ratio * 100.0 - OPTIMAL_USAGE_PERCENT).abs() * 2.0).max(0.0)
}

/// `None` (no recent samples) scores a perfect 100.
#[must_use]
pub fn response_score(recent_hit_ratio: Option<f64>) -> f64 {
    match recent_hit_ratio {
        None => 100.0,
        Some(ratio) => {
            let proxy_ms = ratio * HIT_LATENCY_MS + (1.0 - ratio) * MISS_LATENCY_MS;
            (100.0 - 2.0 * proxy_ms).clamp(0.0, 100.0)
        }
    }
}

/// Weighted 0-100 health score.
#[must_use]
pub fn health_score(stats: &CacheStats, recent_hit_ratio: Option<f64>) -> f64 {
    HIT_RATE_WEIGHT * hit_rate_score(stats.hit_rate)
        + MEMORY_WEIGHT * memory_score(stats.memory_usage_ratio())
        + RESPONSE_WEIGHT * response_score(recent_hit_ratio)
}
