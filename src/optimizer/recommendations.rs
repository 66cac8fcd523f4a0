// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Recommendation rules.
//!
//! Four independent rules, evaluated against a stats snapshot and the
//! hot-data list:
//!
//! | Rule              | Condition                                   | Kind / priority / impact        |
//! |-------------------|---------------------------------------------|---------------------------------|
//! | memory pressure   | usage > 90% (> 80%)                         | Cleanup, High 15 (Medium 8)     |
//! | low hit rate      | combined hit rate < 60%                     | IncreaseCapacity, High 25       |
//! | hot, not resident | top 5, score > threshold, not in memory     | PromoteToMemory, High ≤ 20      |
//! | ... and due soon  | predicted access within the horizon         | Preload, Medium 10              |
//! | steady hot key    | top 3, > 10 accesses, mean interval < 60s   | ExtendTtl, Medium 5             |
//!
//! Output is ordered by priority, then impact descending; equal entries keep
//! rule order.

use serde::Serialize;

use crate::analytics::HotDataInfo;
use crate::coordinator::CacheStats;
use crate::pressure::MemoryPressure;

/// Hit rate below which more memory capacity is advised
pub const LOW_HIT_RATE: f64 = 0.6;

const PROMOTION_CANDIDATES: usize = 5;
const TTL_CANDIDATES: usize = 3;
const TTL_MIN_ACCESSES: usize = 10;
const TTL_MAX_INTERVAL_MS: f64 = 60_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RecommendationKind {
    Preload,
    ExtendTtl,
    PromoteToMemory,
    Cleanup,
    IncreaseCapacity,
}

impl std::fmt::Display for RecommendationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Declaration order is sort order: `High` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    /// Cache key, or tier name for tier-level advice
    pub target: String,
    pub reason: String,
    pub priority: Priority,
    /// Expected improvement (0-100)
    pub estimated_impact_percent: f64,
}

/// Everything the rules look at.
#[derive(Debug, Clone, Copy)]
pub struct RecommendationInput<'a> {
    pub stats: &'a CacheStats,
    /// Hottest first
    pub hot: &'a [HotDataInfo],
    pub min_hot_score: f64,
    pub preload_horizon_ms: u64,
    pub now: u64,
}

/// True if `info` predicts an access in `[now, now + horizon_ms]`.
#[must_use]
pub fn due_within(info: &HotDataInfo, now: u64, horizon_ms: u64) -> bool {
    info.predicted_next_access >= now && info.predicted_next_access - now <= horizon_ms
}

/// Evaluate every rule. `in_memory` reports memory-tier residency.
pub fn generate_recommendations<F>(input: &RecommendationInput<'_>, in_memory: F) -> Vec<Recommendation>
where
    F: Fn(&str) -> bool,
{
    let mut recommendations = Vec::new();

    // 1. Memory pressure
    let usage = input.stats.memory_usage_ratio();
    let level = MemoryPressure::from_usage(usage);
    if level.needs_cleanup() {
        let (priority, estimated_impact_percent) = match level {
            MemoryPressure::Critical => (Priority::High, 15.0),
            _ => (Priority::Medium, 8.0),
        };
        recommendations.push(Recommendation {
            kind: RecommendationKind::Cleanup,
            target: "memory".into(),
            reason: format!("{} ({:.1}% of its byte budget)", level.description(), usage * 100.0),
            priority,
            estimated_impact_percent,
        });
    }

    // 2. Low hit rate (an idle cache has no hit rate)
    if input.stats.requests > 0 && input.stats.hit_rate < LOW_HIT_RATE {
        recommendations.push(Recommendation {
            kind: RecommendationKind::IncreaseCapacity,
            target: "memory".into(),
            reason: format!(
                "Hit rate {:.1}% is below {:.0}%",
                input.stats.hit_rate * 100.0,
                LOW_HIT_RATE * 100.0
            ),
            priority: Priority::High,
            estimated_impact_percent: 25.0,
        });
    }

    // 3. Hot keys outside memory
    for info in input.hot.iter().take(PROMOTION_CANDIDATES) {
        if info.hot_score <= input.min_hot_score || in_memory(&info.key) {
            continue;
        }
        recommendations.push(Recommendation {
            kind: RecommendationKind::PromoteToMemory,
            target: info.key.clone(),
            reason: format!("Hot score {:.1} and not resident in memory", info.hot_score),
            priority: Priority::High,
            estimated_impact_percent: (info.hot_score / 5.0).min(20.0),
        });
        if due_within(info, input.now, input.preload_horizon_ms) {
            recommendations.push(Recommendation {
                kind: RecommendationKind::Preload,
                target: info.key.clone(),
                reason: format!(
                    "Next access predicted in {}ms",
                    info.predicted_next_access - input.now
                ),
                priority: Priority::Medium,
                estimated_impact_percent: 10.0,
            });
        }
    }

    // 4. Steady hot keys deserve a longer lifetime
    for info in input.hot.iter().take(TTL_CANDIDATES) {
        if info.access_count > TTL_MIN_ACCESSES && info.average_interval < TTL_MAX_INTERVAL_MS {
            recommendations.push(Recommendation {
                kind: RecommendationKind::ExtendTtl,
                target: info.key.clone(),
                reason: format!(
                    "{} accesses, every {:.0}ms on average",
                    info.access_count, info.average_interval
                ),
                priority: Priority::Medium,
                estimated_impact_percent: 5.0,
            });
        }
    }

    sort_recommendations(&mut recommendations);
    recommendations
}

/// Priority first, then impact descending. Stable.
pub fn sort_recommendations(recommendations: &mut [Recommendation]) {
    recommendations.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.estimated_impact_percent.total_cmp(&a.estimated_impact_percent))
    });
}
