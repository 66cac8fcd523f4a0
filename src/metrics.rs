// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for tiered-cache.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding process is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `tiered_cache_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//! - `_bytes` suffix for sizes
//!
//! # Labels
//! - `tier`: memory, persistent, cache (combined path)
//! - `operation`: get, set, delete, cleanup, ...
//! - `status`: hit, miss, success, error, skipped

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record a cache operation outcome
pub fn record_operation(tier: &str, operation: &str, status: &str) {
    counter!(
        "tiered_cache_operations_total",
        "tier" => tier.to_string(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record operation latency
pub fn record_latency(tier: &str, operation: &str, duration: Duration) {
    histogram!(
        "tiered_cache_operation_seconds",
        "tier" => tier.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record eviction event
pub fn record_eviction(tier: &str, reason: &str, count: usize, bytes: usize) {
    counter!(
        "tiered_cache_evictions_total",
        "tier" => tier.to_string(),
        "reason" => reason.to_string()
    )
    .increment(count as u64);
    counter!(
        "tiered_cache_evicted_bytes_total",
        "tier" => tier.to_string()
    )
    .increment(bytes as u64);
}

/// Record expired entries removed by cleanup or on read
pub fn record_expired(tier: &str, count: usize) {
    counter!(
        "tiered_cache_expired_total",
        "tier" => tier.to_string()
    )
    .increment(count as u64);
}

/// Record a persistent → memory promotion
pub fn record_promotion(trigger: &str) {
    counter!(
        "tiered_cache_promotions_total",
        "trigger" => trigger.to_string()
    )
    .increment(1);
}

/// Record data corruption detection
pub fn record_corruption(tier: &str) {
    counter!(
        "tiered_cache_corruption_detected_total",
        "tier" => tier.to_string()
    )
    .increment(1);
}

/// Set current memory tier size in bytes
pub fn set_memory_bytes(bytes: usize) {
    gauge!("tiered_cache_memory_bytes").set(bytes as f64);
}

/// Set current item count for a tier
pub fn set_tier_items(tier: &str, count: usize) {
    gauge!(
        "tiered_cache_items",
        "tier" => tier.to_string()
    )
    .set(count as f64);
}

/// Set memory pressure level (0.0 - 1.0)
pub fn set_memory_pressure(pressure: f64) {
    gauge!("tiered_cache_memory_pressure").set(pressure);
}

/// Set combined hit rate (0.0 - 1.0)
pub fn set_hit_rate(rate: f64) {
    gauge!("tiered_cache_hit_rate").set(rate);
}

// ═══════════════════════════════════════════════════════════════════════════
// ERROR TRACKING - Categorized error counters for alerting
// ═══════════════════════════════════════════════════════════════════════════

/// Record an error with category for alerting
pub fn record_error(tier: &str, operation: &str, error_type: &str) {
    counter!(
        "tiered_cache_errors_total",
        "tier" => tier.to_string(),
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

/// Record a timeout error
pub fn record_timeout(tier: &str, operation: &str) {
    counter!(
        "tiered_cache_timeouts_total",
        "tier" => tier.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// THROUGHPUT - Bytes written
// ═══════════════════════════════════════════════════════════════════════════

/// Record bytes written to a tier
pub fn record_bytes_written(tier: &str, bytes: usize) {
    counter!(
        "tiered_cache_bytes_written_total",
        "tier" => tier.to_string()
    )
    .increment(bytes as u64);
}

// ═══════════════════════════════════════════════════════════════════════════
// OPTIMIZER - Recommendations, preloads, health
// ═══════════════════════════════════════════════════════════════════════════

/// Record a generated recommendation
pub fn record_recommendation(kind: &str, priority: &str) {
    counter!(
        "tiered_cache_recommendations_total",
        "kind" => kind.to_string(),
        "priority" => priority.to_string()
    )
    .increment(1);
}

/// Record the outcome of executing a recommendation
pub fn record_recommendation_executed(kind: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "tiered_cache_recommendations_executed_total",
        "kind" => kind.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record a predictive preload attempt
pub fn record_preload(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "tiered_cache_preloads_total",
        "status" => status
    )
    .increment(1);
}

/// Record an optimizer tick skipped because a run was in flight
pub fn record_tick_skipped() {
    counter!("tiered_cache_optimizer_ticks_skipped_total").increment(1);
}

/// Set latest health score (0 - 100)
pub fn set_health_score(score: f64) {
    gauge!("tiered_cache_health_score").set(score);
}

/// Set cache state (for monitoring lifecycle transitions)
pub fn set_cache_state(state: &str) {
    counter!(
        "tiered_cache_state_transitions_total",
        "state" => state.to_string()
    )
    .increment(1);
}

/// Record index warm-up duration
pub fn record_warmup(duration: Duration, loaded: usize) {
    histogram!("tiered_cache_warmup_seconds").record(duration.as_secs_f64());
    gauge!("tiered_cache_warmup_loaded_items").set(loaded as f64);
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    tier: &'static str,
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(tier: &'static str, operation: &'static str) -> Self {
        Self {
            tier,
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.tier, self.operation, self.start.elapsed());
    }
}

/// Convenience macro for timing operations
#[macro_export]
macro_rules! time_operation {
    ($tier:expr, $op:expr) => {
        $crate::metrics::LatencyTimer::new($tier, $op)
    };
}
