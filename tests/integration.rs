// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Integration Tests for Tiered Cache
//!
//! End-to-end behaviour through the public API, against the in-process
//! backend. No external services are required.
//!
//! # Running Tests
//! ```bash
//! cargo test --test integration
//!
//! # Only the optimizer scenarios
//! cargo test --test integration optimizer
//! ```
//!
//! # Test Organization
//! - `happy_*` - read/write paths, TTL, promotion, statistics
//! - `eviction_*` - item and byte budgets
//! - `optimizer_*` - hot data, recommendations, preload
//! - `lifecycle_*` - start, warm-up, shutdown

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use tiered_cache::{
    CacheConfig, CacheEntry, CacheOptimizer, CacheState, EvictionPolicy, InMemoryBackend, Priority,
    ProducerError, RecommendationKind, SetOptions, SetOutcome, TieredCache, ValueProducer,
};

// =============================================================================
// Helpers
// =============================================================================

fn create_cache(config: CacheConfig) -> (Arc<TieredCache>, Arc<InMemoryBackend>) {
    let backend = Arc::new(InMemoryBackend::new());
    let cache = Arc::new(TieredCache::new(config, backend.clone()));
    (cache, backend)
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// Ten samples 10s apart ending now: hot score 80 or more, next access due
/// in about 10s.
fn make_hot(cache: &TieredCache, key: &str) {
    let now = now_millis();
    for i in (0..10u64).rev() {
        cache.tracker().record_access_at(key, true, now - i * 10_000);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Article {
    id: u32,
    title: String,
    tags: Vec<String>,
}

fn article(id: u32) -> Article {
    Article {
        id,
        title: format!("Article {}", id),
        tags: vec!["news".into(), "tech".into()],
    }
}

struct EchoProducer;

#[async_trait]
impl ValueProducer for EchoProducer {
    async fn produce(&self, key: &str) -> Result<serde_json::Value, ProducerError> {
        Ok(json!({ "produced_for": key }))
    }
}

// =============================================================================
// Happy Path
// =============================================================================

#[tokio::test]
async fn happy_roundtrip_through_both_tiers() {
    let (cache, backend) = create_cache(CacheConfig::default());

    let outcome = cache.set("article:1", &article(1), None).await.unwrap();
    assert_eq!(outcome, SetOutcome::Stored { memory: true, persistent: true });

    // Write-through: the envelope is on the backend under the prefix
    let raw = backend.raw("cache_article:1").expect("envelope written");
    let envelope: CacheEntry = serde_json::from_str(&raw).unwrap();
    assert_eq!(envelope.ttl_secs, 3600);

    let loaded: Option<Article> = cache.get("article:1").await.unwrap();
    assert_eq!(loaded, Some(article(1)));
}

#[tokio::test]
async fn happy_ttl_expires_entries() {
    let (cache, _) = create_cache(CacheConfig::default());
    cache.set("short", &"lived", Some(1)).await.unwrap();
    assert!(cache.has("short").await);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let value: Option<String> = cache.get("short").await.unwrap();
    assert_eq!(value, None);
    assert!(!cache.is_in_memory("short"));
}

#[tokio::test]
async fn happy_zero_ttl_is_not_cached() {
    let (cache, backend) = create_cache(CacheConfig::default());

    let outcome = cache.set("nope", &42, Some(0)).await.unwrap();
    assert_eq!(outcome, SetOutcome::NotCacheable);
    assert!(!outcome.is_stored());

    let value: Option<i32> = cache.get("nope").await.unwrap();
    assert_eq!(value, None);
    assert!(backend.is_empty());
    assert_eq!(cache.stats().memory.items, 0);
}

#[tokio::test]
async fn happy_overwrite_replaces_value() {
    let (cache, _) = create_cache(CacheConfig::default());
    cache.set("k", &"first", None).await.unwrap();
    cache.set("k", &"second", None).await.unwrap();

    let value: Option<String> = cache.get("k").await.unwrap();
    assert_eq!(value.as_deref(), Some("second"));
    assert_eq!(cache.stats().memory.items, 1);
    assert_eq!(cache.stats().persistent.items, 1);
}

#[tokio::test]
async fn happy_promotion_after_repeated_persistent_hits() {
    let (cache, _) = create_cache(CacheConfig::default());
    cache.set_with("cold", &article(7), SetOptions::persistent_only()).await.unwrap();
    let before = cache.stats().memory.items;
    assert!(!cache.is_in_memory("cold"));

    // First persistent hit: access count 1, below the promotion threshold
    let _: Option<Article> = cache.get("cold").await.unwrap();
    assert!(!cache.is_in_memory("cold"));

    // Second hit reaches promotion_min_accesses = 2
    let _: Option<Article> = cache.get("cold").await.unwrap();
    assert!(cache.is_in_memory("cold"));
    assert_eq!(cache.stats().memory.items, before + 1);

    // Third read is served by memory
    let _: Option<Article> = cache.get("cold").await.unwrap();
    let stats = cache.stats();
    assert_eq!(stats.memory.hits, 1);
    assert_eq!(stats.persistent.hits, 2);
}

#[tokio::test]
async fn happy_hit_and_miss_rates() {
    let (cache, _) = create_cache(CacheConfig::default());
    cache.set("present", &1, None).await.unwrap();

    let _: Option<i32> = cache.get("present").await.unwrap();
    let _: Option<i32> = cache.get("absent").await.unwrap();

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.requests, 2);
    assert!((stats.hit_rate - 0.5).abs() < 1e-9);
    assert!((stats.miss_rate - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn happy_empty_cache_has_zero_rates() {
    let (cache, _) = create_cache(CacheConfig::default());
    let stats = cache.stats();
    assert_eq!(stats.requests, 0);
    assert_eq!(stats.hit_rate, 0.0);
    assert_eq!(stats.miss_rate, 0.0);
}

#[tokio::test]
async fn happy_delete_and_clear() {
    let (cache, backend) = create_cache(CacheConfig::default());
    for i in 0..5 {
        cache.set(&format!("k{}", i), &i, None).await.unwrap();
    }

    assert!(cache.delete("k0").await.unwrap());
    assert!(!cache.delete("k0").await.unwrap());
    assert!(!cache.has("k0").await);

    cache.clear().await.unwrap();
    let stats = cache.stats();
    assert_eq!(stats.memory.items, 0);
    assert_eq!(stats.persistent.items, 0);
    assert_eq!(stats.requests, 0);
    assert!(backend.is_empty());
}

#[tokio::test]
async fn happy_type_mismatch_is_serialization_error() {
    let (cache, _) = create_cache(CacheConfig::default());
    cache.set("k", &"not a number", None).await.unwrap();

    let result: Result<Option<u64>, _> = cache.get("k").await;
    assert!(matches!(result, Err(tiered_cache::CacheError::Serialization(_))));
}

#[tokio::test]
async fn happy_corrupt_envelope_self_heals() {
    let (cache, backend) = create_cache(CacheConfig::default());
    cache.set_with("k", &"v", SetOptions::persistent_only()).await.unwrap();
    backend.insert_raw("cache_k", "{ this is not an envelope");

    let value: Option<String> = cache.get("k").await.unwrap();
    assert_eq!(value, None);
    assert!(backend.raw("cache_k").is_none(), "corrupt envelope removed");
    assert_eq!(cache.stats().persistent.items, 0);

    // The key is usable again
    cache.set("k", &"fresh", None).await.unwrap();
    let value: Option<String> = cache.get("k").await.unwrap();
    assert_eq!(value.as_deref(), Some("fresh"));
}

// =============================================================================
// Eviction
// =============================================================================

#[tokio::test]
async fn eviction_item_budget_keeps_values_in_persistent_tier() {
    let config = CacheConfig {
        memory_max_items: 5,
        ..Default::default()
    };
    let (cache, _) = create_cache(config);

    for i in 0..7 {
        cache.set(&format!("k{}", i), &i, None).await.unwrap();
    }

    let stats = cache.stats();
    assert_eq!(stats.memory.items, 5);
    assert_eq!(stats.persistent.items, 7);

    // The two least recently used keys left memory, in insertion order
    assert!(!cache.is_in_memory("k0"));
    assert!(!cache.is_in_memory("k1"));
    for i in 2..7 {
        assert!(cache.is_in_memory(&format!("k{}", i)));
    }

    // Still served from the persistent tier
    let value: Option<i32> = cache.get("k0").await.unwrap();
    assert_eq!(value, Some(0));
}

#[tokio::test]
async fn eviction_lru_prefers_untouched_keys() {
    let config = CacheConfig {
        memory_max_items: 3,
        eviction_policy: EvictionPolicy::Lru,
        ..Default::default()
    };
    let (cache, _) = create_cache(config);

    cache.set("a", &1, None).await.unwrap();
    cache.set("b", &2, None).await.unwrap();
    cache.set("c", &3, None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let _: Option<i32> = cache.get("a").await.unwrap();

    cache.set("d", &4, None).await.unwrap();
    assert!(cache.is_in_memory("a"));
    assert!(!cache.is_in_memory("b"));
    assert!(cache.is_in_memory("c"));
    assert!(cache.is_in_memory("d"));
}

#[tokio::test]
async fn eviction_byte_budget_is_never_exceeded() {
    let max_bytes = 1024 * 1024;
    let config = CacheConfig {
        memory_max_bytes: max_bytes,
        ..Default::default()
    };
    let (cache, _) = create_cache(config);
    let chunk = "x".repeat(300 * 1024);

    for i in 0..10 {
        let outcome = cache.set(&format!("blob{}", i), &chunk, None).await.unwrap();
        assert!(outcome.is_stored());
        let stats = cache.stats();
        assert!(stats.memory.bytes.unwrap() <= max_bytes);
    }

    let stats = cache.stats();
    assert!(stats.memory.items < 10);
    assert_eq!(stats.persistent.items, 10);
    assert!(cache.is_in_memory("blob9"));
}

#[tokio::test]
async fn eviction_oversized_entries_bypass_memory() {
    let config = CacheConfig {
        max_entry_bytes: 1024,
        ..Default::default()
    };
    let (cache, _) = create_cache(config);

    let outcome = cache.set("big", &"y".repeat(4096), None).await.unwrap();
    assert_eq!(outcome, SetOutcome::Stored { memory: false, persistent: true });
    assert!(!cache.is_in_memory("big"));

    let value: Option<String> = cache.get("big").await.unwrap();
    assert_eq!(value.map(|v| v.len()), Some(4096));
}

#[tokio::test]
async fn eviction_persistent_item_budget() {
    let config = CacheConfig {
        persistent_max_items: 10,
        ..Default::default()
    };
    let (cache, backend) = create_cache(config);

    for i in 0..25 {
        cache.set(&format!("k{}", i), &i, None).await.unwrap();
        assert!(cache.stats().persistent.items <= 10);
    }
    assert!(backend.len() <= 10);
}

// =============================================================================
// Optimizer
// =============================================================================

#[tokio::test]
async fn optimizer_hot_score_grows_with_frequency() {
    let (cache, _) = create_cache(CacheConfig::default());
    let now = now_millis();
    for i in 0..3u64 {
        cache.tracker().record_access_at("warm", true, now - i * 1_000);
    }
    for i in 0..8u64 {
        cache.tracker().record_access_at("hot", true, now - i * 1_000);
    }

    let hot = cache.tracker().analyze_hot_data_at(300_000, now);
    assert_eq!(hot.len(), 2);
    assert_eq!(hot[0].key, "hot");
    assert_eq!(hot[1].key, "warm");
    assert!(hot[0].hot_score > hot[1].hot_score);
}

#[tokio::test]
async fn optimizer_recommendations_are_ranked() {
    let config = CacheConfig {
        memory_max_bytes: 100,
        ..Default::default()
    };
    let (cache, _) = create_cache(config);

    // 95 of 100 bytes: critical pressure
    cache.set("fill", &"z".repeat(93), None).await.unwrap();
    // Hot key that lives only in the persistent tier
    cache.set_with("hot", &1, SetOptions::persistent_only()).await.unwrap();
    make_hot(&cache, "hot");
    // Misses drag the hit rate under 60%
    for i in 0..4 {
        let _: Option<i32> = cache.get(&format!("missing{}", i)).await.unwrap();
    }

    let optimizer = CacheOptimizer::new(cache.clone());
    let recommendations = optimizer.generate_recommendations();
    let kinds: Vec<RecommendationKind> = recommendations.iter().map(|r| r.kind).collect();

    assert!(kinds.contains(&RecommendationKind::Cleanup));
    assert!(kinds.contains(&RecommendationKind::IncreaseCapacity));
    assert!(kinds.contains(&RecommendationKind::PromoteToMemory));
    assert!(kinds.contains(&RecommendationKind::Preload));

    for pair in recommendations.windows(2) {
        assert!(pair[0].priority <= pair[1].priority);
        if pair[0].priority == pair[1].priority {
            assert!(pair[0].estimated_impact_percent >= pair[1].estimated_impact_percent);
        }
    }
    assert_eq!(recommendations[0].priority, Priority::High);
    assert_eq!(recommendations[0].kind, RecommendationKind::IncreaseCapacity);
}

#[tokio::test]
async fn optimizer_preload_fills_predicted_keys() {
    let (cache, _) = create_cache(CacheConfig::default());
    let optimizer = CacheOptimizer::new(cache.clone()).with_producer(Arc::new(EchoProducer));
    make_hot(&cache, "feed:home");

    let summary = optimizer.tick().await.unwrap();
    assert_eq!(summary.preloaded, 1);
    assert!(cache.is_in_memory("feed:home"));

    let value: Option<serde_json::Value> = cache.get("feed:home").await.unwrap();
    assert_eq!(value, Some(json!({ "produced_for": "feed:home" })));
}

#[tokio::test]
async fn optimizer_report_is_side_effect_free() {
    let (cache, _) = create_cache(CacheConfig::default());
    cache.set("k", &1, None).await.unwrap();
    let _: Option<i32> = cache.get("k").await.unwrap();
    make_hot(&cache, "k");

    let optimizer = CacheOptimizer::new(cache.clone());
    let stats_before = cache.stats();
    let report = optimizer.optimization_report();

    assert_eq!(cache.stats(), stats_before);
    assert_eq!(report.stats, stats_before);
    assert_eq!(report.hot_data[0].key, "k");
    assert!((0.0..=100.0).contains(&report.health_score));

    // Serializes for dashboards
    let rendered = serde_json::to_value(&report).unwrap();
    assert!(rendered.get("health_score").is_some());
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn lifecycle_restart_adopts_existing_entries() {
    let backend = Arc::new(InMemoryBackend::new());
    {
        let cache = Arc::new(TieredCache::new(CacheConfig::default(), backend.clone()));
        cache.start().await.unwrap();
        cache.set("survivor", &article(3), None).await.unwrap();
        cache.set("doomed", &article(4), None).await.unwrap();
        cache.shutdown().await;
    }
    backend.insert_raw("cache_doomed", "garbage");

    let cache = Arc::new(TieredCache::new(CacheConfig::default(), backend.clone()));
    let warmup = cache.start().await.unwrap();
    assert_eq!(warmup.loaded, 1);
    assert_eq!(warmup.corrupt, 1);
    assert_eq!(cache.state(), CacheState::Running);
    assert_eq!(cache.stats().persistent.items, 1);

    let loaded: Option<Article> = cache.get("survivor").await.unwrap();
    assert_eq!(loaded, Some(article(3)));

    cache.shutdown().await;
    cache.shutdown().await;
    assert_eq!(cache.state(), CacheState::Stopped);
}

#[tokio::test]
async fn lifecycle_concurrent_writers_respect_budgets() {
    let config = CacheConfig {
        memory_max_items: 50,
        memory_max_bytes: 4096,
        ..Default::default()
    };
    let (cache, _) = create_cache(config);

    let mut handles = Vec::new();
    for worker in 0..8 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..40 {
                let key = format!("w{}:{}", worker, i);
                cache.set(&key, &"p".repeat(64), None).await.unwrap();
                let _: Option<String> = cache.get(&key).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = cache.stats();
    assert!(stats.memory.items <= 50);
    assert!(stats.memory.bytes.unwrap() <= 4096);
    assert_eq!(stats.requests, 320);
}
