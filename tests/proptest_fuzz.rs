// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Property-based tests (fuzzing) for tiered cache resilience.
//!
//! Uses proptest to generate random/malformed inputs and operation sequences
//! and verify the cache never panics and never breaks its budgets.
//!
//! Run with: `cargo test --test proptest_fuzz`

use std::collections::HashSet;
use std::sync::Arc;
use proptest::prelude::*;
use serde_json::{json, Value};

use tiered_cache::analytics::AccessTracker;
use tiered_cache::eviction::{EvictionCandidate, EvictionPolicy};
use tiered_cache::optimizer::recommendations::sort_recommendations;
use tiered_cache::tier::MemoryTier;
use tiered_cache::{
    CacheConfig, CacheEntry, InMemoryBackend, Priority, Recommendation, RecommendationKind, TieredCache,
};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

// =============================================================================
// Strategies for generating test data
// =============================================================================

/// Generate arbitrary JSON values (including structures that look like envelopes)
fn arbitrary_json_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        ".*".prop_map(Value::String),
    ];

    leaf.prop_recursive(
        4,   // depth
        64,  // max nodes
        10,  // items per collection
        |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..10).prop_map(Value::Array),
                prop::collection::hash_map(
                    prop_oneof![
                        Just("payload".to_string()),
                        Just("created_at".to_string()),
                        Just("ttl_secs".to_string()),
                        Just("size_bytes".to_string()),
                        "[a-z_]{1,12}",
                    ],
                    inner,
                    0..8,
                )
                .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        },
    )
}

#[derive(Debug, Clone)]
enum MemoryOp {
    Admit { key: u8, size: usize, ttl_secs: u64 },
    Get { key: u8 },
    Remove { key: u8 },
    Purge,
    Advance { millis: u64 },
}

fn memory_op_strategy() -> impl Strategy<Value = MemoryOp> {
    prop_oneof![
        6 => (0u8..32, 0usize..600, 0u64..5).prop_map(|(key, size, ttl_secs)| MemoryOp::Admit { key, size, ttl_secs }),
        3 => (0u8..32).prop_map(|key| MemoryOp::Get { key }),
        1 => (0u8..32).prop_map(|key| MemoryOp::Remove { key }),
        1 => Just(MemoryOp::Purge),
        1 => (0u64..3_000).prop_map(|millis| MemoryOp::Advance { millis }),
    ]
}

fn policy_strategy() -> impl Strategy<Value = EvictionPolicy> {
    prop_oneof![
        Just(EvictionPolicy::Lru),
        Just(EvictionPolicy::Lfu),
        Just(EvictionPolicy::Fifo),
    ]
}

fn candidate_strategy() -> impl Strategy<Value = Vec<EvictionCandidate>> {
    prop::collection::vec((0u64..50, 0u64..50, 0u64..20, 1usize..100), 0..40).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (created_at, extra, access_count, size_bytes))| EvictionCandidate {
                key: format!("k{}", i),
                size_bytes,
                created_at,
                last_access: created_at + extra,
                access_count,
                seq: i as u64,
            })
            .collect()
    })
}

// =============================================================================
// Envelope Decoding Fuzz Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Garbage text in the backend reads as a miss and is removed
    #[test]
    fn fuzz_garbage_envelope_never_panics(raw in ".*") {
        let rt = runtime();
        let backend = Arc::new(InMemoryBackend::new());
        let cache = TieredCache::new(CacheConfig::default(), backend.clone());
        backend.insert_raw("cache_k", &raw);

        let value: Result<Option<Value>, _> = rt.block_on(cache.get("k"));
        match value {
            Ok(None) => prop_assert!(backend.raw("cache_k").is_none()),
            // Only a well-formed live envelope may come back
            Ok(Some(_)) => prop_assert!(serde_json::from_str::<CacheEntry>(&raw).is_ok()),
            Err(_) => prop_assert!(serde_json::from_str::<CacheEntry>(&raw).is_ok()),
        }
    }

    /// Arbitrary JSON in the backend never panics the read path
    #[test]
    fn fuzz_arbitrary_json_envelope(value in arbitrary_json_strategy()) {
        let rt = runtime();
        let backend = Arc::new(InMemoryBackend::new());
        let cache = TieredCache::new(CacheConfig::default(), backend.clone());
        backend.insert_raw("cache_k", &serde_json::to_string(&value).unwrap());

        let _ = rt.block_on(cache.get::<Value>("k"));
        let stats = cache.stats();
        prop_assert_eq!(stats.requests, 1);
    }

    /// Values of any shape survive a write and read back unchanged
    #[test]
    fn fuzz_arbitrary_values_roundtrip(value in arbitrary_json_strategy()) {
        let rt = runtime();
        let cache = TieredCache::new(CacheConfig::default(), Arc::new(InMemoryBackend::new()));

        rt.block_on(cache.set("k", &value, None)).unwrap();
        let loaded: Option<Value> = rt.block_on(cache.get("k")).unwrap();
        prop_assert_eq!(loaded, Some(value));
    }
}

// =============================================================================
// Memory Tier Budget Invariants
// =============================================================================

proptest! {
    /// Neither budget is ever exceeded, whatever the operation sequence
    #[test]
    fn prop_memory_budgets_hold(
        policy in policy_strategy(),
        max_items in 1usize..12,
        max_bytes in 1usize..3_000,
        ops in prop::collection::vec(memory_op_strategy(), 1..200),
    ) {
        let tier = MemoryTier::new(max_items, max_bytes, policy);
        let mut now = 1_000_000u64;

        for op in ops {
            match op {
                MemoryOp::Admit { key, size, ttl_secs } => {
                    let entry = CacheEntry::new("x".repeat(size), ttl_secs, now);
                    let outcome = tier.admit(&format!("k{}", key), entry);
                    if size > max_bytes {
                        prop_assert!(!outcome.admitted);
                    }
                }
                MemoryOp::Get { key } => {
                    let _ = tier.get(&format!("k{}", key), now);
                }
                MemoryOp::Remove { key } => {
                    tier.remove(&format!("k{}", key));
                }
                MemoryOp::Purge => {
                    tier.purge(now);
                }
                MemoryOp::Advance { millis } => now += millis,
            }

            prop_assert!(tier.len() <= max_items, "items {} > {}", tier.len(), max_items);
            prop_assert!(tier.total_bytes() <= max_bytes, "bytes {} > {}", tier.total_bytes(), max_bytes);
        }

        // Byte accounting returns to zero once everything is gone
        tier.clear();
        prop_assert_eq!(tier.total_bytes(), 0);
        prop_assert!(tier.is_empty());
    }

    /// A freshly admitted entry is readable straight away
    #[test]
    fn prop_admitted_entry_is_readable(
        policy in policy_strategy(),
        sizes in prop::collection::vec(1usize..200, 1..50),
    ) {
        let tier = MemoryTier::new(8, 1_000, policy);
        for (i, size) in sizes.into_iter().enumerate() {
            let key = format!("k{}", i);
            let outcome = tier.admit(&key, CacheEntry::new("y".repeat(size), 60, 1_000));
            prop_assert!(outcome.admitted);
            prop_assert!(tier.contains(&key, 1_000));
        }
    }
}

// =============================================================================
// Eviction Ordering
// =============================================================================

proptest! {
    /// Victims are distinct, bounded by the request, and ordered by the policy key
    #[test]
    fn prop_victims_follow_policy(
        policy in policy_strategy(),
        candidates in candidate_strategy(),
        count in 0usize..50,
    ) {
        let victims = policy.select_victims(&candidates, count);
        prop_assert_eq!(victims.len(), count.min(candidates.len()));

        let unique: HashSet<&String> = victims.iter().collect();
        prop_assert_eq!(unique.len(), victims.len());

        let rank = |key: &str| {
            let c = candidates.iter().find(|c| c.key == key).unwrap();
            match policy {
                EvictionPolicy::Lru => (c.last_access, c.seq),
                EvictionPolicy::Lfu => (c.access_count, c.seq),
                EvictionPolicy::Fifo => (c.created_at, c.seq),
            }
        };
        for pair in victims.windows(2) {
            prop_assert!(rank(&pair[0]) < rank(&pair[1]));
        }
        // Nothing left behind ranks below the last victim
        if let Some(last) = victims.last() {
            let chosen: HashSet<&str> = victims.iter().map(String::as_str).collect();
            for c in candidates.iter().filter(|c| !chosen.contains(c.key.as_str())) {
                prop_assert!(rank(&c.key) > rank(last));
            }
        }
    }
}

// =============================================================================
// Analytics and Recommendations
// =============================================================================

proptest! {
    /// Hot scores stay within 0-100 and predictions never precede the last access
    #[test]
    fn prop_hot_scores_bounded(
        samples in prop::collection::vec((0u8..4, 0u64..300_000), 0..300),
    ) {
        let tracker = AccessTracker::new();
        let now = 10_000_000u64;
        for (key, age) in &samples {
            tracker.record_access_at(&format!("k{}", key), true, now - age);
        }

        let hot = tracker.analyze_hot_data_at(300_000, now);
        for info in &hot {
            prop_assert!((0.0..=100.0).contains(&info.hot_score));
            prop_assert!(info.access_count >= 2);
            prop_assert!(info.predicted_next_access >= info.last_access);
        }
        for pair in hot.windows(2) {
            prop_assert!(pair[0].hot_score >= pair[1].hot_score);
        }
    }

    /// Ranking puts every High before any Medium before any Low
    #[test]
    fn prop_recommendations_sorted(
        rows in prop::collection::vec((0u8..3, 0.0f64..100.0), 0..30),
    ) {
        let mut recommendations: Vec<Recommendation> = rows
            .into_iter()
            .enumerate()
            .map(|(i, (p, impact))| Recommendation {
                kind: RecommendationKind::Cleanup,
                target: format!("t{}", i),
                reason: String::new(),
                priority: match p {
                    0 => Priority::High,
                    1 => Priority::Medium,
                    _ => Priority::Low,
                },
                estimated_impact_percent: impact,
            })
            .collect();

        sort_recommendations(&mut recommendations);
        for pair in recommendations.windows(2) {
            prop_assert!(pair[0].priority <= pair[1].priority);
            if pair[0].priority == pair[1].priority {
                prop_assert!(pair[0].estimated_impact_percent >= pair[1].estimated_impact_percent);
            }
        }
    }

    /// Entries never come back to life as time moves forward
    #[test]
    fn prop_expiry_is_monotonic(ttl_secs in 0u64..10, created_at in 0u64..1_000_000, steps in prop::collection::vec(0u64..5_000, 1..20)) {
        let entry = CacheEntry::new(json!("v").to_string(), ttl_secs, created_at);
        let mut now = created_at;
        let mut expired = entry.is_expired_at(now);
        for step in steps {
            now += step;
            let next = entry.is_expired_at(now);
            prop_assert!(!expired || next);
            expired = next;
        }
    }
}
