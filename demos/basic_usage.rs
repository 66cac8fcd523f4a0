// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic tiered-cache usage example.
//!
//! Demonstrates:
//! 1. Building a cache over the in-process persistent backend
//! 2. Writing entries (one persistent-only) and reading them back
//! 3. Promotion of a repeatedly read persistent entry
//! 4. Hot-data analysis, recommendations and predictive preload
//! 5. Displaying stats and raw metrics
//! 6. Clean shutdown
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;
use std::time::Instant;
use async_trait::async_trait;
use serde_json::json;
use tiered_cache::{
    CacheConfig, CacheOptimizer, InMemoryBackend, ProducerError, SetOptions, TieredCache, ValueProducer,
};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

/// Stands in for the slow origin a real deployment would preload from.
struct OriginProducer;

#[async_trait]
impl ValueProducer for OriginProducer {
    async fn produce(&self, key: &str) -> Result<serde_json::Value, ProducerError> {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        Ok(json!({ "key": key, "source": "origin" }))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           tiered-cache: Basic Usage Example                   ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Configure and start the cache
    // ─────────────────────────────────────────────────────────────────────────
    println!("📦 Configuring tiered-cache...");

    let config = CacheConfig {
        memory_max_items: 100,
        memory_max_bytes: 64 * 1024,
        persistent_max_items: 1_000,
        default_ttl_secs: 300,
        ..Default::default()
    };
    let backend = Arc::new(InMemoryBackend::new());
    let cache = Arc::new(TieredCache::new(config, backend.clone()));
    println!("   State: {:?}", cache.state());

    let warmup = cache.start().await?;
    println!("   ✅ Cache running! State: {:?}, warm-up loaded {}", cache.state(), warmup.loaded);

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Write entries
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📝 Writing 5 entries...");
    let entries = vec![
        ("user.alice", json!({"name": "Alice", "role": "admin"})),
        ("user.bob", json!({"name": "Bob", "role": "user"})),
        ("user.carol", json!({"name": "Carol", "role": "user"})),
        ("config.app", json!({"theme": "dark", "version": "2.0"})),
        ("stats.daily", json!({"requests": 42000, "latency_p99": 12})),
    ];
    for (key, value) in &entries {
        let outcome = cache.set(key, value, None).await?;
        println!("   └─ {} → {:?}", key, outcome);
    }

    let outcome = cache
        .set_with("report.archive", &json!({"rows": 1_000_000}), SetOptions::persistent_only())
        .await?;
    println!("   └─ report.archive (persistent only) → {:?}", outcome);

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Read back, with timing
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📖 Reading entries back...");
    for (key, _) in &entries {
        let start = Instant::now();
        let value: Option<serde_json::Value> = cache.get(key).await?;
        println!("   └─ {} → {} ({:?})", key, value.unwrap_or_default(), start.elapsed());
    }

    println!("\n⬆️  Reading the persistent-only entry until it is promoted...");
    for attempt in 1..=3 {
        let start = Instant::now();
        let _: Option<serde_json::Value> = cache.get("report.archive").await?;
        println!(
            "   └─ read #{}: in memory = {} ({:?})",
            attempt,
            cache.is_in_memory("report.archive"),
            start.elapsed()
        );
    }

    let missing: Option<serde_json::Value> = cache.get("user.nobody").await?;
    println!("   └─ user.nobody → {:?}", missing);

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Optimizer
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔥 Simulating a regular access pattern on 'feed.home'...");
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_millis() as u64;
    for i in (0..10u64).rev() {
        cache.tracker().record_access_at("feed.home", true, now - i * 5_000);
    }

    let optimizer = Arc::new(CacheOptimizer::new(cache.clone()).with_producer(Arc::new(OriginProducer)));
    let report = optimizer.optimization_report();
    println!("   ┌─ Hot data");
    for info in &report.hot_data {
        println!(
            "   │  └─ {} score={:.1} accesses={} next in {}ms",
            info.key,
            info.hot_score,
            info.access_count,
            info.predicted_next_access.saturating_sub(report.generated_at)
        );
    }
    println!("   ├─ Recommendations");
    for rec in &report.recommendations {
        println!("   │  └─ [{}] {} {} ({})", rec.priority, rec.kind, rec.target, rec.reason);
    }
    println!("   └─ Health score: {:.1}", report.health_score);

    if let Some(tick) = optimizer.tick().await {
        println!("\n🔮 Optimizer tick: preloaded {}, failed {}", tick.preloaded, tick.preload_failed);
    }
    println!("   └─ 'feed.home' in memory: {}", cache.is_in_memory("feed.home"));

    let summary = optimizer.auto_optimize().await;
    println!(
        "\n🛠️  Auto-optimize: executed {}, failed {}, skipped {}",
        summary.executed, summary.failed, summary.skipped
    );

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Stats and metrics
    // ─────────────────────────────────────────────────────────────────────────
    let stats = cache.stats();
    println!("\n📊 Cache Stats:");
    println!("   ┌─ Memory tier");
    println!("   │  └─ Items: {}/{}", stats.memory.items, stats.memory.max_items);
    println!(
        "   │  └─ Bytes: {}/{}",
        stats.memory.bytes.unwrap_or_default(),
        stats.memory.max_bytes.unwrap_or_default()
    );
    println!("   │  └─ Pressure: {}", cache.pressure());
    println!("   ├─ Persistent tier");
    println!("   │  └─ Items: {}/{} (backend keys: {})", stats.persistent.items, stats.persistent.max_items, backend.len());
    println!("   └─ Hit rate: {:.1}% over {} requests", stats.hit_rate * 100.0, stats.requests);

    println!("\n📈 Raw Metrics:");
    cache.update_gauge_metrics();
    dump_metrics(&snapshotter);

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Clean shutdown
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🛑 Shutting down...");
    optimizer.stop().await;
    cache.shutdown().await;
    println!("   ✅ Shutdown complete! State: {:?}", cache.state());

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║                    Example complete!                          ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    Ok(())
}

/// Dump all captured metrics grouped by kind
fn dump_metrics(snapshotter: &Snapshotter) {
    let snapshot = snapshotter.snapshot();

    let mut counters: Vec<_> = vec![];
    let mut gauges: Vec<_> = vec![];
    let mut histograms: Vec<_> = vec![];

    for (composite_key, _, _, value) in snapshot.into_vec() {
        let (_, key) = composite_key.into_parts();
        let name = key.name().to_string();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };

        match value {
            DebugValue::Counter(v) => counters.push((name, label_str, v)),
            DebugValue::Gauge(v) => gauges.push((name, label_str, v.into_inner())),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                let avg = if count > 0 { sum / count as f64 } else { 0.0 };
                histograms.push((name, label_str, count, avg));
            }
        }
    }

    counters.sort_by(|a, b| a.0.cmp(&b.0));
    gauges.sort_by(|a, b| a.0.cmp(&b.0));
    histograms.sort_by(|a, b| a.0.cmp(&b.0));

    if !counters.is_empty() {
        println!("   ┌─ Counters (cumulative)");
        for (name, labels, value) in &counters {
            println!("   │  └─ {}{} = {}", name, labels, value);
        }
    }
    if !gauges.is_empty() {
        println!("   ├─ Gauges (current value)");
        for (name, labels, value) in &gauges {
            println!("   │  └─ {}{} = {:.2}", name, labels, value);
        }
    }
    if !histograms.is_empty() {
        println!("   └─ Histograms (distributions)");
        for (name, labels, count, avg) in &histograms {
            println!("   │  └─ {}{} count={} avg={:.6}", name, labels, count, avg);
        }
    }
    if counters.is_empty() && gauges.is_empty() && histograms.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
}
