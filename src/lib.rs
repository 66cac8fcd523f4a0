// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Tiered Cache
//!
//! A two-tier cache with adaptive eviction and predictive optimization.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       TieredCache                           │
//! │  • get / set / delete / cleanup / stats                     │
//! │  • Reports every read outcome to the AccessTracker          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Memory tier (fast)                       │
//! │  • Item budget (LRU / LFU / FIFO), byte budget (recency)    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ write-through / promotion
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Persistent tier (larger, slower)            │
//! │  • JSON envelopes in any PersistentBackend                  │
//! │  • Corrupt entries removed on sight                         │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CacheOptimizer                          │
//! │  • Hot-data analysis, ranked recommendations                │
//! │  • Predictive preload via a ValueProducer                   │
//! │  • auto_optimize(), optimization report, health score       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tiered_cache::{CacheConfig, CacheOptimizer, InMemoryBackend, TieredCache};
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache = Arc::new(TieredCache::new(
//!         CacheConfig::default(),
//!         Arc::new(InMemoryBackend::new()),
//!     ));
//!     cache.start().await.expect("Failed to start");
//!
//!     cache.set("user:42", &serde_json::json!({"name": "Ada"}), Some(60)).await.unwrap();
//!     let user: Option<serde_json::Value> = cache.get("user:42").await.unwrap();
//!     assert!(user.is_some());
//!
//!     let optimizer = CacheOptimizer::new(cache.clone());
//!     let report = optimizer.optimization_report();
//!     println!("health: {:.1}", report.health_score);
//!
//!     cache.shutdown().await;
//! }
//! ```
//!
//! ## Configuration
//!
//! See [`CacheConfig`] for all configuration options.
//!
//! ## Modules
//!
//! - [`coordinator`]: The main [`TieredCache`] orchestrating both tiers
//! - [`tier`]: Memory and persistent tier stores
//! - [`eviction`]: LRU / LFU / FIFO victim selection
//! - [`storage`]: Persistent backend trait and the in-process backend
//! - [`analytics`]: Access history and hot-data scoring
//! - [`optimizer`]: Recommendations, predictive preload, reports
//! - [`pressure`]: Memory pressure levels

pub mod config;
pub mod entry;
pub mod error;
pub mod storage;
pub mod eviction;
pub mod tier;
pub mod pressure;
pub mod analytics;
pub mod coordinator;
pub mod optimizer;
pub mod metrics;

pub use config::CacheConfig;
pub use entry::CacheEntry;
pub use error::{CacheError, ProducerError};
pub use eviction::EvictionPolicy;
pub use pressure::MemoryPressure;
pub use storage::traits::{PersistentBackend, StorageError};
pub use storage::memory::InMemoryBackend;
pub use tier::WarmupSummary;
pub use analytics::{AccessTracker, HotDataInfo};
pub use coordinator::{TieredCache, CacheState, CacheStats, TierStats, CleanupSummary, SetOptions, SetOutcome};
pub use optimizer::{
    CacheOptimizer, OptimizationReport, OptimizationSummary, Priority, Recommendation, RecommendationKind,
    TickSummary, ValueProducer,
};
pub use metrics::LatencyTimer;
