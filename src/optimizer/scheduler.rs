// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Optimizer scheduler.
//!
//! A background task ticks every `optimizer_interval_ms`:
//! 1. Predictive preload: hot keys predicted within `preload_horizon_ms` are
//!    produced by the [`ValueProducer`] and written (at most
//!    `max_preload_items` per tick)
//! 2. Access-history pruning (`history_retention_ms`)
//!
//! [`CacheOptimizer::auto_optimize`] is caller-driven and executes every
//! `High` priority recommendation. Ticks and `auto_optimize` share a run
//! guard: a tick that finds it taken is skipped, `auto_optimize` waits.

use std::sync::{Arc, Weak};
use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::coordinator::TieredCache;
use crate::entry::now_millis;
use crate::error::{CacheError, ProducerError};
use super::recommendations::{
    due_within, generate_recommendations, Priority, Recommendation, RecommendationInput, RecommendationKind,
};
use super::report::{health_score, OptimizationReport};

/// Produces fresh values for predictive preloading.
#[async_trait]
pub trait ValueProducer: Send + Sync {
    async fn produce(&self, key: &str) -> Result<serde_json::Value, ProducerError>;
}

/// Counts from one [`CacheOptimizer::auto_optimize`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizationSummary {
    /// High priority recommendations applied
    pub executed: usize,
    /// High priority recommendations that failed (logged)
    pub failed: usize,
    /// Lower priority recommendations left alone
    pub skipped: usize,
}

/// Counts from one scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub preloaded: usize,
    pub preload_failed: usize,
    pub pruned_keys: usize,
}

/// Drives recommendations and predictive preloading for a [`TieredCache`].
pub struct CacheOptimizer {
    cache: Arc<TieredCache>,
    producer: Option<Arc<dyn ValueProducer>>,
    run_guard: Mutex<()>,
    shutdown_tx: watch::Sender<bool>,
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl CacheOptimizer {
    /// Optimizer without a producer: preloads are skipped.
    pub fn new(cache: Arc<TieredCache>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            cache,
            producer: None,
            run_guard: Mutex::new(()),
            shutdown_tx,
            task: parking_lot::Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_producer(mut self, producer: Arc<dyn ValueProducer>) -> Self {
        self.producer = Some(producer);
        self
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Current recommendations, ranked. No side effects.
    #[must_use]
    pub fn generate_recommendations(&self) -> Vec<Recommendation> {
        let now = now_millis();
        let stats = self.cache.stats();
        let hot = self
            .cache
            .tracker()
            .analyze_hot_data_at(self.cache.config().prediction_window_ms, now);
        self.recommend(&stats, &hot, now)
    }

    fn recommend(
        &self,
        stats: &crate::coordinator::CacheStats,
        hot: &[crate::analytics::HotDataInfo],
        now: u64,
    ) -> Vec<Recommendation> {
        let config = self.cache.config();
        let input = RecommendationInput {
            stats,
            hot,
            min_hot_score: config.min_hot_score,
            preload_horizon_ms: config.preload_horizon_ms,
            now,
        };
        generate_recommendations(&input, |key| self.cache.is_in_memory(key))
    }

    /// Stats, hot data, recommendations and health score. No side effects.
    #[must_use]
    pub fn optimization_report(&self) -> OptimizationReport {
        let now = now_millis();
        let stats = self.cache.stats();
        let hot_data = self
            .cache
            .tracker()
            .analyze_hot_data_at(self.cache.config().prediction_window_ms, now);
        let recommendations = self.recommend(&stats, &hot_data, now);
        let health_score = health_score(&stats, self.cache.tracker().recent_hit_ratio());

        OptimizationReport {
            generated_at: now,
            stats,
            hot_data,
            recommendations,
            health_score,
        }
    }

    /// Execute every `High` priority recommendation.
    ///
    /// Failures are logged and counted; they never stop the batch.
    #[tracing::instrument(skip(self))]
    pub async fn auto_optimize(&self) -> OptimizationSummary {
        let _guard = self.run_guard.lock().await;
        let recommendations = self.generate_recommendations();
        let mut summary = OptimizationSummary::default();

        for recommendation in &recommendations {
            crate::metrics::record_recommendation(
                &recommendation.kind.to_string(),
                &recommendation.priority.to_string(),
            );
            if recommendation.priority != Priority::High {
                summary.skipped += 1;
                continue;
            }
            match self.execute(recommendation).await {
                Ok(()) => summary.executed += 1,
                Err(e) => {
                    warn!(
                        kind = %recommendation.kind,
                        target = %recommendation.target,
                        error = %e,
                        "Recommendation failed"
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            executed = summary.executed,
            failed = summary.failed,
            skipped = summary.skipped,
            "Auto-optimization complete"
        );
        let report_stats = self.cache.stats();
        crate::metrics::set_health_score(health_score(&report_stats, self.cache.tracker().recent_hit_ratio()));
        summary
    }

    /// Apply one recommendation, whatever its priority.
    pub async fn execute(&self, recommendation: &Recommendation) -> Result<(), CacheError> {
        let target = recommendation.target.as_str();
        let result = match recommendation.kind {
            RecommendationKind::Cleanup => {
                let summary = self.cache.cleanup().await;
                debug!(removed = summary.total_removed(), "Cleanup recommendation applied");
                Ok(())
            }
            RecommendationKind::PromoteToMemory => self.cache.promote(target).await.map(|promoted| {
                debug!(key = %target, promoted, "Promotion recommendation applied");
            }),
            RecommendationKind::ExtendTtl => {
                let ttl_secs = self.cache.config().default_ttl_secs.saturating_mul(2);
                self.cache.extend_ttl(target, ttl_secs).await.map(|_| ())
            }
            RecommendationKind::Preload => self.preload_key(target).await,
            RecommendationKind::IncreaseCapacity => {
                // Budgets are fixed at construction; this one is for operators
                warn!(reason = %recommendation.reason, "Memory tier capacity increase advised");
                Ok(())
            }
        };
        crate::metrics::record_recommendation_executed(&recommendation.kind.to_string(), result.is_ok());
        result
    }

    /// One scheduler pass. Returns `None` if skipped because a run was in flight.
    #[tracing::instrument(skip(self))]
    pub async fn tick(&self) -> Option<TickSummary> {
        let Ok(_guard) = self.run_guard.try_lock() else {
            debug!("Optimizer busy, skipping tick");
            crate::metrics::record_tick_skipped();
            return None;
        };

        let (preloaded, preload_failed) = self.run_preload().await;
        let pruned_keys = self
            .cache
            .tracker()
            .cleanup_history(self.cache.config().history_retention_ms);
        self.cache.update_gauge_metrics();

        Some(TickSummary {
            preloaded,
            preload_failed,
            pruned_keys,
        })
    }

    /// Produce and write hot keys predicted within the preload horizon.
    /// Returns `(preloaded, failed)`.
    async fn run_preload(&self) -> (usize, usize) {
        if self.producer.is_none() {
            return (0, 0);
        }
        let config = self.cache.config();
        let now = now_millis();

        let candidates: Vec<String> = self
            .cache
            .tracker()
            .analyze_hot_data_at(config.prediction_window_ms, now)
            .into_iter()
            .filter(|info| info.hot_score > config.min_hot_score)
            .filter(|info| due_within(info, now, config.preload_horizon_ms))
            .filter(|info| !self.cache.is_in_memory(&info.key))
            .take(config.max_preload_items)
            .map(|info| info.key)
            .collect();

        let mut preloaded = 0;
        let mut failed = 0;
        for key in &candidates {
            match self.preload_key(key).await {
                Ok(()) => preloaded += 1,
                Err(e) => {
                    warn!(key = %key, error = %e, "Preload failed");
                    failed += 1;
                }
            }
        }
        if preloaded + failed > 0 {
            debug!(preloaded, failed, "Predictive preload pass");
        }
        (preloaded, failed)
    }

    async fn preload_key(&self, key: &str) -> Result<(), CacheError> {
        let Some(producer) = self.producer.as_ref() else {
            return Err(CacheError::Producer {
                key: key.to_string(),
                reason: "no value producer configured".into(),
            });
        };

        let timeout = self.cache.config().producer_timeout();
        let produced = match tokio::time::timeout(timeout, producer.produce(key)).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                crate::metrics::record_preload(false);
                return Err(CacheError::Producer {
                    key: key.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                crate::metrics::record_preload(false);
                crate::metrics::record_timeout("producer", "produce");
                return Err(CacheError::Producer {
                    key: key.to_string(),
                    reason: format!("timed out after {}ms", timeout.as_millis()),
                });
            }
        };

        let outcome = self.cache.set(key, &produced, None).await;
        crate::metrics::record_preload(outcome.is_ok());
        outcome.map(|_| ())
    }

    /// Spawn the periodic tick task. No-op if already running.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }
        self.shutdown_tx.send_replace(false);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let period = self.cache.config().optimizer_interval();
        *task = Some(tokio::spawn(run_optimizer_loop(Arc::downgrade(self), period, shutdown_rx)));
        info!(interval_ms = period.as_millis() as u64, "Cache optimizer started");
    }

    /// Stop the tick task. Idempotent; an in-flight tick finishes first.
    pub async fn stop(&self) {
        self.shutdown_tx.send_replace(true);
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Optimizer task ended abnormally");
            }
            info!("Cache optimizer stopped");
        }
    }
}

async fn run_optimizer_loop(
    optimizer: Weak<CacheOptimizer>,
    period: std::time::Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let Some(optimizer) = optimizer.upgrade() else {
                    break;
                };
                if let Some(summary) = optimizer.tick().await {
                    debug!(
                        preloaded = summary.preloaded,
                        preload_failed = summary.preload_failed,
                        pruned_keys = summary.pruned_keys,
                        "Optimizer tick"
                    );
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}
