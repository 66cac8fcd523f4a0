// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache lifecycle management: start, cleanup loop, shutdown.

use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::entry::now_millis;
use crate::error::CacheError;
use crate::tier::WarmupSummary;

use super::{CacheState, TieredCache};

impl TieredCache {
    /// Start the cache.
    ///
    /// 1. Rebuild the persistent index from the backend (expired and corrupt
    ///    envelopes are dropped on the way)
    /// 2. Spawn the periodic cleanup task (`cleanup_interval_ms`)
    ///
    /// Calling `start` on a running cache is a no-op that returns an empty
    /// summary.
    #[tracing::instrument(skip(self))]
    pub async fn start(self: &Arc<Self>) -> Result<WarmupSummary, CacheError> {
        if self.is_running() {
            debug!("Cache already running");
            return Ok(WarmupSummary::default());
        }

        let warmup_start = std::time::Instant::now();
        info!("Starting tiered cache...");
        let summary = self.persistent.warm_index(now_millis()).await?;
        crate::metrics::record_warmup(warmup_start.elapsed(), summary.loaded);

        self.shutdown_tx.send_replace(false);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(run_cleanup_loop(
            Arc::downgrade(self),
            self.config.cleanup_interval(),
            shutdown_rx,
        ));
        if let Some(previous) = self.cleanup_task.lock().replace(handle) {
            previous.abort();
        }

        let _ = self.state.send(CacheState::Running);
        crate::metrics::set_cache_state("Running");
        info!(
            loaded = summary.loaded,
            interval_ms = self.config.cleanup_interval_ms,
            "Tiered cache running"
        );
        Ok(summary)
    }

    /// Stop background cleanup. Idempotent; waits for an in-flight pass to
    /// finish. The cache keeps serving requests afterwards.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        let handle = self.cleanup_task.lock().take();

        if let Some(handle) = handle {
            info!("Initiating tiered cache shutdown...");
            if let Err(e) = handle.await {
                warn!(error = %e, "Cleanup task ended abnormally");
            }
            info!("Tiered cache shutdown complete");
        }

        if self.state() != CacheState::Stopped {
            let _ = self.state.send(CacheState::Stopped);
            crate::metrics::set_cache_state("Stopped");
        }
    }
}

/// Periodic cleanup. Holds only a weak reference so a dropped cache ends the loop.
async fn run_cleanup_loop(
    cache: Weak<TieredCache>,
    period: std::time::Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick completes immediately
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let Some(cache) = cache.upgrade() else {
                    debug!("Cache dropped, cleanup loop exiting");
                    break;
                };
                let summary = cache.cleanup().await;
                debug!(removed = summary.total_removed(), "Periodic cleanup pass");
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!("Cleanup loop received shutdown");
                    break;
                }
            }
        }
    }
}
