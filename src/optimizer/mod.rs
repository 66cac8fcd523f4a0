// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache optimizer.
//!
//! - [`recommendations`]: rule engine turning stats and hot data into ranked advice
//! - [`scheduler`]: [`CacheOptimizer`], the periodic preload/prune task and `auto_optimize`
//! - [`report`]: [`OptimizationReport`] and the health score

pub mod recommendations;
pub mod report;
pub mod scheduler;

pub use recommendations::{Priority, Recommendation, RecommendationKind};
pub use report::OptimizationReport;
pub use scheduler::{CacheOptimizer, OptimizationSummary, TickSummary, ValueProducer};
