// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Memory-tier pressure levels.
//!
//! Derived from `total_bytes / max_bytes` of the memory tier. The levels drive
//! the cleanup recommendation and the `tiered_cache_memory_pressure` gauge.
//!
//! # Example
//!
//! ```
//! use tiered_cache::MemoryPressure;
//!
//! let level = MemoryPressure::from_usage(0.5);
//! assert_eq!(level, MemoryPressure::Normal);
//! assert!(!level.needs_cleanup());
//!
//! let level = MemoryPressure::from_usage(0.85);
//! assert_eq!(level, MemoryPressure::Elevated);
//! assert!(level.needs_cleanup());
//!
//! let level = MemoryPressure::from_usage(0.95);
//! assert_eq!(level, MemoryPressure::Critical);
//! ```

/// Memory pressure based on byte usage ratio.
///
/// - **Normal** (<= 80%): nothing to do
/// - **Elevated** (80-90%): cleanup worthwhile
/// - **Critical** (> 90%): cleanup urgent, admissions start evicting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemoryPressure {
    Normal = 0,
    Elevated = 1,
    Critical = 2,
}

impl MemoryPressure {
    /// Calculate level from a usage ratio (0.0 → 1.0). Bounds are exclusive.
    #[must_use]
    pub fn from_usage(usage: f64) -> Self {
        match usage {
            u if u > 0.90 => Self::Critical,
            u if u > 0.80 => Self::Elevated,
            _ => Self::Normal,
        }
    }

    #[must_use]
    pub fn needs_cleanup(&self) -> bool {
        !matches!(self, Self::Normal)
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Normal => "Normal operation",
            Self::Elevated => "Elevated - memory tier above 80%",
            Self::Critical => "Critical - memory tier above 90%",
        }
    }
}

impl std::fmt::Display for MemoryPressure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
