// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Tier stores.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Memory tier (fast)                       │
//! │  • DashMap entries, per-tier mutation lock                  │
//! │  • Item-count budget (policy) + byte budget (recency)       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ write-through / promotion
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Persistent tier (larger, slower)            │
//! │  • JSON envelopes in a PersistentBackend                    │
//! │  • In-process key index, item-count budget (policy)         │
//! │  • Corrupt envelopes removed on sight                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod memory;
pub mod persistent;

pub use memory::{AdmitOutcome, MemoryTier, WriteTicket};
pub use persistent::{PersistentTier, WarmupSummary};

use crate::entry::CacheEntry;

/// Result of a tier lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Live entry (bookkeeping already applied)
    Hit(CacheEntry),
    /// Entry existed but had expired; it has been removed
    Expired,
    /// No entry (corrupt entries are removed and reported as misses)
    Miss,
}

impl Lookup {
    #[must_use]
    pub fn into_hit(self) -> Option<CacheEntry> {
        match self {
            Self::Hit(entry) => Some(entry),
            Self::Expired | Self::Miss => None,
        }
    }
}
