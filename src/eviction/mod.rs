// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Eviction policies for tiered cache management.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Eviction Module                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  policy.rs   - Victim selection                              │
//! │  └─ EvictionPolicy: LRU / LFU / FIFO ordering                │
//! │  └─ EvictionCandidate: metadata snapshot of a resident key   │
//! │  └─ select_for_bytes: recency order under byte pressure      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tiers snapshot their entries into [`EvictionCandidate`]s, select victims,
//! then remove them. Selection never touches the live map.
//!
//! Every ordering is stable on the tier insertion sequence, so two entries
//! with equal timestamps always evict in the order they were inserted.

pub mod policy;

pub use policy::{batch_size_for, select_for_bytes, EvictionCandidate, EvictionPolicy};
