// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Persistent backends.
//!
//! - [`traits`]: the [`PersistentBackend`](traits::PersistentBackend) contract
//! - [`memory`]: `DashMap`-backed implementation

pub mod traits;
pub mod memory;
