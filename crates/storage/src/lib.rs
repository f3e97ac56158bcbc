// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wave-storage: the narrow state-store interface.
//!
//! The engine logs runs, events, and artifact registrations here for
//! observability. Execution correctness never depends on the store: every
//! engine call site treats failures as log-and-continue.

mod memory;
mod store;

pub use memory::MemoryStore;
pub use store::{
    ArtifactRow, EventQuery, EventRow, ListRunsOptions, StateStore, StoreError,
};
