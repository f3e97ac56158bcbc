// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wave-adapters: agent runtimes behind the single `Run` interface.
//!
//! The engine never sees anything of an agent but [`AgentAdapter::run`]:
//! prompt in, exit code / stdout / artifacts / token totals out. Adapters
//! must not write outside the workspace they are handed and must honor the
//! persona's deny/allow permission lists.

pub mod agent;
pub mod subprocess;

pub use agent::{
    AdapterError, AgentAdapter, AgentRunRequest, AgentRunResult, ClaudeAdapter,
};

#[cfg(any(test, feature = "test-support"))]
pub use agent::{FakeAdapter, RecordedRun, ScriptedStep};
