// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent adapter abstraction
//!
//! An adapter runs one step's worth of work inside an isolated workspace.
//! The engine builds the prompt, picks the persona, and enforces the
//! timeout; the adapter owns everything between dispatch and exit.

mod claude;

pub use claude::ClaudeAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeAdapter, RecordedRun, ScriptedStep};

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use wave_core::{RunId, StepId};
use wave_manifest::{MemoryStrategy, PermissionSet};

/// Errors from agent invocations.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("agent timed out after {0}s")]
    Timeout(u64),
    #[error("agent exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("cancelled")]
    Cancelled,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One step's dispatch to an agent.
#[derive(Debug, Clone)]
pub struct AgentRunRequest {
    /// Unique per invocation (retries get fresh IDs).
    pub invocation_id: String,
    pub run_id: RunId,
    pub step_id: StepId,
    /// Persona name, for adapter-side logging and session labeling.
    pub persona: String,
    /// Fully rendered prompt.
    pub prompt: String,
    /// The step's workspace; the adapter must not write outside it.
    pub workspace_path: PathBuf,
    /// Deny/allow tool lists from the persona. Deny wins.
    pub permissions: PermissionSet,
    /// Whether prior conversational state is carried into this invocation.
    pub memory: MemoryStrategy,
    /// Engine-enforced wall-clock bound; adapters should also honor it.
    pub timeout: Duration,
    /// Cooperative cancel: observed between steps by the engine, and
    /// propagated here so a running adapter can abort early.
    pub cancel: CancellationToken,
}

/// What came back from an agent invocation.
#[derive(Debug, Clone, Default)]
pub struct AgentRunResult {
    pub exit_code: i32,
    /// Captured standard output (streamed by the adapter, collected here).
    pub stdout: String,
    /// Adapter-reported final result content, when distinct from stdout.
    pub result_content: Option<String>,
    /// Workspace-relative paths the adapter reports having written.
    pub artifacts_found: Vec<PathBuf>,
    pub tokens_used: u64,
}

/// The single Run interface between the engine and an agent runtime.
#[async_trait]
pub trait AgentAdapter: Send + Sync {
    /// Execute one invocation to completion.
    ///
    /// Contracts: must not mutate files outside `request.workspace_path`;
    /// must honor the deny/allow permission lists; must stream stdout.
    async fn run(&self, request: AgentRunRequest) -> Result<AgentRunResult, AdapterError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
