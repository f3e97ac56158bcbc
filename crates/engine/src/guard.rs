// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide pipeline and workspace serialization
//!
//! Within one process, a pipeline name and a workspace path are each held by
//! at most one run. The guard is a single-lock map; leases release on drop,
//! which covers every terminal path including failure and cancellation.
//! Cross-process exclusion is out of scope (RunID uniqueness isolates
//! workspace trees between processes).

use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use thiserror::Error;

/// Concurrency errors, fatal to the attempting run.
#[derive(Debug, Error, PartialEq)]
pub enum GuardError {
    #[error("pipeline already running: {0}")]
    PipelineBusy(String),
    #[error("workspace already in use: {0}")]
    WorkspaceBusy(String),
}

#[derive(Default)]
struct GuardState {
    pipelines: HashSet<String>,
    workspaces: HashSet<PathBuf>,
}

/// Serializes pipelines and workspaces by name within one process.
#[derive(Default)]
pub struct ConcurrencyGuard {
    state: Arc<Mutex<GuardState>>,
}

static GLOBAL: LazyLock<ConcurrencyGuard> = LazyLock::new(ConcurrencyGuard::default);

impl ConcurrencyGuard {
    /// Fresh guard for tests; production code shares [`ConcurrencyGuard::global`].
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide guard.
    pub fn global() -> &'static ConcurrencyGuard {
        &GLOBAL
    }

    /// Acquire both the pipeline-name lock and the workspace-path lock.
    ///
    /// Rejects with [`GuardError::PipelineBusy`] or
    /// [`GuardError::WorkspaceBusy`] if either is held; on success returns a
    /// lease that releases both on drop.
    pub fn acquire(
        &self,
        pipeline: &str,
        workspace: &Path,
    ) -> Result<GuardLease, GuardError> {
        let mut state = self.state.lock();
        if state.pipelines.contains(pipeline) {
            return Err(GuardError::PipelineBusy(pipeline.to_string()));
        }
        if state.workspaces.contains(workspace) {
            return Err(GuardError::WorkspaceBusy(workspace.display().to_string()));
        }
        state.pipelines.insert(pipeline.to_string());
        state.workspaces.insert(workspace.to_path_buf());
        Ok(GuardLease {
            state: Arc::clone(&self.state),
            pipeline: pipeline.to_string(),
            workspace: workspace.to_path_buf(),
        })
    }

    /// True while the pipeline name is held.
    pub fn is_pipeline_held(&self, pipeline: &str) -> bool {
        self.state.lock().pipelines.contains(pipeline)
    }
}

/// Held locks for one run; dropping releases them.
pub struct GuardLease {
    state: Arc<Mutex<GuardState>>,
    pipeline: String,
    workspace: PathBuf,
}

impl Drop for GuardLease {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.pipelines.remove(&self.pipeline);
        state.workspaces.remove(&self.workspace);
    }
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
