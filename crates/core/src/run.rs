// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run and step lifecycle status

use crate::id::RunId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Status of a single step within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Waiting to start
    Pending,
    /// Adapter is running
    Running,
    /// Contract failed; another attempt is pending
    Retrying,
    /// Step completed
    Completed,
    /// Step failed
    Failed,
}

impl StepStatus {
    /// True for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Running => write!(f, "running"),
            StepStatus::Retrying => write!(f, "retrying"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Record of a pipeline run, as persisted by the state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub pipeline_name: String,
    pub status: RunStatus,
    /// Root of the run's workspace subtree
    pub workspace_root: PathBuf,
    pub created_at_epoch_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_epoch_ms: Option<u64>,
    #[serde(default)]
    pub tokens_used: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunRecord {
    pub fn new(
        run_id: RunId,
        pipeline_name: impl Into<String>,
        workspace_root: PathBuf,
        created_at_epoch_ms: u64,
    ) -> Self {
        Self {
            run_id,
            pipeline_name: pipeline_name.into(),
            status: RunStatus::Running,
            workspace_root,
            created_at_epoch_ms,
            finished_at_epoch_ms: None,
            tokens_used: 0,
            error: None,
        }
    }

    /// True once the run has reached `completed` or `failed`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, RunStatus::Running)
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
