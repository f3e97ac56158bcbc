// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State store trait and row types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use wave_core::{RunId, RunRecord, StepId, StepState};

/// Errors from state-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("run not found: {0}")]
    RunNotFound(String),
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Filters for listing runs.
#[derive(Debug, Clone, Default)]
pub struct ListRunsOptions {
    /// Restrict to a pipeline name.
    pub pipeline: Option<String>,
    /// Most-recent-first cap; zero means unlimited.
    pub limit: usize,
}

/// Filters for reading back events.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub step_id: Option<StepId>,
    /// Cap on returned rows; zero means unlimited.
    pub limit: usize,
}

/// A logged lifecycle event row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub run_id: RunId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<StepId>,
    pub state: StepState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub tokens_used: u64,
    #[serde(default)]
    pub duration_ms: u64,
    pub logged_at: DateTime<Utc>,
}

/// A registered artifact row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRow {
    pub run_id: RunId,
    pub step_id: StepId,
    pub name: String,
    pub path: PathBuf,
    pub registered_at: DateTime<Utc>,
}

/// Narrow persistence interface used by the engine for observability.
pub trait StateStore: Send + Sync {
    fn create_run(&self, record: RunRecord) -> Result<(), StoreError>;

    fn update_run(&self, record: RunRecord) -> Result<(), StoreError>;

    fn get_run(&self, run_id: &RunId) -> Result<RunRecord, StoreError>;

    /// Runs most-recent-first.
    fn list_runs(&self, opts: ListRunsOptions) -> Result<Vec<RunRecord>, StoreError>;

    fn log_event(&self, row: EventRow) -> Result<(), StoreError>;

    /// Events in logged order, filtered by `query`.
    fn get_events(&self, run_id: &RunId, query: EventQuery) -> Result<Vec<EventRow>, StoreError>;

    fn record_artifact(&self, row: ArtifactRow) -> Result<(), StoreError>;

    fn get_artifacts(
        &self,
        run_id: &RunId,
        step_id: &StepId,
    ) -> Result<Vec<ArtifactRow>, StoreError>;
}
