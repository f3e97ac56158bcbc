// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle events emitted during a pipeline run
//!
//! Events for a single step are totally ordered: `started` precedes any
//! `retrying`, which precedes the contract outcome, which precedes the
//! terminal state. Sinks are best-effort: a slow or broken sink must never
//! stall execution, so `EventSink::emit` is infallible and implementations
//! swallow their own errors.

use crate::id::{RunId, StepId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states carried by [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    // -- pipeline / step lifecycle --
    Started,
    Running,
    Retrying,
    Completed,
    Failed,
    // -- contract outcomes --
    ContractPassed,
    ContractFailed,
    ContractSoftFailure,
    // -- resume --
    StaleArtifactsDetected,
    Resuming,
    // -- matrix fan-out --
    MatrixStart,
    MatrixItemsLoaded,
    MatrixWorkerStart,
    MatrixWorkerComplete,
    MatrixWorkerFailed,
    MatrixComplete,
    MatrixConflict,
    MatrixFailed,
    // -- concurrent strategy workers --
    ConcurrentWorkerStart,
    ConcurrentWorkerComplete,
    ConcurrentWorkerFailed,
}

impl StepState {
    /// Wire name of this state (snake_case, matches serde).
    pub fn as_str(&self) -> &'static str {
        match self {
            StepState::Started => "started",
            StepState::Running => "running",
            StepState::Retrying => "retrying",
            StepState::Completed => "completed",
            StepState::Failed => "failed",
            StepState::ContractPassed => "contract_passed",
            StepState::ContractFailed => "contract_failed",
            StepState::ContractSoftFailure => "contract_soft_failure",
            StepState::StaleArtifactsDetected => "stale_artifacts_detected",
            StepState::Resuming => "resuming",
            StepState::MatrixStart => "matrix_start",
            StepState::MatrixItemsLoaded => "matrix_items_loaded",
            StepState::MatrixWorkerStart => "matrix_worker_start",
            StepState::MatrixWorkerComplete => "matrix_worker_complete",
            StepState::MatrixWorkerFailed => "matrix_worker_failed",
            StepState::MatrixComplete => "matrix_complete",
            StepState::MatrixConflict => "matrix_conflict",
            StepState::MatrixFailed => "matrix_failed",
            StepState::ConcurrentWorkerStart => "concurrent_worker_start",
            StepState::ConcurrentWorkerComplete => "concurrent_worker_complete",
            StepState::ConcurrentWorkerFailed => "concurrent_worker_failed",
        }
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single lifecycle event.
///
/// `step_id` is `None` for pipeline-level events (run started / completed /
/// failed). `pipeline_id` is the pipeline name; `run_id` identifies the
/// specific run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp_ms: u64,
    pub pipeline_id: String,
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
    #[serde(default)]
    pub completed_steps: usize,
    #[serde(default)]
    pub total_steps: usize,
}

impl Event {
    /// Build a pipeline-level event (no step).
    pub fn pipeline(
        timestamp_ms: u64,
        pipeline_id: impl Into<String>,
        run_id: RunId,
        state: StepState,
    ) -> Self {
        Self {
            timestamp_ms,
            pipeline_id: pipeline_id.into(),
            run_id,
            step_id: None,
            state,
            persona: None,
            message: None,
            tokens_used: 0,
            duration_ms: 0,
            completed_steps: 0,
            total_steps: 0,
        }
    }

    /// Build a step-level event.
    pub fn step(
        timestamp_ms: u64,
        pipeline_id: impl Into<String>,
        run_id: RunId,
        step_id: StepId,
        state: StepState,
    ) -> Self {
        Self {
            step_id: Some(step_id),
            ..Self::pipeline(timestamp_ms, pipeline_id, run_id, state)
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_tokens(mut self, tokens_used: u64) -> Self {
        self.tokens_used = tokens_used;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_progress(mut self, completed_steps: usize, total_steps: usize) -> Self {
        self.completed_steps = completed_steps;
        self.total_steps = total_steps;
        self
    }
}

/// Sink for lifecycle events.
///
/// Contract: best-effort. Implementations must not block the caller and must
/// swallow their own errors.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: Event) {}
}

/// Test sink that records every emitted event.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct CollectingSink {
    events: parking_lot::Mutex<Vec<Event>>,
}

#[cfg(any(test, feature = "test-support"))]
impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events recorded so far, in emission order.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// States recorded for a given step, in order.
    pub fn states_for(&self, step_id: &str) -> Vec<StepState> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.step_id.as_ref().is_some_and(|s| s == step_id))
            .map(|e| e.state)
            .collect()
    }

    /// Count of events in a given state.
    pub fn count_state(&self, state: StepState) -> usize {
        self.events.lock().iter().filter(|e| e.state == state).count()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl EventSink for CollectingSink {
    fn emit(&self, event: Event) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
