// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the engine
//!
//! Definition errors abort before the run starts. Workspace errors are
//! fatal without retry. Contract failures retry up to the contract's bound,
//! then fail hard or soft depending on `must_pass`. Concurrency errors are
//! fatal to the attempting run only.

use crate::dag::DagError;
use crate::guard::GuardError;
use crate::workspace::WorkspaceError;
use thiserror::Error;
use wave_adapters::AdapterError;

/// Errors surfaced by pipeline execution.
#[derive(Debug, Error)]
pub enum EngineError {
    // -- definition errors (fatal at validation) --
    #[error(transparent)]
    Dag(#[from] DagError),
    #[error("step {step}: persona not in manifest: {persona}")]
    MissingPersona { step: String, persona: String },
    #[error("persona {persona}: adapter not registered: {adapter}")]
    MissingAdapter { persona: String, adapter: String },

    // -- workspace errors (fatal, no retry) --
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    // -- artifact errors --
    #[error("step {step}: artifact {source_step}:{artifact} not available for injection")]
    ArtifactMissing {
        step: String,
        source_step: String,
        artifact: String,
    },
    #[error("step {step}: required output artifact {artifact} missing at {path}")]
    RequiredOutputMissing {
        step: String,
        artifact: String,
        path: String,
    },

    // -- adapter errors --
    #[error("step {step}: adapter failed: {source}")]
    Adapter {
        step: String,
        #[source]
        source: AdapterError,
    },

    // -- prompt assembly errors --
    #[error("step {step}: prompt error: {detail}")]
    Prompt { step: String, detail: String },

    // -- contract errors --
    #[error("step {step}: contract validation failed after {attempts} attempt(s): {detail}")]
    ContractValidationFailed {
        step: String,
        attempts: u32,
        detail: String,
    },
    #[error("step {step}: contract error: {detail}")]
    Contract { step: String, detail: String },

    // -- concurrency errors --
    #[error(transparent)]
    Busy(#[from] GuardError),

    // -- matrix errors --
    #[error("step {step}: workers {workers:?} both modified {path}")]
    FileConflict {
        step: String,
        path: String,
        workers: Vec<usize>,
    },
    #[error("step {step}: {failed} of {total} matrix workers failed ({detail})")]
    MatrixPartialFailure {
        step: String,
        failed: usize,
        total: usize,
        detail: String,
    },
    #[error("step {step}: matrix items source invalid: {detail}")]
    MatrixItems { step: String, detail: String },

    // -- resume errors --
    #[error("step not found in pipeline {pipeline}: {step}")]
    StepNotFound { pipeline: String, step: String },
    #[error("prior step {step} incomplete: {detail} (re-run it or pass force)")]
    PrerequisitePhaseIncomplete { step: String, detail: String },

    // -- cancellation --
    #[error("run cancelled before step {step}")]
    Cancelled { step: String },

    // -- step failure wrapper with troubleshooting guidance --
    #[error("{report}")]
    PhaseFailure {
        step: String,
        report: String,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// True for errors that must stop the run without retrying the step.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::Workspace(WorkspaceError::DiskSpaceExhausted { .. })
                | EngineError::Dag(_)
                | EngineError::Busy(_)
                | EngineError::MissingPersona { .. }
                | EngineError::MissingAdapter { .. }
        )
    }

    /// The failing step, when the error is step-scoped.
    pub fn step(&self) -> Option<&str> {
        match self {
            EngineError::MissingPersona { step, .. }
            | EngineError::ArtifactMissing { step, .. }
            | EngineError::RequiredOutputMissing { step, .. }
            | EngineError::Adapter { step, .. }
            | EngineError::Prompt { step, .. }
            | EngineError::ContractValidationFailed { step, .. }
            | EngineError::Contract { step, .. }
            | EngineError::FileConflict { step, .. }
            | EngineError::MatrixPartialFailure { step, .. }
            | EngineError::MatrixItems { step, .. }
            | EngineError::Cancelled { step }
            | EngineError::PhaseFailure { step, .. } => Some(step),
            _ => None,
        }
    }
}

/// Build the user-facing phase-failure report for a failed step.
///
/// Names the failed step, where its workspace lives, where the event log
/// is, and the command that re-runs the pipeline from that step.
pub fn phase_failure_report(
    pipeline: &str,
    step: &str,
    workspace: &std::path::Path,
    cause: &EngineError,
) -> String {
    format!(
        "pipeline {pipeline} failed at step {step}: {cause}\n\
         \n\
         troubleshooting:\n\
         - step workspace: {workspace}\n\
         - events: wave events {pipeline} (state store)\n\
         - retry from here: wave resume {pipeline} --from {step}",
        workspace = workspace.display(),
    )
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
