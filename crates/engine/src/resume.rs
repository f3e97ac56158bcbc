// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resume from a chosen step
//!
//! Prior state is reconstructed from disk: run roots matching
//! `<pipelineName>-*` are scanned newest-first for either `<stepId>/` or
//! `__wt_*` directories whose contents satisfy each prior step's declared
//! outputs. Recovered steps are marked completed (synthetic events),
//! their artifact paths pre-registered, and the walk delegates to the
//! pipeline executor with a dependency-stripped subpipeline, so the slice
//! validates as a DAG in isolation.

use crate::cascade::max_mtime;
use crate::error::EngineError;
use crate::executor::{ExecuteOptions, PipelineExecutor, RunSummary};
use crate::workspace::WorkspaceManager;
use std::collections::HashSet;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use wave_core::{Clock, Event, RunId, StepId, StepState};
use wave_manifest::{Pipeline, Step};

/// A prior step recovered from a previous run's workspace tree.
#[derive(Debug, Clone)]
pub struct RecoveredStep {
    pub step_id: StepId,
    pub workspace: PathBuf,
    /// `(artifact name, absolute path)` pairs found on disk.
    pub artifacts: Vec<(String, PathBuf)>,
}

/// Drives resume-from-step on top of a pipeline executor.
pub struct ResumeManager<'a, C: Clock> {
    executor: &'a PipelineExecutor<C>,
}

impl<'a, C: Clock> ResumeManager<'a, C> {
    pub fn new(executor: &'a PipelineExecutor<C>) -> Self {
        Self { executor }
    }

    /// Re-run `pipeline` from `from_step`, recovering earlier steps from
    /// prior run workspaces.
    ///
    /// Without `force`, every prior step that declares required outputs
    /// must be recoverable (its completion markers found on disk), and
    /// stale-artifact warnings are emitted for recovered workspaces older
    /// than their dependencies.
    pub async fn resume_from_step(
        &self,
        pipeline: &Pipeline,
        input: &str,
        from_step: &str,
        force: bool,
    ) -> Result<RunSummary, EngineError> {
        self.resume_with_cancel(pipeline, input, from_step, force, CancellationToken::new())
            .await
    }

    pub async fn resume_with_cancel(
        &self,
        pipeline: &Pipeline,
        input: &str,
        from_step: &str,
        force: bool,
        cancel: CancellationToken,
    ) -> Result<RunSummary, EngineError> {
        let from_index =
            pipeline
                .index_of(from_step)
                .ok_or_else(|| EngineError::StepNotFound {
                    pipeline: pipeline.name.clone(),
                    step: from_step.to_string(),
                })?;

        let prior_steps = &pipeline.steps[..from_index];
        let recovered = reconstruct_prior_state(&self.executor.workspaces, pipeline, prior_steps);

        if !force {
            self.validate_phase_sequence(prior_steps, &recovered)?;
        }

        let run_id = RunId::generate(&pipeline.name, self.executor.manifest.run_id_length());
        self.executor.sink.emit(
            Event::pipeline(
                self.executor.clock.epoch_ms(),
                pipeline.name.clone(),
                run_id.clone(),
                StepState::Resuming,
            )
            .with_message(format!(
                "resuming from {from_step}; recovered {} prior step(s)",
                recovered.len()
            )),
        );
        if !force {
            self.warn_stale_artifacts(pipeline, prior_steps, &recovered, &run_id);
        }

        for step in &recovered {
            tracing::info!(
                step = %step.step_id,
                workspace = %step.workspace.display(),
                artifacts = step.artifacts.len(),
                "recovered prior step"
            );
        }

        let subpipeline = build_subpipeline(pipeline, from_index);
        let prior_completed: Vec<StepId> =
            recovered.iter().map(|r| r.step_id.clone()).collect();
        let prior_artifacts: Vec<(StepId, String, PathBuf)> = recovered
            .into_iter()
            .flat_map(|r| {
                let step_id = r.step_id;
                r.artifacts
                    .into_iter()
                    .map(move |(name, path)| (step_id.clone(), name, path))
            })
            .collect();

        self.executor
            .execute_with(
                &subpipeline,
                input,
                ExecuteOptions {
                    run_id: Some(run_id),
                    prior_completed,
                    prior_artifacts,
                    cancel: Some(cancel),
                },
            )
            .await
    }

    /// Generalized phase-sequence validation: a prior step's completion
    /// markers are its required output artifacts.
    fn validate_phase_sequence(
        &self,
        prior_steps: &[Step],
        recovered: &[RecoveredStep],
    ) -> Result<(), EngineError> {
        let recovered_ids: HashSet<&str> =
            recovered.iter().map(|r| r.step_id.as_str()).collect();
        for step in prior_steps {
            if step.required_outputs().next().is_some()
                && !recovered_ids.contains(step.id.as_str())
            {
                return Err(EngineError::PrerequisitePhaseIncomplete {
                    step: step.id.to_string(),
                    detail: format!(
                        "no prior workspace satisfies its {} required output(s)",
                        step.required_outputs().count()
                    ),
                });
            }
        }
        Ok(())
    }

    /// Warn when a recovered workspace is older than one of its
    /// dependencies' workspaces.
    fn warn_stale_artifacts(
        &self,
        pipeline: &Pipeline,
        prior_steps: &[Step],
        recovered: &[RecoveredStep],
        run_id: &RunId,
    ) {
        let workspace_of = |id: &str| {
            recovered
                .iter()
                .find(|r| r.step_id == *id)
                .map(|r| r.workspace.clone())
        };
        for step in prior_steps {
            let Some(consumer_ws) = workspace_of(step.id.as_str()) else {
                continue;
            };
            let Some(consumer_mtime) = max_mtime(&consumer_ws) else {
                continue;
            };
            for dep in &step.dependencies {
                let Some(dep_ws) = workspace_of(dep.as_str()) else {
                    continue;
                };
                if max_mtime(&dep_ws).is_some_and(|dep_mtime| dep_mtime > consumer_mtime) {
                    self.executor.sink.emit(
                        Event::step(
                            self.executor.clock.epoch_ms(),
                            pipeline.name.clone(),
                            run_id.clone(),
                            step.id.clone(),
                            StepState::StaleArtifactsDetected,
                        )
                        .with_message(format!(
                            "workspace of dependency {dep} is newer than {}",
                            step.id
                        )),
                    );
                }
            }
        }
    }
}

/// Scan prior run roots for workspaces satisfying each prior step.
fn reconstruct_prior_state(
    workspaces: &WorkspaceManager,
    pipeline: &Pipeline,
    prior_steps: &[Step],
) -> Vec<RecoveredStep> {
    let run_roots = workspaces.prior_run_roots(&pipeline.name);
    let mut recovered = Vec::new();
    for step in prior_steps {
        let hit = run_roots.iter().find_map(|root| {
            WorkspaceManager::step_dir_candidates(root, &step.id)
                .into_iter()
                .find_map(|dir| satisfies(step, &dir))
        });
        if let Some(found) = hit {
            recovered.push(found);
        }
    }
    recovered
}

/// A directory satisfies a step when every declared output artifact that is
/// `required` exists beneath it. Steps without required outputs accept any
/// existing directory.
fn satisfies(step: &Step, dir: &std::path::Path) -> Option<RecoveredStep> {
    if !dir.is_dir() {
        return None;
    }
    let mut artifacts = Vec::new();
    for artifact in &step.output_artifacts {
        let path = dir.join(&artifact.path);
        if path.is_file() {
            artifacts.push((artifact.name.clone(), path));
        } else if artifact.required {
            return None;
        }
    }
    Some(RecoveredStep {
        step_id: step.id.clone(),
        workspace: dir.to_path_buf(),
        artifacts,
    })
}

/// The slice from `from_index` onward, with dependencies (and workspace
/// refs) on excluded steps stripped so the subpipeline validates alone.
fn build_subpipeline(pipeline: &Pipeline, from_index: usize) -> Pipeline {
    let included: HashSet<&str> = pipeline.steps[from_index..]
        .iter()
        .map(|s| s.id.as_str())
        .collect();
    let steps = pipeline.steps[from_index..]
        .iter()
        .map(|step| {
            let mut step = step.clone();
            step.dependencies
                .retain(|dep| included.contains(dep.as_str()));
            if let Some(referenced) = &step.workspace.step_ref {
                if !included.contains(referenced.as_str()) {
                    step.workspace.step_ref = None;
                }
            }
            step
        })
        .collect();
    Pipeline {
        name: pipeline.name.clone(),
        description: pipeline.description.clone(),
        steps,
    }
}

/// The earliest step whose completion markers (required outputs) are not
/// satisfied by any prior run workspace; `None` when every step is covered.
pub fn recommended_resume_point(
    workspaces: &WorkspaceManager,
    pipeline: &Pipeline,
) -> Option<StepId> {
    let run_roots = workspaces.prior_run_roots(&pipeline.name);
    for step in &pipeline.steps {
        let satisfied = run_roots.iter().any(|root| {
            WorkspaceManager::step_dir_candidates(root, &step.id)
                .into_iter()
                .any(|dir| satisfies(step, &dir).is_some())
        });
        if !satisfied {
            return Some(step.id.clone());
        }
    }
    None
}

#[cfg(test)]
#[path = "resume_tests.rs"]
mod tests;
