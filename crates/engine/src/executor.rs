// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline execution
//!
//! The top-level walk is sequential: steps run one at a time in topological
//! order; parallelism lives only inside matrix steps. The concurrency guard
//! is held for the whole run and released on every terminal path. A failed
//! step terminates the run with a formatted phase-failure report carrying
//! troubleshooting guidance.

use crate::context::RunContext;
use crate::contract::ContractValidator;
use crate::error::{phase_failure_report, EngineError};
use crate::guard::{ConcurrencyGuard, GuardLease};
use crate::workspace::WorkspaceManager;
use crate::{artifact::ArtifactRegistry, dag, matrix, step};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wave_adapters::AgentAdapter;
use wave_core::{Clock, Event, EventSink, NullSink, RunId, RunRecord, RunStatus, StepId, StepState, SystemClock};
use wave_manifest::{Manifest, Pipeline};
use wave_storage::StateStore;

/// Terminal result of one step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step_id: StepId,
    /// Adapter invocations consumed (1 + retries).
    pub attempts: u32,
    pub tokens_used: u64,
    pub duration_ms: u64,
    pub workspace: PathBuf,
    /// Registered `(name, absolute path)` pairs.
    pub artifacts: Vec<(String, PathBuf)>,
    pub outcomes: BTreeMap<String, Value>,
    /// True when a `must_pass: false` contract failed and the run continued.
    pub soft_failed: bool,
}

/// Terminal result of one run.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: RunId,
    pub pipeline_name: String,
    pub status: RunStatus,
    pub tokens_used: u64,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    /// Declared outcome extractions, by step.
    pub outcomes: BTreeMap<String, BTreeMap<String, Value>>,
    /// Step result dictionaries (matrix aggregates included).
    pub results: HashMap<StepId, Value>,
}

/// Knobs for resume and cancellation; `Default` is a fresh full run.
#[derive(Debug, Default)]
pub struct ExecuteOptions {
    /// Fixed run ID (resume allocates its own).
    pub run_id: Option<RunId>,
    /// Steps completed in prior runs; synthetic `completed` events are
    /// emitted for them and they count toward progress totals.
    pub prior_completed: Vec<StepId>,
    /// Artifact paths recovered from prior runs, pre-registered before the
    /// walk starts.
    pub prior_artifacts: Vec<(StepId, String, PathBuf)>,
    /// Cooperative cancel; observed between steps and inside adapter calls.
    pub cancel: Option<CancellationToken>,
}

/// Executes pipelines against a set of named adapters.
pub struct PipelineExecutor<C: Clock = SystemClock> {
    pub(crate) manifest: Arc<Manifest>,
    pub(crate) adapters: HashMap<String, Arc<dyn AgentAdapter>>,
    pub(crate) workspaces: WorkspaceManager,
    pub(crate) project_root: PathBuf,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) store: Option<Arc<dyn StateStore>>,
    pub(crate) guard: Option<Arc<ConcurrencyGuard>>,
    pub(crate) clock: C,
}

impl PipelineExecutor<SystemClock> {
    pub fn new(
        manifest: Manifest,
        workspace_root: impl Into<PathBuf>,
        project_root: impl Into<PathBuf>,
    ) -> Self {
        let project_root = project_root.into();
        Self {
            manifest: Arc::new(manifest),
            adapters: HashMap::new(),
            workspaces: WorkspaceManager::new(workspace_root, project_root.clone()),
            project_root,
            sink: Arc::new(NullSink),
            store: None,
            guard: None,
            clock: SystemClock,
        }
    }
}

impl<C: Clock> PipelineExecutor<C> {
    /// Register an adapter under the name personas select it by.
    pub fn with_adapter(mut self, name: impl Into<String>, adapter: Arc<dyn AgentAdapter>) -> Self {
        self.adapters.insert(name.into(), adapter);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use an isolated guard instead of the process-wide one (tests).
    pub fn with_guard(mut self, guard: Arc<ConcurrencyGuard>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_clock<C2: Clock>(self, clock: C2) -> PipelineExecutor<C2> {
        PipelineExecutor {
            manifest: self.manifest,
            adapters: self.adapters,
            workspaces: self.workspaces,
            project_root: self.project_root,
            sink: self.sink,
            store: self.store,
            guard: self.guard,
            clock,
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Run a pipeline to a terminal state.
    pub async fn execute(&self, pipeline: &Pipeline, input: &str) -> Result<RunSummary, EngineError> {
        self.execute_with(pipeline, input, ExecuteOptions::default())
            .await
    }

    /// Run a pipeline with resume/cancellation options.
    pub async fn execute_with(
        &self,
        pipeline: &Pipeline,
        input: &str,
        opts: ExecuteOptions,
    ) -> Result<RunSummary, EngineError> {
        // Definition checks come before anything acquires resources.
        self.validate_personas(pipeline)?;
        let order = dag::validate_dag(pipeline)?;

        let lease = self.acquire_guard(pipeline)?;

        let run_id = opts
            .run_id
            .unwrap_or_else(|| RunId::generate(&pipeline.name, self.manifest.run_id_length()));
        let cancel = opts.cancel.unwrap_or_default();

        let ctx = Arc::new(RunContext {
            run_id: run_id.clone(),
            pipeline_name: pipeline.name.clone(),
            input: input.to_string(),
            manifest: Arc::clone(&self.manifest),
            adapters: self.adapters.clone(),
            workspaces: self.workspaces.clone(),
            artifacts: ArtifactRegistry::new(),
            validator: ContractValidator::new(
                self.manifest.approved_schema_dirs.clone(),
                self.project_root.clone(),
            ),
            sink: Arc::clone(&self.sink),
            store: self.store.clone(),
            clock: self.clock.clone(),
            cancel,
            project_root: self.project_root.clone(),
            results: Mutex::new(HashMap::new()),
            workspace_paths: Mutex::new(HashMap::new()),
            completed_steps: AtomicUsize::new(opts.prior_completed.len()),
            total_steps: pipeline.steps.len() + opts.prior_completed.len(),
            tokens_total: AtomicU64::new(0),
        });

        for (step_id, name, path) in opts.prior_artifacts {
            ctx.artifacts.register_output(step_id, name, path);
        }

        let started_ms = self.clock.epoch_ms();
        self.create_run_record(&ctx, started_ms);
        ctx.emit(Event::pipeline(
            started_ms,
            pipeline.name.clone(),
            run_id.clone(),
            StepState::Started,
        ));

        // Observers mark recovered steps done before the walk begins.
        for step_id in &opts.prior_completed {
            ctx.emit(
                Event::step(
                    self.clock.epoch_ms(),
                    pipeline.name.clone(),
                    run_id.clone(),
                    step_id.clone(),
                    StepState::Completed,
                )
                .with_message("recovered from prior run"),
            );
        }

        let outcome = self.walk(pipeline, &order, &ctx).await;
        let duration_ms = self.clock.epoch_ms().saturating_sub(started_ms);
        let tokens_used = ctx.tokens_total.load(Ordering::SeqCst);

        let result = match outcome {
            Ok(steps) => {
                ctx.emit(
                    Event::pipeline(
                        self.clock.epoch_ms(),
                        pipeline.name.clone(),
                        run_id.clone(),
                        StepState::Completed,
                    )
                    .with_tokens(tokens_used)
                    .with_duration_ms(duration_ms)
                    .with_progress(ctx.completed_steps.load(Ordering::SeqCst), ctx.total_steps),
                );
                self.finish_run_record(&ctx, RunStatus::Completed, tokens_used, None);

                let mut outcomes = BTreeMap::new();
                for step_result in &steps {
                    if !step_result.outcomes.is_empty() {
                        outcomes.insert(
                            step_result.step_id.to_string(),
                            step_result.outcomes.clone(),
                        );
                    }
                }
                Ok(RunSummary {
                    run_id: run_id.clone(),
                    pipeline_name: pipeline.name.clone(),
                    status: RunStatus::Completed,
                    tokens_used,
                    duration_ms,
                    steps,
                    outcomes,
                    results: ctx.results.lock().clone(),
                })
            }
            Err(err) => {
                ctx.emit(
                    Event::pipeline(
                        self.clock.epoch_ms(),
                        pipeline.name.clone(),
                        run_id.clone(),
                        StepState::Failed,
                    )
                    .with_message(err.to_string())
                    .with_tokens(tokens_used)
                    .with_duration_ms(duration_ms),
                );
                self.finish_run_record(&ctx, RunStatus::Failed, tokens_used, Some(err.to_string()));
                Err(err)
            }
        };

        drop(lease);
        result
    }

    async fn walk(
        &self,
        pipeline: &Pipeline,
        order: &[StepId],
        ctx: &Arc<RunContext<C>>,
    ) -> Result<Vec<StepResult>, EngineError> {
        let mut results = Vec::with_capacity(order.len());
        for step_id in order {
            if ctx.cancel.is_cancelled() {
                return Err(EngineError::Cancelled {
                    step: step_id.to_string(),
                });
            }
            // The order came from this pipeline; every ID resolves.
            let Some(step) = pipeline.step(step_id.as_str()) else {
                continue;
            };

            tracing::info!(step = %step.id, matrix = step.is_matrix(), "executing step");
            let result = if step.is_matrix() {
                matrix::run_matrix_step(ctx, step).await
            } else {
                step::run_step(ctx, step).await
            };

            match result {
                Ok(step_result) => results.push(step_result),
                Err(err) => {
                    ctx.emit(
                        ctx.step_event(step, StepState::Failed)
                            .with_message(err.to_string()),
                    );
                    let workspace = ctx
                        .workspace_of(&step.id)
                        .unwrap_or_else(|| ctx.workspaces.step_path(&ctx.run_id, &step.id));
                    let report =
                        phase_failure_report(&pipeline.name, step.id.as_str(), &workspace, &err);
                    return Err(EngineError::PhaseFailure {
                        step: step.id.to_string(),
                        report,
                        source: Box::new(err),
                    });
                }
            }
        }
        Ok(results)
    }

    fn validate_personas(&self, pipeline: &Pipeline) -> Result<(), EngineError> {
        for step in &pipeline.steps {
            let persona = self.manifest.persona(&step.persona).ok_or_else(|| {
                EngineError::MissingPersona {
                    step: step.id.to_string(),
                    persona: step.persona.clone(),
                }
            })?;
            if !self.adapters.contains_key(&persona.adapter) {
                return Err(EngineError::MissingAdapter {
                    persona: step.persona.clone(),
                    adapter: persona.adapter.clone(),
                });
            }
        }
        Ok(())
    }

    fn acquire_guard(&self, pipeline: &Pipeline) -> Result<GuardLease, EngineError> {
        let guard = match &self.guard {
            Some(guard) => guard.as_ref(),
            None => ConcurrencyGuard::global(),
        };
        Ok(guard.acquire(&pipeline.name, self.workspaces.root())?)
    }

    fn create_run_record(&self, ctx: &RunContext<C>, started_ms: u64) {
        let Some(store) = &ctx.store else { return };
        let record = RunRecord::new(
            ctx.run_id.clone(),
            ctx.pipeline_name.clone(),
            ctx.workspaces.run_root(&ctx.run_id),
            started_ms,
        );
        if let Err(err) = store.create_run(record) {
            tracing::warn!(error = %err, "state store rejected run record");
        }
    }

    fn finish_run_record(
        &self,
        ctx: &RunContext<C>,
        status: RunStatus,
        tokens_used: u64,
        error: Option<String>,
    ) {
        let Some(store) = &ctx.store else { return };
        let Ok(mut record) = store.get_run(&ctx.run_id) else {
            return;
        };
        record.status = status;
        record.tokens_used = tokens_used;
        record.finished_at_epoch_ms = Some(self.clock.epoch_ms());
        record.error = error;
        if let Err(err) = store.update_run(record) {
            tracing::warn!(error = %err, "state store rejected run update");
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
