// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared per-run execution context

use crate::artifact::ArtifactRegistry;
use crate::contract::ContractValidator;
use crate::error::EngineError;
use crate::workspace::WorkspaceManager;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wave_adapters::AgentAdapter;
use wave_core::{Clock, Event, EventSink, RunId, StepId, StepState};
use wave_manifest::{Manifest, PersonaDef, Step};
use wave_storage::{EventRow, StateStore};

/// Everything a step needs from its run. One per `Execute` call; shared by
/// reference with matrix workers.
pub(crate) struct RunContext<C: Clock> {
    pub run_id: RunId,
    pub pipeline_name: String,
    pub input: String,
    pub manifest: Arc<Manifest>,
    pub adapters: HashMap<String, Arc<dyn AgentAdapter>>,
    pub workspaces: WorkspaceManager,
    pub artifacts: ArtifactRegistry,
    pub validator: ContractValidator,
    pub sink: Arc<dyn EventSink>,
    pub store: Option<Arc<dyn StateStore>>,
    pub clock: C,
    pub cancel: CancellationToken,
    pub project_root: PathBuf,
    /// Step result dictionaries (matrix aggregates, scalar summaries).
    pub results: Mutex<HashMap<StepId, Value>>,
    /// Workspace paths by step, for `workspace.ref` reuse.
    pub workspace_paths: Mutex<HashMap<StepId, PathBuf>>,
    pub completed_steps: AtomicUsize,
    pub total_steps: usize,
    pub tokens_total: AtomicU64,
}

impl<C: Clock> RunContext<C> {
    /// Emit to the sink and best-effort log to the state store.
    pub fn emit(&self, event: Event) {
        if let Some(store) = &self.store {
            let row = EventRow {
                run_id: event.run_id.clone(),
                step_id: event.step_id.clone(),
                state: event.state,
                persona: event.persona.clone(),
                message: event.message.clone(),
                tokens_used: event.tokens_used,
                duration_ms: event.duration_ms,
                logged_at: chrono::Utc::now(),
            };
            if let Err(err) = store.log_event(row) {
                tracing::warn!(error = %err, "state store rejected event");
            }
        }
        self.sink.emit(event);
    }

    /// Step-level event with persona and progress counters pre-filled.
    pub fn step_event(&self, step: &Step, state: StepState) -> Event {
        Event::step(
            self.clock.epoch_ms(),
            self.pipeline_name.clone(),
            self.run_id.clone(),
            step.id.clone(),
            state,
        )
        .with_persona(step.persona.clone())
        .with_progress(
            self.completed_steps.load(Ordering::SeqCst),
            self.total_steps,
        )
    }

    pub fn persona(&self, step: &Step) -> Result<&PersonaDef, EngineError> {
        self.manifest
            .persona(&step.persona)
            .ok_or_else(|| EngineError::MissingPersona {
                step: step.id.to_string(),
                persona: step.persona.clone(),
            })
    }

    pub fn adapter(&self, persona_name: &str, persona: &PersonaDef) -> Result<Arc<dyn AgentAdapter>, EngineError> {
        self.adapters
            .get(&persona.adapter)
            .cloned()
            .ok_or_else(|| EngineError::MissingAdapter {
                persona: persona_name.to_string(),
                adapter: persona.adapter.clone(),
            })
    }

    /// Per-step timeout: the step's override, else the manifest default.
    pub fn timeout_for(&self, step: &Step) -> Duration {
        let minutes = step
            .timeout_min
            .unwrap_or_else(|| self.manifest.default_timeout_min());
        Duration::from_secs(minutes * 60)
    }

    pub fn add_tokens(&self, tokens: u64) {
        self.tokens_total.fetch_add(tokens, Ordering::SeqCst);
    }

    pub fn record_result(&self, step_id: StepId, result: Value) {
        self.results.lock().insert(step_id, result);
    }

    pub fn record_workspace(&self, step_id: StepId, path: PathBuf) {
        self.workspace_paths.lock().insert(step_id, path);
    }

    pub fn workspace_of(&self, step_id: &StepId) -> Option<PathBuf> {
        self.workspace_paths.lock().get(step_id).cloned()
    }
}
