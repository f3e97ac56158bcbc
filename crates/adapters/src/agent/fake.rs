// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake agent adapter for deterministic testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{AdapterError, AgentAdapter, AgentRunRequest, AgentRunResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use wave_core::StepId;
use wave_manifest::MemoryStrategy;

/// Recorded invocation of the fake adapter.
#[derive(Debug, Clone)]
pub struct RecordedRun {
    pub invocation_id: String,
    pub step_id: StepId,
    pub persona: String,
    pub prompt: String,
    pub workspace_path: PathBuf,
    pub memory: MemoryStrategy,
}

/// One scripted invocation outcome.
///
/// `files` are written into the workspace (relative paths, parents created)
/// before the result is returned, emulating an agent that produced
/// artifacts. `delay_ms` holds the invocation open so concurrency tests can
/// observe overlap.
#[derive(Debug, Clone, Default)]
pub struct ScriptedStep {
    pub files: Vec<(String, String)>,
    pub stdout: String,
    pub result_content: Option<String>,
    pub tokens: u64,
    pub delay_ms: u64,
    /// When set, the invocation fails with this message instead.
    pub error: Option<String>,
}

impl ScriptedStep {
    /// A successful invocation writing one file.
    pub fn writes(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            files: vec![(path.into(), contents.into())],
            ..Self::default()
        }
    }

    /// A successful invocation producing only stdout.
    pub fn prints(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    /// A failing invocation.
    pub fn fails(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files.push((path.into(), contents.into()));
        self
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

type Handler =
    Arc<dyn Fn(&AgentRunRequest) -> Result<ScriptedStep, AdapterError> + Send + Sync>;

#[derive(Default)]
struct FakeState {
    calls: Vec<RecordedRun>,
    queued: HashMap<StepId, VecDeque<ScriptedStep>>,
    defaults: HashMap<StepId, ScriptedStep>,
    handlers: HashMap<StepId, Handler>,
    active: usize,
    max_active: usize,
}

/// Fake agent adapter: scripted per-step outcomes, recorded calls, and a
/// concurrency watermark.
///
/// Resolution order per invocation: a registered handler wins; otherwise the
/// front of the step's queue is popped; otherwise the step's default; an
/// unscripted step succeeds with an empty result.
#[derive(Clone, Default)]
pub struct FakeAdapter {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome for the next unconsumed invocation of `step`.
    pub fn enqueue(&self, step: impl Into<StepId>, outcome: ScriptedStep) {
        self.inner
            .lock()
            .queued
            .entry(step.into())
            .or_default()
            .push_back(outcome);
    }

    /// Outcome used when the step's queue is empty.
    pub fn set_default(&self, step: impl Into<StepId>, outcome: ScriptedStep) {
        self.inner.lock().defaults.insert(step.into(), outcome);
    }

    /// Full control over a step's behavior; sees the whole request.
    pub fn set_handler(
        &self,
        step: impl Into<StepId>,
        handler: impl Fn(&AgentRunRequest) -> Result<ScriptedStep, AdapterError>
            + Send
            + Sync
            + 'static,
    ) {
        self.inner
            .lock()
            .handlers
            .insert(step.into(), Arc::new(handler));
    }

    /// All recorded invocations, in order.
    pub fn calls(&self) -> Vec<RecordedRun> {
        self.inner.lock().calls.clone()
    }

    /// Number of invocations recorded for a step.
    pub fn call_count(&self, step: &str) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| c.step_id == step)
            .count()
    }

    /// High-water mark of concurrently active invocations.
    pub fn max_concurrent(&self) -> usize {
        self.inner.lock().max_active
    }

    fn begin(&self, request: &AgentRunRequest) -> Option<(Option<Handler>, ScriptedStep)> {
        let mut state = self.inner.lock();
        state.calls.push(RecordedRun {
            invocation_id: request.invocation_id.clone(),
            step_id: request.step_id.clone(),
            persona: request.persona.clone(),
            prompt: request.prompt.clone(),
            workspace_path: request.workspace_path.clone(),
            memory: request.memory,
        });
        state.active += 1;
        state.max_active = state.max_active.max(state.active);

        if let Some(handler) = state.handlers.get(&request.step_id) {
            return Some((Some(handler.clone()), ScriptedStep::default()));
        }
        let outcome = state
            .queued
            .get_mut(&request.step_id)
            .and_then(VecDeque::pop_front)
            .or_else(|| state.defaults.get(&request.step_id).cloned())
            .unwrap_or_default();
        Some((None, outcome))
    }

    fn finish(&self) {
        self.inner.lock().active -= 1;
    }
}

#[async_trait]
impl AgentAdapter for FakeAdapter {
    async fn run(&self, request: AgentRunRequest) -> Result<AgentRunResult, AdapterError> {
        // Cancellation is observed at dispatch; an invocation already in
        // flight runs to completion, as the engine contract allows.
        if request.cancel.is_cancelled() {
            return Err(AdapterError::Cancelled);
        }

        let Some((handler, outcome)) = self.begin(&request) else {
            return Err(AdapterError::SpawnFailed("fake state poisoned".to_string()));
        };

        let outcome = match handler {
            Some(handler) => match handler(&request) {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.finish();
                    return Err(err);
                }
            },
            None => outcome,
        };

        if outcome.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(outcome.delay_ms)).await;
        }

        if let Some(message) = outcome.error {
            self.finish();
            return Err(AdapterError::NonZeroExit {
                code: 1,
                stderr: message,
            });
        }

        let mut artifacts_found = Vec::new();
        for (rel, contents) in &outcome.files {
            let path = request.workspace_path.join(rel);
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Err(err) = std::fs::write(&path, contents) {
                self.finish();
                return Err(AdapterError::Io(err));
            }
            artifacts_found.push(PathBuf::from(rel));
        }

        self.finish();
        Ok(AgentRunResult {
            exit_code: 0,
            stdout: outcome.stdout,
            result_content: outcome.result_content,
            artifacts_found,
            tokens_used: outcome.tokens,
        })
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
