// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Matrix fan-out execution
//!
//! One worker per item of a JSON array, each in its own `worker_<i>`
//! workspace with `{{ task }}` bound to the item's JSON encoding.
//! Parallelism is bounded by `min(requested, manifest cap)` via a
//! semaphore. Workers are not cancelled when a sibling fails; results are
//! joined, checked for file conflicts, and aggregated into the step's
//! result dictionary.

use crate::context::RunContext;
use crate::error::EngineError;
use crate::executor::StepResult;
use crate::outcomes::{extract_outcomes, lookup_dot_path};
use crate::prompt::build_prompt;
use crate::step::{dispatch, materialize_outputs, template_context};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use wave_core::{Clock, StepState};
use wave_manifest::Step;

/// What one worker produced.
#[derive(Debug)]
struct WorkerOutcome {
    index: usize,
    workspace: PathBuf,
    modified_files: Vec<String>,
    stdout: String,
    tokens_used: u64,
    error: Option<String>,
}

/// Execute a matrix step to a terminal state.
pub(crate) async fn run_matrix_step<C: Clock>(
    ctx: &Arc<RunContext<C>>,
    step: &Step,
) -> Result<StepResult, EngineError> {
    let started_ms = ctx.clock.epoch_ms();
    // Personas validate up front even though workers dispatch later.
    let persona = ctx.persona(step)?;
    ctx.adapter(&step.persona, persona)?;

    let strategy = step.strategy.as_ref().ok_or_else(|| EngineError::MatrixItems {
        step: step.id.to_string(),
        detail: "step has no matrix strategy".to_string(),
    })?;

    let workspace = ctx.workspaces.create(&ctx.run_id, step).await?;
    ctx.record_workspace(step.id.clone(), workspace.clone());

    ctx.emit(ctx.step_event(step, StepState::Started));
    ctx.emit(ctx.step_event(step, StepState::MatrixStart));

    ctx.artifacts.inject(step, &workspace)?;

    let items = load_items(ctx, step, strategy, &workspace)?;
    ctx.emit(
        ctx.step_event(step, StepState::MatrixItemsLoaded)
            .with_message(format!("{} item(s)", items.len())),
    );

    if items.is_empty() {
        // Downstream steps still consume an aggregate with zero workers.
        let aggregate = aggregate_result(&[], 0);
        ctx.record_result(step.id.clone(), aggregate);
        ctx.emit(
            ctx.step_event(step, StepState::MatrixComplete)
                .with_message("0 workers".to_string()),
        );
        return finish(ctx, step, workspace, started_ms, 0);
    }

    let requested = strategy.max_concurrency.unwrap_or(items.len());
    let parallelism = items
        .len()
        .min(requested)
        .min(ctx.manifest.worker_cap())
        .max(1);
    tracing::info!(
        step = %step.id,
        items = items.len(),
        parallelism,
        "starting matrix fan-out"
    );

    let semaphore = Arc::new(Semaphore::new(parallelism));
    let mut join_set = JoinSet::new();
    for (index, item) in items.iter().enumerate() {
        let ctx = Arc::clone(ctx);
        let step = step.clone();
        let item = item.clone();
        let semaphore = Arc::clone(&semaphore);
        join_set.spawn(async move { run_worker(ctx, step, index, item, semaphore).await });
    }

    let mut outcomes: Vec<WorkerOutcome> = Vec::with_capacity(items.len());
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(join_err) => {
                return Err(EngineError::MatrixItems {
                    step: step.id.to_string(),
                    detail: format!("worker task panicked: {join_err}"),
                })
            }
        }
    }
    outcomes.sort_by_key(|o| o.index);

    let tokens_used: u64 = outcomes.iter().map(|o| o.tokens_used).sum();
    let success_count = outcomes.iter().filter(|o| o.error.is_none()).count();
    let aggregate = aggregate_result(&outcomes, items.len());
    ctx.record_result(step.id.clone(), aggregate);

    // Conflict detection across successful workers.
    if let Some((path, workers)) = detect_conflict(&outcomes) {
        ctx.emit(
            ctx.step_event(step, StepState::MatrixConflict)
                .with_message(format!("{path} modified by workers {workers:?}")),
        );
        return Err(EngineError::FileConflict {
            step: step.id.to_string(),
            path,
            workers,
        });
    }

    let failed: Vec<usize> = outcomes
        .iter()
        .filter(|o| o.error.is_some())
        .map(|o| o.index)
        .collect();
    if !failed.is_empty() {
        let named: Vec<String> = failed.iter().take(3).map(|i| i.to_string()).collect();
        let detail = format!(
            "workers [{}]{} failed",
            named.join(", "),
            if failed.len() > 3 { ", ..." } else { "" },
        );
        ctx.emit(
            ctx.step_event(step, StepState::MatrixFailed)
                .with_message(detail.clone()),
        );
        return Err(EngineError::MatrixPartialFailure {
            step: step.id.to_string(),
            failed: failed.len(),
            total: items.len(),
            detail,
        });
    }

    ctx.emit(
        ctx.step_event(step, StepState::MatrixComplete)
            .with_message(format!("{success_count} worker(s) completed"))
            .with_tokens(tokens_used),
    );
    finish(ctx, step, workspace, started_ms, tokens_used)
}

fn finish<C: Clock>(
    ctx: &Arc<RunContext<C>>,
    step: &Step,
    workspace: PathBuf,
    started_ms: u64,
    tokens_used: u64,
) -> Result<StepResult, EngineError> {
    let duration_ms = ctx.clock.epoch_ms().saturating_sub(started_ms);
    ctx.completed_steps
        .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    ctx.emit(
        ctx.step_event(step, StepState::Completed)
            .with_tokens(tokens_used)
            .with_duration_ms(duration_ms),
    );
    let outcomes = extract_outcomes(step, &workspace);
    Ok(StepResult {
        step_id: step.id.clone(),
        attempts: 1,
        tokens_used,
        duration_ms,
        workspace,
        artifacts: Vec::new(),
        outcomes,
        soft_failed: false,
    })
}

/// Read and slice the items document.
fn load_items<C: Clock>(
    ctx: &RunContext<C>,
    step: &Step,
    strategy: &wave_manifest::MatrixStrategy,
    workspace: &Path,
) -> Result<Vec<Value>, EngineError> {
    let template = template_context(ctx, step, workspace, None);
    let rendered = template.render(&strategy.items_source);
    let path = if Path::new(&rendered).is_absolute() {
        PathBuf::from(&rendered)
    } else {
        workspace.join(&rendered)
    };

    let items_err = |detail: String| EngineError::MatrixItems {
        step: step.id.to_string(),
        detail,
    };

    let text = std::fs::read_to_string(&path)
        .map_err(|e| items_err(format!("failed to read {}: {e}", path.display())))?;
    let doc: Value = serde_json::from_str(&text)
        .map_err(|e| items_err(format!("{} is not valid JSON: {e}", path.display())))?;

    let array = match &strategy.item_key {
        Some(key) => lookup_dot_path(&doc, key)
            .ok_or_else(|| items_err(format!("item_key {key} not found")))?,
        None => &doc,
    };
    match array {
        Value::Array(items) => Ok(items.clone()),
        _ => Err(items_err(format!(
            "items source is not a JSON array{}",
            strategy
                .item_key
                .as_deref()
                .map(|k| format!(" at {k}"))
                .unwrap_or_default()
        ))),
    }
}

async fn run_worker<C: Clock>(
    ctx: Arc<RunContext<C>>,
    step: Step,
    index: usize,
    item: Value,
    semaphore: Arc<Semaphore>,
) -> WorkerOutcome {
    // Closed only on abort; treat as a failed worker.
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return WorkerOutcome {
            index,
            workspace: PathBuf::new(),
            modified_files: Vec::new(),
            stdout: String::new(),
            tokens_used: 0,
            error: Some("worker slot unavailable".to_string()),
        };
    };

    ctx.emit(
        ctx.step_event(&step, StepState::MatrixWorkerStart)
            .with_message(format!("worker {index}")),
    );

    let result = execute_worker(&ctx, &step, index, &item).await;
    match result {
        Ok(outcome) => {
            ctx.emit(
                ctx.step_event(&step, StepState::MatrixWorkerComplete)
                    .with_message(format!("worker {index}"))
                    .with_tokens(outcome.tokens_used),
            );
            outcome
        }
        Err((workspace, err)) => {
            tracing::warn!(step = %step.id, worker = index, error = %err, "matrix worker failed");
            ctx.emit(
                ctx.step_event(&step, StepState::MatrixWorkerFailed)
                    .with_message(format!("worker {index}: {err}")),
            );
            WorkerOutcome {
                index,
                workspace,
                modified_files: Vec::new(),
                stdout: String::new(),
                tokens_used: 0,
                error: Some(err.to_string()),
            }
        }
    }
}

async fn execute_worker<C: Clock>(
    ctx: &Arc<RunContext<C>>,
    step: &Step,
    index: usize,
    item: &Value,
) -> Result<WorkerOutcome, (PathBuf, EngineError)> {
    let workspace = ctx
        .workspaces
        .create_worker(&ctx.run_id, &step.id, index)
        .map_err(|e| (PathBuf::new(), e.into()))?;
    let fail = |e: EngineError| (workspace.clone(), e);

    let injected = ctx
        .artifacts
        .inject(step, &workspace)
        .map_err(&fail)?;

    let task_json = item.to_string();
    let template = template_context(ctx, step, &workspace, Some(&task_json));
    let persona = ctx.persona(step).map_err(&fail)?;
    let adapter = ctx.adapter(&step.persona, persona).map_err(&fail)?;
    let prompt = build_prompt(
        step,
        persona,
        &template,
        &injected,
        &ctx.validator,
        &ctx.project_root,
        None,
    )
    .map_err(&fail)?;

    let result = dispatch(ctx, step, persona, adapter.as_ref(), prompt, &workspace)
        .await
        .map_err(&fail)?;
    ctx.add_tokens(result.tokens_used);

    materialize_outputs(step, &workspace, &result).map_err(&fail)?;

    let modified_files = walk_files(&workspace);
    Ok(WorkerOutcome {
        index,
        workspace,
        modified_files,
        stdout: result.stdout,
        tokens_used: result.tokens_used,
        error: None,
    })
}

/// Workspace-relative paths of every file a worker left behind, excluding
/// the engine's own `.wave/` tree.
fn walk_files(workspace: &Path) -> Vec<String> {
    let mut files = Vec::new();
    collect_files(workspace, workspace, &mut files);
    files.sort();
    files
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        if rel.starts_with(".wave") {
            continue;
        }
        if path.is_dir() {
            collect_files(root, &path, out);
        } else if path.is_file() {
            out.push(rel.display().to_string());
        }
    }
}

/// First relative path two or more successful workers both modified.
fn detect_conflict(outcomes: &[WorkerOutcome]) -> Option<(String, Vec<usize>)> {
    let mut writers: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for outcome in outcomes.iter().filter(|o| o.error.is_none()) {
        for file in &outcome.modified_files {
            writers.entry(file).or_default().push(outcome.index);
        }
    }
    writers
        .into_iter()
        .find(|(_, workers)| workers.len() > 1)
        .map(|(path, workers)| (path.to_string(), workers))
}

/// The step's published result dictionary.
fn aggregate_result(outcomes: &[WorkerOutcome], total: usize) -> Value {
    let worker_results: Vec<Value> = outcomes
        .iter()
        .map(|o| {
            json!({
                "index": o.index,
                "status": if o.error.is_none() { "completed" } else { "failed" },
                "stdout": o.stdout,
                "error": o.error,
                "tokens_used": o.tokens_used,
                "modified_files": o.modified_files,
                "workspace": o.workspace.display().to_string(),
            })
        })
        .collect();
    let worker_workspaces: Vec<String> = outcomes
        .iter()
        .map(|o| o.workspace.display().to_string())
        .collect();
    let success_count = outcomes.iter().filter(|o| o.error.is_none()).count();
    json!({
        "worker_results": worker_results,
        "worker_workspaces": worker_workspaces,
        "total_workers": total,
        "success_count": success_count,
        "fail_count": outcomes.len() - success_count,
    })
}

#[cfg(test)]
#[path = "matrix_tests.rs"]
mod tests;
