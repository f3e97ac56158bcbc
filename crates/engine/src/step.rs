// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scalar step execution
//!
//! Sequence: acquire workspace (honoring `workspace.ref`), inject upstream
//! artifacts, render the prompt, dispatch to the adapter (or the shell for
//! command steps), materialize stdout artifacts, verify required outputs,
//! apply the contract. Contract failures retry up to the contract's bound
//! with the validation errors appended to the prompt; attempts share the
//! workspace, so later attempts may overwrite earlier outputs.

use crate::context::RunContext;
use crate::contract::ContractOutcome;
use crate::error::EngineError;
use crate::executor::StepResult;
use crate::outcomes::extract_outcomes;
use crate::prompt::{build_prompt, render_exec_source};
use crate::workspace::{WorkspaceError, WorkspaceManager};
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use uuid::Uuid;
use wave_adapters::subprocess::run_with_timeout;
use wave_adapters::{AdapterError, AgentRunRequest, AgentRunResult};
use wave_core::{Clock, StepState};
use wave_manifest::{ArtifactSource, ExecType, Step, TemplateContext};

/// Execute one scalar step to a terminal state.
pub(crate) async fn run_step<C: Clock>(
    ctx: &RunContext<C>,
    step: &Step,
) -> Result<StepResult, EngineError> {
    tracing::debug!(step = %step.id, persona = %step.persona, "starting step");
    let started_ms = ctx.clock.epoch_ms();

    let persona = ctx.persona(step)?;
    let adapter = ctx.adapter(&step.persona, persona)?;

    // Workspace: reuse the referenced step's path, or create our own.
    let workspace = match &step.workspace.step_ref {
        Some(referenced) => {
            let path = ctx.workspace_of(referenced).ok_or_else(|| {
                WorkspaceError::NotExist {
                    path: format!("workspace of referenced step {referenced}"),
                }
            })?;
            WorkspaceManager::validate(&path)?;
            path
        }
        None => ctx.workspaces.create(&ctx.run_id, step).await?,
    };
    ctx.record_workspace(step.id.clone(), workspace.clone());

    ctx.emit(ctx.step_event(step, StepState::Started));

    let injected = ctx.artifacts.inject(step, &workspace)?;

    let template = template_context(ctx, step, &workspace, None);
    let contract = step.contract();
    let max_retries = contract.map_or(0, |c| c.max_retries);
    let mut attempt: u32 = 0;
    let mut feedback: Option<String> = None;
    let mut tokens_used: u64 = 0;
    let mut soft_failed = false;
    let last_result: AgentRunResult;

    loop {
        attempt += 1;
        if attempt == 1 {
            ctx.emit(ctx.step_event(step, StepState::Running));
        }

        let result = match step.exec.exec_type {
            ExecType::Command => run_shell_step(ctx, step, &workspace, &template).await?,
            ExecType::Prompt | ExecType::SlashCommand => {
                let prompt = build_prompt(
                    step,
                    persona,
                    &template,
                    &injected,
                    &ctx.validator,
                    &ctx.project_root,
                    feedback.as_deref(),
                )?;
                dispatch(ctx, step, persona, adapter.as_ref(), prompt, &workspace).await?
            }
        };
        tokens_used += result.tokens_used;
        ctx.add_tokens(result.tokens_used);

        materialize_outputs(step, &workspace, &result)?;

        let Some(contract) = contract else {
            last_result = result;
            break;
        };

        let outcome = ctx.validator.validate(step, contract, &workspace).await?;
        match outcome {
            ContractOutcome::Pass => {
                ctx.emit(ctx.step_event(step, StepState::ContractPassed));
                last_result = result;
                break;
            }
            ContractOutcome::Fail { .. } if attempt <= max_retries => {
                let detail = outcome.detail();
                tracing::info!(attempt, error = %detail, "contract failed, retrying");
                ctx.emit(
                    ctx.step_event(step, StepState::Retrying)
                        .with_message(detail.clone()),
                );
                feedback = Some(detail);
            }
            ContractOutcome::Fail { .. } => {
                let detail = outcome.detail();
                if contract.must_pass {
                    ctx.emit(
                        ctx.step_event(step, StepState::ContractFailed)
                            .with_message(detail.clone()),
                    );
                    return Err(EngineError::ContractValidationFailed {
                        step: step.id.to_string(),
                        attempts: attempt,
                        detail,
                    });
                }
                ctx.emit(
                    ctx.step_event(step, StepState::ContractSoftFailure)
                        .with_message(detail),
                );
                soft_failed = true;
                last_result = result;
                break;
            }
        }
    }

    let artifacts = register_outputs(ctx, step, &workspace);
    let outcomes = extract_outcomes(step, &workspace);
    ctx.record_result(
        step.id.clone(),
        json!({
            "stdout": last_result.stdout,
            "exit_code": last_result.exit_code,
            "tokens_used": tokens_used,
            "attempts": attempt,
        }),
    );

    let duration_ms = ctx.clock.epoch_ms().saturating_sub(started_ms);
    ctx.completed_steps
        .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    ctx.emit(
        ctx.step_event(step, StepState::Completed)
            .with_tokens(tokens_used)
            .with_duration_ms(duration_ms),
    );

    Ok(StepResult {
        step_id: step.id.clone(),
        attempts: attempt,
        tokens_used,
        duration_ms,
        workspace,
        artifacts,
        outcomes,
        soft_failed,
    })
}

/// Build the substitution context for a step.
///
/// `task` is the matrix item JSON for workers; scalar steps see the run
/// input under both names.
pub(crate) fn template_context<C: Clock>(
    ctx: &RunContext<C>,
    step: &Step,
    workspace: &Path,
    task: Option<&str>,
) -> TemplateContext {
    let mut template = TemplateContext::new();
    template.set("input", ctx.input.clone());
    template.set("task", task.unwrap_or(&ctx.input));
    template.set_pipeline_context("pipeline", ctx.pipeline_name.clone());
    template.set_pipeline_context("run_id", ctx.run_id.to_string());
    template.set_pipeline_context("step_id", step.id.to_string());
    template.set_pipeline_context("workspace", workspace.display().to_string());
    template.set_pipeline_context("project_root", ctx.project_root.display().to_string());
    template
}

/// One adapter invocation with the engine-enforced timeout.
pub(crate) async fn dispatch<C: Clock>(
    ctx: &RunContext<C>,
    step: &Step,
    persona: &wave_manifest::PersonaDef,
    adapter: &dyn wave_adapters::AgentAdapter,
    prompt: String,
    workspace: &Path,
) -> Result<AgentRunResult, EngineError> {
    let timeout = ctx.timeout_for(step);
    let request = AgentRunRequest {
        invocation_id: Uuid::new_v4().to_string(),
        run_id: ctx.run_id.clone(),
        step_id: step.id.clone(),
        persona: step.persona.clone(),
        prompt,
        workspace_path: workspace.to_path_buf(),
        permissions: persona.permissions.clone(),
        memory: step.memory.strategy,
        timeout,
        cancel: ctx.cancel.clone(),
    };
    match tokio::time::timeout(timeout, adapter.run(request)).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(source)) => Err(EngineError::Adapter {
            step: step.id.to_string(),
            source,
        }),
        Err(_elapsed) => Err(EngineError::Adapter {
            step: step.id.to_string(),
            source: AdapterError::Timeout(timeout.as_secs()),
        }),
    }
}

/// Run a `type: command` step through the shell.
async fn run_shell_step<C: Clock>(
    ctx: &RunContext<C>,
    step: &Step,
    workspace: &Path,
    template: &TemplateContext,
) -> Result<AgentRunResult, EngineError> {
    let script = render_exec_source(step, &ctx.project_root, template)?;
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(&script).current_dir(workspace);
    let output = run_with_timeout(cmd, ctx.timeout_for(step), "step command")
        .await
        .map_err(|detail| EngineError::Adapter {
            step: step.id.to_string(),
            source: AdapterError::SpawnFailed(detail),
        })?;
    let code = output.status.code().unwrap_or(-1);
    if code != 0 {
        return Err(EngineError::Adapter {
            step: step.id.to_string(),
            source: AdapterError::NonZeroExit {
                code,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            },
        });
    }
    Ok(AgentRunResult {
        exit_code: code,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        ..AgentRunResult::default()
    })
}

/// Write stdout-sourced artifacts and verify required outputs exist.
pub(crate) fn materialize_outputs(
    step: &Step,
    workspace: &Path,
    result: &AgentRunResult,
) -> Result<(), EngineError> {
    for artifact in &step.output_artifacts {
        let path = workspace.join(&artifact.path);
        if artifact.source == ArtifactSource::Stdout {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| EngineError::RequiredOutputMissing {
                    step: step.id.to_string(),
                    artifact: artifact.name.clone(),
                    path: format!("{} ({e})", path.display()),
                })?;
            }
            std::fs::write(&path, &result.stdout).map_err(|e| {
                EngineError::RequiredOutputMissing {
                    step: step.id.to_string(),
                    artifact: artifact.name.clone(),
                    path: format!("{} ({e})", path.display()),
                }
            })?;
        }
        if artifact.required && !path.is_file() {
            return Err(EngineError::RequiredOutputMissing {
                step: step.id.to_string(),
                artifact: artifact.name.clone(),
                path: path.display().to_string(),
            });
        }
    }
    Ok(())
}

/// Register produced artifacts in the run registry and state store.
fn register_outputs<C: Clock>(
    ctx: &RunContext<C>,
    step: &Step,
    workspace: &Path,
) -> Vec<(String, PathBuf)> {
    let mut registered = Vec::new();
    for artifact in &step.output_artifacts {
        let path = workspace.join(&artifact.path);
        if !path.is_file() {
            continue;
        }
        ctx.artifacts
            .register_output(step.id.clone(), artifact.name.clone(), path.clone());
        if let Some(store) = &ctx.store {
            let row = wave_storage::ArtifactRow {
                run_id: ctx.run_id.clone(),
                step_id: step.id.clone(),
                name: artifact.name.clone(),
                path: path.clone(),
                registered_at: chrono::Utc::now(),
            };
            if let Err(err) = store.record_artifact(row) {
                tracing::warn!(error = %err, "state store rejected artifact");
            }
        }
        registered.push((artifact.name.clone(), path));
    }
    registered
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
