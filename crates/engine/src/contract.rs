// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output contract validation
//!
//! Contracts are either a JSON schema (inline or an approved file) applied
//! to a target artifact, or a shell command whose zero exit is a pass. The
//! validator is pure given its inputs: it reads files and runs the declared
//! command but never mutates engine state.

use crate::error::EngineError;
use crate::sanitize::approve_schema_path;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use wave_adapters::subprocess::{run_with_timeout, CONTRACT_COMMAND_TIMEOUT};
use wave_manifest::{ContractConfig, ContractKind, Step};

/// Result of applying a contract.
#[derive(Debug, Clone, PartialEq)]
pub enum ContractOutcome {
    Pass,
    Fail { errors: Vec<String> },
}

impl ContractOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, ContractOutcome::Pass)
    }

    /// Flattened error text for retry-feedback prompts and events.
    pub fn detail(&self) -> String {
        match self {
            ContractOutcome::Pass => String::new(),
            ContractOutcome::Fail { errors } => errors.join("; "),
        }
    }
}

/// Applies step contracts.
#[derive(Debug, Clone)]
pub struct ContractValidator {
    approved_schema_dirs: Vec<PathBuf>,
    project_root: PathBuf,
}

impl ContractValidator {
    pub fn new(approved_schema_dirs: Vec<PathBuf>, project_root: PathBuf) -> Self {
        Self {
            approved_schema_dirs,
            project_root,
        }
    }

    /// Apply `contract` to the step's output in `workspace`.
    pub async fn validate(
        &self,
        step: &Step,
        contract: &ContractConfig,
        workspace: &Path,
    ) -> Result<ContractOutcome, EngineError> {
        match contract.kind {
            ContractKind::JsonSchema => self.validate_schema(step, contract, workspace),
            ContractKind::Command => self.validate_command(step, contract, workspace).await,
        }
    }

    /// The artifact a schema contract validates: `contract.source` override,
    /// else the first declared output artifact.
    pub fn target_path(
        step: &Step,
        contract: &ContractConfig,
        workspace: &Path,
    ) -> Result<PathBuf, EngineError> {
        let relative = match &contract.source {
            Some(source) => PathBuf::from(source),
            None => step
                .output_artifacts
                .first()
                .map(|a| a.path.clone())
                .ok_or_else(|| EngineError::Contract {
                    step: step.id.to_string(),
                    detail: "contract has no target: no source and no output artifacts"
                        .to_string(),
                })?,
        };
        Ok(workspace.join(relative))
    }

    /// Schema text for validation and for the contract prompt: inline wins,
    /// otherwise the schema file is read through the approved-path check.
    pub fn schema_text(
        &self,
        step: &Step,
        contract: &ContractConfig,
    ) -> Result<Option<String>, EngineError> {
        if let Some(inline) = &contract.schema {
            return Ok(Some(inline.clone()));
        }
        let Some(file) = &contract.schema_file else {
            return Ok(None);
        };
        let path = approve_schema_path(file, &self.approved_schema_dirs).map_err(|e| {
            EngineError::Contract {
                step: step.id.to_string(),
                detail: e.to_string(),
            }
        })?;
        let text = std::fs::read_to_string(&path).map_err(|e| EngineError::Contract {
            step: step.id.to_string(),
            detail: format!("failed to read schema {}: {e}", path.display()),
        })?;
        Ok(Some(text))
    }

    fn validate_schema(
        &self,
        step: &Step,
        contract: &ContractConfig,
        workspace: &Path,
    ) -> Result<ContractOutcome, EngineError> {
        let schema_text =
            self.schema_text(step, contract)?
                .ok_or_else(|| EngineError::Contract {
                    step: step.id.to_string(),
                    detail: "json_schema contract without schema".to_string(),
                })?;
        let schema: Value =
            serde_json::from_str(&schema_text).map_err(|e| EngineError::Contract {
                step: step.id.to_string(),
                detail: format!("schema is not valid JSON: {e}"),
            })?;
        let validator = jsonschema::validator_for(&schema).map_err(|e| EngineError::Contract {
            step: step.id.to_string(),
            detail: format!("schema is not a valid JSON schema: {e}"),
        })?;

        let target = Self::target_path(step, contract, workspace)?;
        let text = match std::fs::read_to_string(&target) {
            Ok(text) => text,
            Err(e) => {
                return Ok(ContractOutcome::Fail {
                    errors: vec![format!(
                        "target {} unreadable: {e}",
                        target.display()
                    )],
                })
            }
        };
        let instance: Value = match serde_json::from_str(&text) {
            Ok(instance) => instance,
            Err(e) => {
                return Ok(ContractOutcome::Fail {
                    errors: vec![format!("target is not valid JSON: {e}")],
                })
            }
        };

        let errors: Vec<String> = validator
            .iter_errors(&instance)
            .map(|err| format!("{} (at {})", err, err.instance_path))
            .collect();
        if errors.is_empty() {
            Ok(ContractOutcome::Pass)
        } else {
            Ok(ContractOutcome::Fail { errors })
        }
    }

    async fn validate_command(
        &self,
        step: &Step,
        contract: &ContractConfig,
        workspace: &Path,
    ) -> Result<ContractOutcome, EngineError> {
        let command = contract
            .command
            .as_deref()
            .ok_or_else(|| EngineError::Contract {
                step: step.id.to_string(),
                detail: "command contract without command".to_string(),
            })?;

        let cwd = match contract.dir.as_deref() {
            None => workspace.to_path_buf(),
            Some("project_root") => self.project_root.clone(),
            Some(dir) if Path::new(dir).is_absolute() => PathBuf::from(dir),
            Some(dir) => workspace.join(dir),
        };

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command).current_dir(&cwd);
        let output = run_with_timeout(cmd, CONTRACT_COMMAND_TIMEOUT, "contract command")
            .await
            .map_err(|detail| EngineError::Contract {
                step: step.id.to_string(),
                detail,
            })?;

        if output.status.success() {
            Ok(ContractOutcome::Pass)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr.lines().rev().take(5).collect::<Vec<_>>().join("\n");
            Ok(ContractOutcome::Fail {
                errors: vec![format!(
                    "command exited with {}: {}",
                    output.status.code().unwrap_or(-1),
                    tail
                )],
            })
        }
    }
}

#[cfg(test)]
#[path = "contract_tests.rs"]
mod tests;
