// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claude agent adapter
//!
//! Runs the `claude` CLI headless (`-p`), one invocation per step attempt.
//! The workspace directory becomes the process cwd, so a well-behaved CLI
//! writes artifacts where the engine expects them. Tool permissions are
//! forwarded as `--allowed-tools` / `--disallowed-tools`.

use super::{AdapterError, AgentAdapter, AgentRunRequest, AgentRunResult};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use uuid::Uuid;
use wave_manifest::MemoryStrategy;

/// Adapter that shells out to the `claude` CLI.
#[derive(Debug, Clone)]
pub struct ClaudeAdapter {
    /// Binary to invoke; override for claudeless-style stand-ins.
    command: String,
}

impl Default for ClaudeAdapter {
    fn default() -> Self {
        Self::new("claude")
    }
}

impl ClaudeAdapter {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Build the argument vector for one invocation.
    fn build_args(&self, request: &AgentRunRequest, session_id: &str) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            request.prompt.clone(),
            "--output-format".to_string(),
            "json".to_string(),
            "--session-id".to_string(),
            session_id.to_string(),
        ];
        if request.memory == MemoryStrategy::Continuation {
            args.push("--continue".to_string());
        }
        if !request.permissions.allow.is_empty() {
            args.push("--allowed-tools".to_string());
            args.extend(request.permissions.allow.iter().cloned());
        }
        if !request.permissions.deny.is_empty() {
            args.push("--disallowed-tools".to_string());
            args.extend(request.permissions.deny.iter().cloned());
        }
        args
    }
}

#[async_trait]
impl AgentAdapter for ClaudeAdapter {
    async fn run(&self, request: AgentRunRequest) -> Result<AgentRunResult, AdapterError> {
        let session_id = Uuid::new_v4().to_string();
        let args = self.build_args(&request, &session_id);

        tracing::debug!(
            step = %request.step_id,
            persona = %request.persona,
            workspace = %request.workspace_path.display(),
            "spawning claude"
        );

        let mut child = Command::new(&self.command)
            .args(&args)
            .current_dir(&request.workspace_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AdapterError::SpawnFailed(format!("{}: {}", self.command, e)))?;

        // Stream stdout/stderr while waiting; bail on timeout or cancel.
        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let read_both = async {
            let drain_out = async {
                if let Some(pipe) = stdout_pipe.as_mut() {
                    let _ = pipe.read_to_end(&mut stdout).await;
                }
            };
            let drain_err = async {
                if let Some(pipe) = stderr_pipe.as_mut() {
                    let _ = pipe.read_to_end(&mut stderr).await;
                }
            };
            tokio::join!(drain_out, drain_err);
            child.wait().await
        };

        let status = tokio::select! {
            status = read_both => {
                status.map_err(AdapterError::Io)?
            }
            _ = tokio::time::sleep(request.timeout) => {
                return Err(AdapterError::Timeout(request.timeout.as_secs()));
            }
            _ = request.cancel.cancelled() => {
                return Err(AdapterError::Cancelled);
            }
        };

        let stdout = String::from_utf8_lossy(&stdout).to_string();
        let code = status.code().unwrap_or(-1);
        if code != 0 {
            let stderr = String::from_utf8_lossy(&stderr).to_string();
            if stderr.contains("permission") {
                return Err(AdapterError::PermissionDenied(stderr));
            }
            return Err(AdapterError::NonZeroExit { code, stderr });
        }

        Ok(parse_result_envelope(&stdout, code))
    }
}

/// Parse claude's `--output-format json` envelope.
///
/// Missing or malformed envelopes degrade to the raw stdout; tokens default
/// to zero rather than failing the step.
fn parse_result_envelope(stdout: &str, exit_code: i32) -> AgentRunResult {
    let mut result = AgentRunResult {
        exit_code,
        stdout: stdout.to_string(),
        ..AgentRunResult::default()
    };

    let Ok(envelope) = serde_json::from_str::<Value>(stdout) else {
        return result;
    };

    if let Some(content) = envelope.get("result").and_then(Value::as_str) {
        result.result_content = Some(content.to_string());
    }
    if let Some(usage) = envelope.get("usage") {
        let input = usage.get("input_tokens").and_then(Value::as_u64).unwrap_or(0);
        let output = usage
            .get("output_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        result.tokens_used = input + output;
    }
    if let Some(files) = envelope.get("files_modified").and_then(Value::as_array) {
        result.artifacts_found = files
            .iter()
            .filter_map(Value::as_str)
            .map(PathBuf::from)
            .collect();
    }

    result
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
