// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline definitions
//!
//! A pipeline is an ordered sequence of steps forming a DAG through explicit
//! `dependencies` edges. Declaration order is semantic: it breaks ties in the
//! topological sort and orders cascade reports, so steps live in a `Vec`,
//! never a map.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use wave_core::StepId;

/// A multi-step pipeline definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<Step>,
}

impl Pipeline {
    /// Look up a step by ID.
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Declaration-order index of a step.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }
}

/// A single node in the pipeline DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique within the pipeline.
    pub id: StepId,
    /// Persona from the manifest; selects permissions and prompt prelude.
    pub persona: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Upstream step IDs; all must exist in the pipeline.
    #[serde(default)]
    pub dependencies: Vec<StepId>,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    pub exec: ExecConfig,
    #[serde(default)]
    pub output_artifacts: Vec<OutputArtifact>,
    #[serde(default)]
    pub handover: HandoverConfig,
    /// Present on fan-out steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<MatrixStrategy>,
    /// Declarative extractions from a JSON artifact for end-of-run reporting.
    #[serde(default)]
    pub outcomes: Vec<OutcomeSpec>,
    /// Per-step timeout override in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_min: Option<u64>,
}

impl Step {
    /// The step's output contract, if one is declared.
    pub fn contract(&self) -> Option<&ContractConfig> {
        self.handover.contract.as_ref()
    }

    /// True when the step carries a matrix fan-out strategy.
    pub fn is_matrix(&self) -> bool {
        self.strategy.is_some()
    }

    /// Output artifacts declared `required`.
    pub fn required_outputs(&self) -> impl Iterator<Item = &OutputArtifact> {
        self.output_artifacts.iter().filter(|a| a.required)
    }

    /// Find a declared output artifact by name.
    pub fn output(&self, name: &str) -> Option<&OutputArtifact> {
        self.output_artifacts.iter().find(|a| a.name == name)
    }
}

/// Memory configuration: conversational state strategy plus artifact injection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub strategy: MemoryStrategy,
    #[serde(default)]
    pub inject_artifacts: Vec<InjectArtifact>,
}

/// Whether prior conversational state is carried into the adapter invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryStrategy {
    #[default]
    Fresh,
    Continuation,
}

/// One artifact handover entry: copy an upstream artifact into the consuming
/// step's workspace under `./.wave/artifacts/<local_name>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectArtifact {
    pub source_step: StepId,
    pub artifact_name: String,
    pub local_name: String,
    /// A missing optional source is skipped silently; a missing required
    /// source fails the consuming step.
    #[serde(default)]
    pub optional: bool,
}

/// Workspace shape for a step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default, rename = "type")]
    pub kind: WorkspaceKind,
    /// Branch the worktree is created from (worktree kind only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    /// Reuse another step's workspace instead of creating one.
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub step_ref: Option<StepId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceKind {
    /// Fresh directory under the workspace root.
    #[default]
    Directory,
    /// Isolated version-controlled working copy branched from `base`.
    Worktree,
}

/// What a step dispatches: a persona prompt, a shell command, or a slash
/// command forwarded to the adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecConfig {
    #[serde(rename = "type")]
    pub exec_type: ExecType,
    /// Inline source text; `{{ input }}`, `{{ task }}` and pipeline-context
    /// placeholders are substituted before dispatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// File reference, read relative to the project root when `source` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecType {
    Prompt,
    Command,
    SlashCommand,
}

/// A named output produced by a step, resolved relative to its workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputArtifact {
    pub name: String,
    pub path: PathBuf,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub source: ArtifactSource,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactSource {
    /// Written by the adapter into the workspace.
    #[default]
    File,
    /// Captured from the adapter's standard output and written to `path`.
    Stdout,
}

/// Handover configuration: the step's output contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoverConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<ContractConfig>,
}

/// Output validation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractConfig {
    #[serde(rename = "type")]
    pub kind: ContractKind,
    /// Inline JSON schema (json_schema kind).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Schema file path; must resolve under an approved directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_file: Option<PathBuf>,
    /// Shell command (command kind); exit zero is pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Working directory for command contracts: the step workspace by
    /// default, `project_root`, or an absolute path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    /// Validation target override; default is the first declared output artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Hard failure fails the step after retries; soft failure continues.
    #[serde(default = "default_true")]
    pub must_pass: bool,
    /// Bound on validation-failure retries.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    JsonSchema,
    Command,
}

/// Fan-out strategy: one worker per item of a JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixStrategy {
    #[serde(rename = "type")]
    pub strategy_type: StrategyType,
    /// JSON file holding the item list, resolved against the step workspace.
    pub items_source: String,
    /// Dot-path to a nested array within the items document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_key: Option<String>,
    /// Requested parallelism; capped by the manifest's worker limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    Matrix,
}

/// Declarative extraction of a value from a JSON artifact for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSpec {
    pub name: String,
    /// Name of the declared output artifact to read.
    pub artifact: String,
    /// Dot-path into the artifact's JSON document.
    pub path: String,
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    2
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
