// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! YAML loaders for pipeline and manifest documents
//!
//! Structural invariants that do not require the full DAG walk are enforced
//! here at parse time: step IDs unique within the pipeline, artifact names
//! unique within a step, inject entries naming non-empty local names, and
//! exec blocks carrying a source. Dependency existence and cycle detection
//! belong to the engine's DAG validator.

use crate::manifest::Manifest;
use crate::pipeline::{ContractKind, ExecType, Pipeline};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Errors from loading or validating definition documents.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {location}: {source}")]
    Parse {
        location: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid pipeline {pipeline}: {message}")]
    Invalid { pipeline: String, message: String },
}

/// Load a pipeline definition from a YAML file.
pub fn load_pipeline(path: &Path) -> Result<Pipeline, ManifestError> {
    let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_pipeline(&text).map_err(|e| locate(e, path))
}

/// Parse a pipeline definition from YAML text.
pub fn parse_pipeline(text: &str) -> Result<Pipeline, ManifestError> {
    let pipeline: Pipeline =
        serde_yaml::from_str(text).map_err(|source| ManifestError::Parse {
            location: "pipeline".to_string(),
            source,
        })?;
    validate_pipeline(&pipeline)?;
    Ok(pipeline)
}

/// Load a persona manifest from a YAML file.
pub fn load_manifest(path: &Path) -> Result<Manifest, ManifestError> {
    let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_manifest(&text).map_err(|e| locate(e, path))
}

/// Parse a persona manifest from YAML text.
pub fn parse_manifest(text: &str) -> Result<Manifest, ManifestError> {
    serde_yaml::from_str(text).map_err(|source| ManifestError::Parse {
        location: "manifest".to_string(),
        source,
    })
}

fn locate(err: ManifestError, path: &Path) -> ManifestError {
    match err {
        ManifestError::Parse { source, .. } => ManifestError::Parse {
            location: path.display().to_string(),
            source,
        },
        other => other,
    }
}

fn validate_pipeline(pipeline: &Pipeline) -> Result<(), ManifestError> {
    let invalid = |message: String| ManifestError::Invalid {
        pipeline: pipeline.name.clone(),
        message,
    };

    if pipeline.steps.is_empty() {
        return Err(invalid("pipeline has no steps".to_string()));
    }

    let mut seen_ids = HashSet::new();
    for step in &pipeline.steps {
        if step.id.as_str().is_empty() {
            return Err(invalid("step with empty id".to_string()));
        }
        if !seen_ids.insert(step.id.clone()) {
            return Err(invalid(format!("duplicate step id: {}", step.id)));
        }

        // Artifact names are unique within a step
        let mut seen_artifacts = HashSet::new();
        for artifact in &step.output_artifacts {
            if !seen_artifacts.insert(artifact.name.as_str()) {
                return Err(invalid(format!(
                    "step {}: duplicate artifact name: {}",
                    step.id, artifact.name
                )));
            }
        }

        for inject in &step.memory.inject_artifacts {
            if inject.local_name.is_empty() {
                return Err(invalid(format!(
                    "step {}: inject of {}:{} has empty local_name",
                    step.id, inject.source_step, inject.artifact_name
                )));
            }
        }

        if step.exec.source.is_none() && step.exec.file.is_none() {
            return Err(invalid(format!(
                "step {}: exec has neither source nor file",
                step.id
            )));
        }
        if step.exec.exec_type == ExecType::Command && step.exec.source.is_none() {
            return Err(invalid(format!(
                "step {}: command exec requires an inline source",
                step.id
            )));
        }

        if let Some(contract) = step.contract() {
            match contract.kind {
                ContractKind::JsonSchema => {
                    if contract.schema.is_none() && contract.schema_file.is_none() {
                        return Err(invalid(format!(
                            "step {}: json_schema contract has neither schema nor schema_file",
                            step.id
                        )));
                    }
                }
                ContractKind::Command => {
                    if contract.command.is_none() {
                        return Err(invalid(format!(
                            "step {}: command contract has no command",
                            step.id
                        )));
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
