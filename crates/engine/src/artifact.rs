// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact registry and handover
//!
//! Artifacts are identified globally by `(step, name)` and logically owned
//! by the producing step. Consumers receive copies under their own
//! `.wave/artifacts/` directory, never shared mutable references.

use crate::error::EngineError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use wave_core::StepId;
use wave_manifest::Step;

/// Directory injected artifacts land in, relative to the consumer workspace.
pub const ARTIFACT_DIR: &str = ".wave/artifacts";

/// An artifact copied into a consuming step's workspace.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectedArtifact {
    pub local_name: String,
    pub path: PathBuf,
    pub source_step: StepId,
    pub artifact_name: String,
}

/// Maps `(step, artifact-name)` to the absolute path of the produced file.
#[derive(Default)]
pub struct ArtifactRegistry {
    paths: Mutex<HashMap<(StepId, String), PathBuf>>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an artifact after its producing step completed.
    pub fn register_output(&self, step_id: StepId, name: impl Into<String>, path: PathBuf) {
        self.paths.lock().insert((step_id, name.into()), path);
    }

    /// Look up the absolute path of a produced artifact.
    pub fn resolve_path(&self, step_id: &StepId, name: &str) -> Option<PathBuf> {
        self.paths
            .lock()
            .get(&(step_id.clone(), name.to_string()))
            .cloned()
    }

    /// Number of registered artifacts.
    pub fn len(&self) -> usize {
        self.paths.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.lock().is_empty()
    }

    /// Copy each of the consumer's declared injections into
    /// `<workspace>/.wave/artifacts/<local_name>`.
    ///
    /// An `optional` injection whose source is unregistered or deleted is
    /// skipped silently; a required one fails the consuming step.
    pub fn inject(
        &self,
        step: &Step,
        workspace: &Path,
    ) -> Result<Vec<InjectedArtifact>, EngineError> {
        let mut injected = Vec::new();
        for entry in &step.memory.inject_artifacts {
            let missing = || EngineError::ArtifactMissing {
                step: step.id.to_string(),
                source_step: entry.source_step.to_string(),
                artifact: entry.artifact_name.clone(),
            };

            let source = match self.resolve_path(&entry.source_step, &entry.artifact_name) {
                Some(path) if path.is_file() => path,
                _ if entry.optional => {
                    tracing::debug!(
                        step = %step.id,
                        source = %entry.source_step,
                        artifact = %entry.artifact_name,
                        "skipping optional artifact with missing source"
                    );
                    continue;
                }
                _ => return Err(missing()),
            };

            let local = sanitize_local_name(&entry.local_name).ok_or_else(|| {
                EngineError::ArtifactMissing {
                    step: step.id.to_string(),
                    source_step: entry.source_step.to_string(),
                    artifact: format!("{} (invalid local name)", entry.local_name),
                }
            })?;

            let dest = workspace.join(ARTIFACT_DIR).join(&local);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent).map_err(|e| copy_error(step, entry, e))?;
            }
            std::fs::copy(&source, &dest).map_err(|e| copy_error(step, entry, e))?;

            tracing::debug!(
                step = %step.id,
                source = %source.display(),
                dest = %dest.display(),
                "injected artifact"
            );
            injected.push(InjectedArtifact {
                local_name: entry.local_name.clone(),
                path: dest,
                source_step: entry.source_step.clone(),
                artifact_name: entry.artifact_name.clone(),
            });
        }
        Ok(injected)
    }
}

fn copy_error(
    step: &Step,
    entry: &wave_manifest::InjectArtifact,
    err: std::io::Error,
) -> EngineError {
    EngineError::ArtifactMissing {
        step: step.id.to_string(),
        source_step: entry.source_step.to_string(),
        artifact: format!("{} (copy failed: {err})", entry.artifact_name),
    }
}

/// Reject local names that would escape the artifact directory.
fn sanitize_local_name(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    if path.is_absolute() {
        return None;
    }
    if path
        .components()
        .any(|c| !matches!(c, std::path::Component::Normal(_)))
    {
        return None;
    }
    Some(path.to_path_buf())
}

#[cfg(test)]
#[path = "artifact_tests.rs"]
mod tests;
