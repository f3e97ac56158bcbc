// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cascade staleness detection
//!
//! Given a modified step, compute the downstream closure over the artifact
//! injection graph, in declaration order. With mtime verification on, a
//! consumer whose workspace is strictly newer than every affected source
//! workspace is dropped (it was already re-run); missing workspaces count
//! as stale. Dropping a consumer also clears its own downstream influence,
//! so an up-to-date middle step shields its consumers.

use crate::workspace::WorkspaceManager;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use wave_core::StepId;
use wave_manifest::Pipeline;

/// Options for a cascade scan.
#[derive(Debug, Clone, Default)]
pub struct CascadeOptions {
    /// Drop consumers whose workspaces are newer than every affected source.
    pub verify_mtime: bool,
}

/// One stale downstream step.
#[derive(Debug, Clone, PartialEq)]
pub struct StaleStep {
    pub step_id: StepId,
    /// True when the step injects directly from the modified step.
    pub direct: bool,
    /// Human-readable reason (direct vs transitive).
    pub reason: String,
    /// Affected artifact keys, `<source>:<name>`.
    pub artifacts: Vec<String>,
}

/// Result of a cascade scan.
#[derive(Debug, Clone)]
pub struct CascadeReport {
    pub modified: StepId,
    /// Stale steps in declaration order; never contains the modified step.
    pub stale: Vec<StaleStep>,
}

impl CascadeReport {
    pub fn stale_ids(&self) -> Vec<&str> {
        self.stale.iter().map(|s| s.step_id.as_str()).collect()
    }

    /// Render the user-facing report, ending with a re-run recommendation.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "cascade from modified step {}:", self.modified);
        if self.stale.is_empty() {
            out.push_str("  no downstream steps are stale\n");
            return out;
        }
        for stale in &self.stale {
            let _ = writeln!(
                out,
                "  {} - {} (affected: {})",
                stale.step_id,
                stale.reason,
                stale.artifacts.join(", ")
            );
        }
        let _ = write!(
            out,
            "re-run recommendation: wave resume <pipeline> --from {}",
            self.stale[0].step_id
        );
        out
    }
}

/// Compute the stale set downstream of `modified`.
///
/// `run_workspaces` maps a step to its most recent workspace directory
/// (used only when `verify_mtime` is set; steps without an entry count as
/// missing, which keeps them stale).
pub fn detect_cascade(
    pipeline: &Pipeline,
    modified: &StepId,
    run_workspaces: &HashMap<StepId, PathBuf>,
    opts: &CascadeOptions,
) -> Result<CascadeReport, crate::error::EngineError> {
    if pipeline.step(modified.as_str()).is_none() {
        return Err(crate::error::EngineError::StepNotFound {
            pipeline: pipeline.name.clone(),
            step: modified.to_string(),
        });
    }

    let mut stale_set: HashSet<&str> = HashSet::new();
    stale_set.insert(modified.as_str());
    let mut stale = Vec::new();

    // Declaration order is also a topological-enough order for injection
    // edges: a consumer declared before its source would never have run, so
    // the walk matches how the pipeline actually executes.
    for step in &pipeline.steps {
        if step.id == *modified {
            continue;
        }
        let affected: Vec<&wave_manifest::InjectArtifact> = step
            .memory
            .inject_artifacts
            .iter()
            .filter(|inject| stale_set.contains(inject.source_step.as_str()))
            .collect();
        if affected.is_empty() {
            continue;
        }

        if opts.verify_mtime && consumer_is_fresh(step, &affected, run_workspaces) {
            continue;
        }

        let direct = affected
            .iter()
            .any(|inject| inject.source_step == *modified);
        let artifacts: Vec<String> = affected
            .iter()
            .map(|inject| format!("{}:{}", inject.source_step, inject.artifact_name))
            .collect();
        let reason = if direct {
            format!("injects artifacts from modified step {modified}")
        } else {
            let sources: Vec<&str> = affected
                .iter()
                .map(|inject| inject.source_step.as_str())
                .collect();
            format!("transitively stale via {}", sources.join(", "))
        };

        stale_set.insert(step.id.as_str());
        stale.push(StaleStep {
            step_id: step.id.clone(),
            direct,
            reason,
            artifacts,
        });
    }

    Ok(CascadeReport {
        modified: modified.clone(),
        stale,
    })
}

/// A consumer is fresh when its workspace mtime strictly exceeds every
/// affected source workspace's mtime. Missing workspaces are never fresh.
fn consumer_is_fresh(
    step: &wave_manifest::Step,
    affected: &[&wave_manifest::InjectArtifact],
    run_workspaces: &HashMap<StepId, PathBuf>,
) -> bool {
    let Some(consumer_mtime) = run_workspaces
        .get(&step.id)
        .and_then(|path| max_mtime(path))
    else {
        return false;
    };
    affected.iter().all(|inject| {
        match run_workspaces
            .get(&inject.source_step)
            .and_then(|path| max_mtime(path))
        {
            Some(source_mtime) => consumer_mtime > source_mtime,
            // Missing source: cannot prove freshness.
            None => false,
        }
    })
}

/// Deepest modification time under a directory tree.
pub(crate) fn max_mtime(path: &Path) -> Option<SystemTime> {
    let meta = std::fs::metadata(path).ok()?;
    let mut newest = meta.modified().ok()?;
    if meta.is_dir() {
        for entry in std::fs::read_dir(path).ok()?.flatten() {
            if let Some(child) = max_mtime(&entry.path()) {
                newest = newest.max(child);
            }
        }
    }
    Some(newest)
}

/// Build the step-to-workspace map from the most recent prior run that
/// contains each step. Direct `<stepId>` directories win over worktrees.
pub fn latest_workspaces(
    workspaces: &WorkspaceManager,
    pipeline: &Pipeline,
) -> HashMap<StepId, PathBuf> {
    let run_roots = workspaces.prior_run_roots(&pipeline.name);
    let mut map = HashMap::new();
    for step in &pipeline.steps {
        let found = run_roots.iter().find_map(|root| {
            WorkspaceManager::step_dir_candidates(root, &step.id)
                .into_iter()
                .next()
        });
        if let Some(dir) = found {
            map.insert(step.id.clone(), dir);
        }
    }
    map
}

#[cfg(test)]
#[path = "cascade_tests.rs"]
mod tests;
