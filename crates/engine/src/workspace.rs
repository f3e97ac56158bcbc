// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step workspace lifecycle
//!
//! Layout: `<root>/<RunId>/<stepId>/` for directory steps, matrix workers
//! under `<stepId>/worker_<i>/`, and worktree steps at `<root>/<RunId>/
//! __wt_<RunId>/`. Workspaces are never reused across runs and survive the
//! process for inspection; deletion is an external operation.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use wave_adapters::subprocess::{run_with_timeout, GIT_WORKTREE_TIMEOUT};
use wave_core::{RunId, StepId};
use wave_manifest::{Step, WorkspaceKind};

/// Workspace failures. Disk exhaustion is its own kind so the executor can
/// stop early without retry.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("workspace does not exist: {path}")]
    NotExist { path: String },
    #[error("workspace is not a directory: {path}")]
    NotADirectory { path: String },
    #[error("workspace permission denied during {op}: {path}")]
    Permission { op: String, path: String },
    #[error("disk space exhausted at {path}")]
    DiskSpaceExhausted { path: String },
    #[error("worktree setup failed: {detail}")]
    Worktree { detail: String },
    #[error("workspace io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// ENOSPC on unix; message probe as a fallback for exotic platforms.
fn is_disk_full(err: &std::io::Error) -> bool {
    if err.raw_os_error() == Some(28) {
        return true;
    }
    err.to_string().contains("No space left on device")
}

fn classify_io(op: &str, path: &Path, err: std::io::Error) -> WorkspaceError {
    if is_disk_full(&err) {
        WorkspaceError::DiskSpaceExhausted {
            path: path.display().to_string(),
        }
    } else if err.kind() == std::io::ErrorKind::PermissionDenied {
        WorkspaceError::Permission {
            op: op.to_string(),
            path: path.display().to_string(),
        }
    } else {
        WorkspaceError::Io {
            path: path.display().to_string(),
            source: err,
        }
    }
}

/// Creates, locates, and validates step workspaces under a root tree.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    /// Repository that worktree-type steps branch from.
    project_root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            project_root: project_root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<run>`
    pub fn run_root(&self, run_id: &RunId) -> PathBuf {
        self.root.join(run_id.as_str())
    }

    /// `<root>/<run>/<step>` (directory steps).
    pub fn step_path(&self, run_id: &RunId, step_id: &StepId) -> PathBuf {
        self.run_root(run_id).join(step_id.as_str())
    }

    /// `<root>/<run>/__wt_<run>` (worktree steps).
    pub fn worktree_path(&self, run_id: &RunId) -> PathBuf {
        self.run_root(run_id).join(format!("__wt_{}", run_id))
    }

    /// `<root>/<run>/<step>/worker_<i>` (matrix workers).
    pub fn worker_path(&self, run_id: &RunId, step_id: &StepId, index: usize) -> PathBuf {
        self.step_path(run_id, step_id).join(format!("worker_{index}"))
    }

    /// Create the workspace for a step and return its absolute path.
    ///
    /// Directory steps get a fresh 0755 directory; worktree steps get an
    /// isolated working copy branched from the step's `base`.
    pub async fn create(&self, run_id: &RunId, step: &Step) -> Result<PathBuf, WorkspaceError> {
        match step.workspace.kind {
            WorkspaceKind::Directory => {
                let path = self.step_path(run_id, &step.id);
                self.ensure_dir(&path)?;
                Ok(path)
            }
            WorkspaceKind::Worktree => {
                let path = self.worktree_path(run_id);
                if path.is_dir() {
                    // Another worktree step of this run already materialized it.
                    return Ok(path);
                }
                self.ensure_dir(&self.run_root(run_id))?;
                let base = step.workspace.base.as_deref().unwrap_or("HEAD");
                self.add_worktree(run_id, &path, base).await?;
                Ok(path)
            }
        }
    }

    /// Create a matrix worker workspace.
    pub fn create_worker(
        &self,
        run_id: &RunId,
        step_id: &StepId,
        index: usize,
    ) -> Result<PathBuf, WorkspaceError> {
        let path = self.worker_path(run_id, step_id, index);
        self.ensure_dir(&path)?;
        Ok(path)
    }

    /// Look up an existing step workspace.
    pub fn locate(&self, run_id: &RunId, step_id: &StepId) -> Result<PathBuf, WorkspaceError> {
        let path = self.step_path(run_id, step_id);
        if path.is_dir() {
            return Ok(path);
        }
        let worktree = self.worktree_path(run_id);
        if worktree.is_dir() {
            return Ok(worktree);
        }
        Err(WorkspaceError::NotExist {
            path: path.display().to_string(),
        })
    }

    /// Confirm the path exists, is a directory, and is writable.
    pub fn validate(path: &Path) -> Result<(), WorkspaceError> {
        let meta = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WorkspaceError::NotExist {
                    path: path.display().to_string(),
                }
            } else {
                classify_io("stat", path, e)
            }
        })?;
        if !meta.is_dir() {
            return Err(WorkspaceError::NotADirectory {
                path: path.display().to_string(),
            });
        }
        // Writability probe: create and remove a marker file.
        let probe = path.join(".wave_probe");
        std::fs::write(&probe, b"").map_err(|e| classify_io("write", path, e))?;
        let _ = std::fs::remove_file(&probe);
        Ok(())
    }

    /// Prior run roots for a pipeline, most recent first.
    ///
    /// Run directories are `<pipelineName>-*`; lexicographic descending order,
    /// so on suffix ties the later-sorting run wins.
    pub fn prior_run_roots(&self, pipeline_name: &str) -> Vec<PathBuf> {
        let prefix = format!("{pipeline_name}-");
        let mut roots: Vec<PathBuf> = std::fs::read_dir(&self.root)
            .ok()
            .into_iter()
            .flatten()
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
            .map(|entry| entry.path())
            .collect();
        roots.sort();
        roots.reverse();
        roots
    }

    /// Candidate directories a step may have executed in under a prior run
    /// root: `<stepId>/` plus any `__wt_*` worktree (older runs may mix both).
    pub fn step_dir_candidates(run_root: &Path, step_id: &StepId) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        let direct = run_root.join(step_id.as_str());
        if direct.is_dir() {
            candidates.push(direct);
        }
        if let Ok(entries) = std::fs::read_dir(run_root) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                if name.to_string_lossy().starts_with("__wt_") && entry.path().is_dir() {
                    candidates.push(entry.path());
                }
            }
        }
        candidates
    }

    fn ensure_dir(&self, path: &Path) -> Result<(), WorkspaceError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            std::fs::DirBuilder::new()
                .recursive(true)
                .mode(0o755)
                .create(path)
                .map_err(|e| classify_io("create", path, e))
        }
        #[cfg(not(unix))]
        {
            std::fs::create_dir_all(path).map_err(|e| classify_io("create", path, e))
        }
    }

    async fn add_worktree(
        &self,
        run_id: &RunId,
        path: &Path,
        base: &str,
    ) -> Result<(), WorkspaceError> {
        let branch = format!("__wt_{}", run_id);
        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(&self.project_root)
            .arg("worktree")
            .arg("add")
            .arg("-b")
            .arg(&branch)
            .arg(path)
            .arg(base);
        let output = run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git worktree add")
            .await
            .map_err(|detail| WorkspaceError::Worktree { detail })?;
        if !output.status.success() {
            return Err(WorkspaceError::Worktree {
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
