// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persona manifest and engine-level limits

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use wave_core::DEFAULT_RUN_SUFFIX_LEN;

/// Default cap on concurrent matrix workers when the manifest does not set one.
pub const DEFAULT_MAX_CONCURRENT_WORKERS: usize = 10;

/// Default per-step timeout in minutes.
pub const DEFAULT_TIMEOUT_MIN: u64 = 30;

/// The persona manifest: who can run, with which permissions, plus
/// engine-wide limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Personas by name, declaration-ordered.
    #[serde(default)]
    pub personas: IndexMap<String, PersonaDef>,
    /// Cap on concurrent matrix workers (default 10).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_workers: Option<usize>,
    /// Per-step timeout unless the step overrides it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timeout_min: Option<u64>,
    /// Root of the workspace tree; run directories are created beneath it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,
    /// Directories contract schema files may be loaded from.
    #[serde(default)]
    pub approved_schema_dirs: Vec<PathBuf>,
    /// Hex suffix length for generated run IDs (default 8).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id_length: Option<usize>,
}

impl Manifest {
    pub fn persona(&self, name: &str) -> Option<&PersonaDef> {
        self.personas.get(name)
    }

    pub fn worker_cap(&self) -> usize {
        self.max_concurrent_workers
            .unwrap_or(DEFAULT_MAX_CONCURRENT_WORKERS)
    }

    pub fn default_timeout_min(&self) -> u64 {
        self.default_timeout_min.unwrap_or(DEFAULT_TIMEOUT_MIN)
    }

    pub fn run_id_length(&self) -> usize {
        self.run_id_length.unwrap_or(DEFAULT_RUN_SUFFIX_LEN)
    }
}

/// A persona: adapter selection, tool permissions, and prompt prelude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaDef {
    /// Adapter this persona dispatches to (default "claude").
    #[serde(default = "default_adapter")]
    pub adapter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Prepended to every prompt dispatched under this persona.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_prelude: Option<String>,
    #[serde(default)]
    pub permissions: PermissionSet,
}

impl Default for PersonaDef {
    fn default() -> Self {
        Self {
            adapter: default_adapter(),
            description: None,
            prompt_prelude: None,
            permissions: PermissionSet::default(),
        }
    }
}

/// Allow/deny tool lists forwarded to the adapter. Deny wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionSet {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
}

fn default_adapter() -> String {
    "claude".to_string()
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
