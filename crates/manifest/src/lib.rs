// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wave-manifest: pipeline and persona definitions for the Wave engine.
//!
//! Pipelines are YAML documents describing a DAG of persona-driven steps.
//! This crate owns the definition types, the loader (with parse-time
//! validation of duplicate IDs and artifact names), and the `{{ name }}`
//! template interpolation used for prompt rendering.

pub mod loader;
pub mod manifest;
pub mod pipeline;
pub mod template;

pub use loader::{load_manifest, load_pipeline, parse_manifest, parse_pipeline, ManifestError};
pub use manifest::{Manifest, PermissionSet, PersonaDef};
pub use pipeline::{
    ArtifactSource, ContractConfig, ContractKind, ExecConfig, ExecType, HandoverConfig,
    InjectArtifact, MatrixStrategy, MemoryConfig, MemoryStrategy, OutcomeSpec, OutputArtifact,
    Pipeline, Step, StrategyType, WorkspaceConfig, WorkspaceKind,
};
pub use template::{interpolate, TemplateContext};
