// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders shared by engine unit tests

use crate::artifact::ArtifactRegistry;
use crate::context::RunContext;
use crate::contract::ContractValidator;
use crate::workspace::WorkspaceManager;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wave_adapters::AgentAdapter;
use wave_core::{CollectingSink, FakeClock, RunId};
use wave_manifest::{
    ArtifactSource, ContractConfig, ContractKind, ExecConfig, ExecType, HandoverConfig,
    InjectArtifact, Manifest, MemoryConfig, OutputArtifact, PersonaDef, Pipeline, Step,
    WorkspaceConfig,
};

/// A minimal prompt step with no dependencies or outputs.
pub fn step(id: &str) -> Step {
    Step {
        id: id.into(),
        persona: "tester".to_string(),
        description: None,
        dependencies: Vec::new(),
        memory: MemoryConfig::default(),
        workspace: WorkspaceConfig::default(),
        exec: ExecConfig {
            exec_type: ExecType::Prompt,
            source: Some(format!("run step {id} for {{{{ input }}}}")),
            file: None,
        },
        output_artifacts: Vec::new(),
        handover: HandoverConfig::default(),
        strategy: None,
        outcomes: Vec::new(),
        timeout_min: None,
    }
}

pub fn step_with_deps(id: &str, deps: &[&str]) -> Step {
    let mut s = step(id);
    s.dependencies = deps.iter().map(|d| (*d).into()).collect();
    s
}

/// Add a declared output artifact (required, file source).
pub fn with_output(mut s: Step, name: &str, path: &str) -> Step {
    s.output_artifacts.push(OutputArtifact {
        name: name.to_string(),
        path: path.into(),
        artifact_type: None,
        required: true,
        source: ArtifactSource::File,
    });
    s
}

/// Add an artifact injection entry.
pub fn with_inject(mut s: Step, source_step: &str, artifact: &str, local: &str) -> Step {
    s.memory.inject_artifacts.push(InjectArtifact {
        source_step: source_step.into(),
        artifact_name: artifact.to_string(),
        local_name: local.to_string(),
        optional: false,
    });
    s
}

pub fn pipeline(name: &str, steps: Vec<Step>) -> Pipeline {
    Pipeline {
        name: name.to_string(),
        description: None,
        steps,
    }
}

/// Attach a json_schema contract.
pub fn with_schema_contract(mut s: Step, schema: &str, must_pass: bool, max_retries: u32) -> Step {
    s.handover = HandoverConfig {
        contract: Some(ContractConfig {
            kind: ContractKind::JsonSchema,
            schema: Some(schema.to_string()),
            schema_file: None,
            command: None,
            dir: None,
            source: None,
            must_pass,
            max_retries,
        }),
    };
    s
}

/// Manifest with a single permissive `tester` persona.
pub fn manifest() -> Manifest {
    let mut m = Manifest::default();
    m.personas.insert("tester".to_string(), PersonaDef::default());
    m
}

/// A run context plus the sink it emits into.
pub struct TestCtx {
    pub ctx: Arc<RunContext<FakeClock>>,
    pub sink: Arc<CollectingSink>,
    pub clock: FakeClock,
}

/// Fully wired context over a temp root and a single "claude" adapter.
pub fn context(root: &Path, adapter: Arc<dyn AgentAdapter>) -> TestCtx {
    let sink = Arc::new(CollectingSink::new());
    let clock = FakeClock::at(1_000);
    let mut adapters: HashMap<String, Arc<dyn AgentAdapter>> = HashMap::new();
    adapters.insert("claude".to_string(), adapter);
    let ctx = Arc::new(RunContext {
        run_id: RunId::new("demo-1234abcd"),
        pipeline_name: "demo".to_string(),
        input: "the-input".to_string(),
        manifest: Arc::new(manifest()),
        adapters,
        workspaces: WorkspaceManager::new(root.join("ws"), root.to_path_buf()),
        artifacts: ArtifactRegistry::new(),
        validator: ContractValidator::new(vec![root.to_path_buf()], root.to_path_buf()),
        sink: Arc::clone(&sink) as Arc<dyn wave_core::EventSink>,
        store: None,
        clock: clock.clone(),
        cancel: CancellationToken::new(),
        project_root: root.to_path_buf(),
        results: Mutex::new(HashMap::new()),
        workspace_paths: Mutex::new(HashMap::new()),
        completed_steps: AtomicUsize::new(0),
        total_steps: 3,
        tokens_total: AtomicU64::new(0),
    });
    TestCtx { ctx, sink, clock }
}
