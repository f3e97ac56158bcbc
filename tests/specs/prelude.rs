//! Shared harness for behavioral specs

use std::path::PathBuf;
use std::sync::Arc;
use wave_adapters::FakeAdapter;
use wave_core::{CollectingSink, EventSink, StepState};
use wave_engine::{ConcurrencyGuard, PipelineExecutor};
use wave_manifest::{parse_manifest, parse_pipeline, Pipeline};
use wave_storage::{MemoryStore, StateStore};

pub const MANIFEST_YAML: &str = r#"
personas:
  architect:
    description: plans the work
  engineer:
    description: does the work
max_concurrent_workers: 10
default_timeout_min: 5
"#;

pub struct Spec {
    pub fake: FakeAdapter,
    pub sink: Arc<CollectingSink>,
    pub store: Arc<MemoryStore>,
    pub executor: PipelineExecutor,
    pub ws_root: PathBuf,
    dir: tempfile::TempDir,
}

impl Spec {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let ws_root = dir.path().join("ws");
        let fake = FakeAdapter::new();
        let sink = Arc::new(CollectingSink::new());
        let store = Arc::new(MemoryStore::new());
        let manifest = parse_manifest(MANIFEST_YAML).unwrap();
        let executor = PipelineExecutor::new(manifest, &ws_root, dir.path())
            .with_adapter("claude", Arc::new(fake.clone()))
            .with_sink(Arc::clone(&sink) as Arc<dyn EventSink>)
            .with_store(Arc::clone(&store) as Arc<dyn StateStore>)
            .with_guard(Arc::new(ConcurrencyGuard::new()));
        Spec {
            fake,
            sink,
            store,
            executor,
            ws_root,
            dir,
        }
    }

    pub fn project_root(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Step IDs of `completed` step events, in emission order.
    pub fn completed_steps(&self) -> Vec<String> {
        self.sink
            .events()
            .into_iter()
            .filter(|e| e.state == StepState::Completed && e.step_id.is_some())
            .map(|e| e.step_id.unwrap().to_string())
            .collect()
    }
}

pub fn load(yaml: &str) -> Pipeline {
    parse_pipeline(yaml).unwrap()
}
