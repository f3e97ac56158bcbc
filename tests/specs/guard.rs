//! Property 11: pipeline-name serialization within one process
//!
//! Timing-sensitive, so these specs run serialized.

use crate::prelude::{load, Spec};
use serial_test::serial;
use wave_adapters::ScriptedStep;
use wave_core::RunId;
use wave_engine::{EngineError, GuardError};

const PIPELINE: &str = r#"
name: guarded
steps:
  - id: only
    persona: engineer
    exec: { type: prompt, source: "Work" }
    output_artifacts:
      - { name: out, path: artifact.json }
"#;

#[tokio::test]
#[serial]
async fn second_concurrent_run_is_rejected_then_allowed_after_release() {
    let spec = Spec::new();
    spec.fake.set_default(
        "only",
        ScriptedStep::writes("artifact.json", r#"{"status": "ok"}"#).with_delay_ms(150),
    );
    let pipeline = load(PIPELINE);

    let first = spec.executor.execute(&pipeline, "go");
    let second = async {
        tokio::time::sleep(std::time::Duration::from_millis(40)).await;
        spec.executor.execute(&pipeline, "go").await
    };
    let (first, second) = tokio::join!(first, second);
    first.unwrap();
    match second.unwrap_err() {
        EngineError::Busy(GuardError::PipelineBusy(name)) => assert_eq!(name, "guarded"),
        other => panic!("unexpected error: {other}"),
    }

    // Third attempt after release succeeds.
    spec.executor.execute(&pipeline, "go").await.unwrap();
}

#[tokio::test]
#[serial]
async fn distinct_pipelines_do_not_contend() {
    let spec = Spec::new();
    spec.fake.set_default(
        "only",
        ScriptedStep::writes("artifact.json", r#"{"status": "ok"}"#),
    );
    let one = load(PIPELINE);
    let mut two = load(PIPELINE);
    two.name = "unguarded".to_string();

    // Sequential runs of different names share the workspace root without
    // conflict because the lock is released between them; concurrent runs of
    // different names would contend only on the shared workspace path.
    spec.executor.execute(&one, "go").await.unwrap();
    spec.executor.execute(&two, "go").await.unwrap();
}

#[test]
fn run_id_generation_is_unique_and_sized() {
    // Property 15: 1000 sequential generations are distinct, default len 8.
    let mut seen = std::collections::HashSet::new();
    for _ in 0..1000 {
        let id = RunId::generate("guarded", 0);
        assert_eq!(id.suffix().len(), 8);
        assert!(seen.insert(id.as_str().to_string()));
    }
}
