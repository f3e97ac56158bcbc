//! S1: linear pipeline A -> B -> C with schema contracts

use crate::prelude::{load, Spec};
use wave_adapters::ScriptedStep;
use wave_core::{RunStatus, StepState};
use wave_storage::{EventQuery, StateStore};

const PIPELINE: &str = r#"
name: pipeline
steps:
  - id: a
    persona: architect
    exec: { type: prompt, source: "Plan {{ input }}" }
    output_artifacts:
      - { name: result, path: artifact.json }
    handover:
      contract:
        type: json_schema
        schema: '{"type": "object", "required": ["status"]}'
  - id: b
    persona: engineer
    dependencies: [a]
    memory:
      inject_artifacts:
        - { source_step: a, artifact_name: result, local_name: a.json }
    exec: { type: prompt, source: "Build it" }
    output_artifacts:
      - { name: result, path: artifact.json }
    handover:
      contract:
        type: json_schema
        schema: '{"type": "object", "required": ["status"]}'
  - id: c
    persona: engineer
    dependencies: [b]
    memory:
      inject_artifacts:
        - { source_step: b, artifact_name: result, local_name: b.json }
    exec: { type: prompt, source: "Verify it" }
    output_artifacts:
      - { name: result, path: artifact.json }
    handover:
      contract:
        type: json_schema
        schema: '{"type": "object", "required": ["status"]}'
"#;

#[tokio::test]
async fn linear_run_completes_in_order() {
    let spec = Spec::new();
    for id in ["a", "b", "c"] {
        spec.fake.set_default(
            id,
            ScriptedStep::writes("artifact.json", r#"{"status": "ok"}"#).with_tokens(11),
        );
    }

    let pipeline = load(PIPELINE);
    let summary = spec.executor.execute(&pipeline, "ship it").await.unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(spec.completed_steps(), ["a", "b", "c"]);
    assert_eq!(summary.tokens_used, 33);

    // RunID matches pipeline-[0-9a-f]{8}.
    let suffix = summary
        .run_id
        .as_str()
        .strip_prefix("pipeline-")
        .expect("run id prefix");
    assert_eq!(suffix.len(), 8);
    assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));

    // Every contract passed; artifact handover is byte-equal.
    assert_eq!(spec.sink.count_state(StepState::ContractPassed), 3);
    let b_injected = spec
        .ws_root
        .join(summary.run_id.as_str())
        .join("b/.wave/artifacts/a.json");
    assert_eq!(
        std::fs::read(&b_injected).unwrap(),
        std::fs::read(
            spec.ws_root
                .join(summary.run_id.as_str())
                .join("a/artifact.json")
        )
        .unwrap()
    );

    // The run and its events are observable through the store.
    let run = spec.store.get_run(&summary.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    let events = spec
        .store
        .get_events(&summary.run_id, EventQuery::default())
        .unwrap();
    assert!(events.len() >= 8, "expected a full event trail");
}

#[tokio::test]
async fn stdout_artifacts_capture_adapter_output() {
    let spec = Spec::new();
    spec.fake
        .set_default("a", ScriptedStep::prints(r#"{"status": "from stdout"}"#));

    let pipeline = load(
        r#"
name: stdout-demo
steps:
  - id: a
    persona: architect
    exec: { type: prompt, source: "Emit JSON on stdout" }
    output_artifacts:
      - { name: result, path: artifact.json, source: stdout }
    handover:
      contract:
        type: json_schema
        schema: '{"type": "object", "required": ["status"]}'
"#,
    );
    let summary = spec.executor.execute(&pipeline, "go").await.unwrap();
    let artifact = spec
        .ws_root
        .join(summary.run_id.as_str())
        .join("a/artifact.json");
    assert_eq!(
        std::fs::read_to_string(artifact).unwrap(),
        r#"{"status": "from stdout"}"#
    );
}
