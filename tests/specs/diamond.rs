//! S2: diamond pipeline with a hard contract failure on one branch

use crate::prelude::{load, Spec};
use std::collections::HashMap;
use wave_adapters::ScriptedStep;
use wave_core::{StepId, StepState};
use wave_engine::{detect_cascade, CascadeOptions, EngineError};

const PIPELINE: &str = r#"
name: diamond
steps:
  - id: a
    persona: architect
    exec: { type: prompt, source: "Seed" }
    output_artifacts:
      - { name: seed, path: artifact.json }
  - id: b
    persona: engineer
    dependencies: [a]
    memory:
      inject_artifacts:
        - { source_step: a, artifact_name: seed, local_name: seed.json }
    exec: { type: prompt, source: "Left branch" }
    output_artifacts:
      - { name: left, path: artifact.json }
  - id: c
    persona: engineer
    dependencies: [a]
    memory:
      inject_artifacts:
        - { source_step: a, artifact_name: seed, local_name: seed.json }
    exec: { type: prompt, source: "Right branch" }
    output_artifacts:
      - { name: right, path: artifact.json }
    handover:
      contract:
        type: json_schema
        schema: '{"type": "object", "required": ["verdict"]}'
        must_pass: true
        max_retries: 2
  - id: d
    persona: engineer
    dependencies: [b, c]
    memory:
      inject_artifacts:
        - { source_step: b, artifact_name: left, local_name: left.json }
        - { source_step: c, artifact_name: right, local_name: right.json }
    exec: { type: prompt, source: "Join" }
"#;

#[tokio::test]
async fn failing_branch_stops_the_join() {
    let spec = Spec::new();
    for id in ["a", "b", "d"] {
        spec.fake
            .set_default(id, ScriptedStep::writes("artifact.json", r#"{"status": "ok"}"#));
    }
    // c's output never carries the required "verdict" field.
    spec.fake
        .set_default("c", ScriptedStep::writes("artifact.json", r#"{"status": "ok"}"#));

    let pipeline = load(PIPELINE);
    let err = spec.executor.execute(&pipeline, "go").await.unwrap_err();
    match &err {
        EngineError::PhaseFailure { step, .. } => assert_eq!(step, "c"),
        other => panic!("unexpected error: {other}"),
    }

    // A and B completed; C consumed MaxRetries + 1 attempts; D never started.
    assert_eq!(spec.completed_steps(), ["a", "b"]);
    assert_eq!(spec.fake.call_count("c"), 3);
    assert_eq!(spec.fake.call_count("d"), 0);
    assert_eq!(spec.sink.count_state(StepState::Retrying), 2);
    assert_eq!(spec.sink.count_state(StepState::ContractFailed), 1);

    // The run itself is failed.
    let failed_pipeline_events: Vec<_> = spec
        .sink
        .events()
        .into_iter()
        .filter(|e| e.step_id.is_none() && e.state == StepState::Failed)
        .collect();
    assert_eq!(failed_pipeline_events.len(), 1);
}

#[tokio::test]
async fn cascade_from_a_names_both_branches_and_join() {
    let pipeline = load(PIPELINE);
    let report = detect_cascade(
        &pipeline,
        &StepId::new("a"),
        &HashMap::new(),
        &CascadeOptions::default(),
    )
    .unwrap();
    assert_eq!(report.stale_ids(), ["b", "c", "d"]);
    let rendered = report.render();
    assert!(rendered.contains("a:seed"), "{rendered}");
    assert!(rendered.contains("re-run recommendation"), "{rendered}");
}
