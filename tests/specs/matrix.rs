//! S3/S4: matrix fan-out and conflict detection

use crate::prelude::{load, Spec};
use wave_adapters::ScriptedStep;
use wave_core::StepState;
use wave_engine::EngineError;

const FANOUT: &str = r#"
name: fanout
steps:
  - id: scan
    persona: architect
    exec: { type: command, source: "cp {{ pipeline_context.project_root }}/items.json items.json" }
    output_artifacts:
      - { name: items, path: items.json }
  - id: fix
    persona: engineer
    dependencies: [scan]
    memory:
      inject_artifacts:
        - { source_step: scan, artifact_name: items, local_name: items.json }
    exec: { type: prompt, source: "Fix {{ task }}" }
    strategy:
      type: matrix
      items_source: .wave/artifacts/items.json
      max_concurrency: 3
"#;

#[tokio::test]
async fn five_items_run_under_a_three_wide_cap() {
    let spec = Spec::new();
    std::fs::write(
        spec.project_root().join("items.json"),
        r#"["one", "two", "three", "four", "five"]"#,
    )
    .unwrap();
    spec.fake.set_handler("fix", |req| {
        let item = req
            .prompt
            .split("Fix ")
            .nth(1)
            .unwrap()
            .trim_matches('"')
            .to_string();
        Ok(ScriptedStep::writes(format!("{item}.txt"), "fixed").with_delay_ms(100))
    });

    let pipeline = load(FANOUT);
    let summary = spec.executor.execute(&pipeline, "go").await.unwrap();

    assert_eq!(spec.fake.call_count("fix"), 5);
    // Three workers concurrently active at peak, never more.
    assert_eq!(spec.fake.max_concurrent(), 3);

    let aggregate = &summary.results[&wave_core::StepId::new("fix")];
    assert_eq!(aggregate["total_workers"], 5);
    assert_eq!(aggregate["success_count"], 5);
    assert_eq!(aggregate["fail_count"], 0);
    assert_eq!(spec.sink.count_state(StepState::MatrixComplete), 1);
}

#[tokio::test]
async fn empty_item_list_still_completes() {
    let spec = Spec::new();
    std::fs::write(spec.project_root().join("items.json"), "[]").unwrap();

    let pipeline = load(FANOUT);
    let summary = spec.executor.execute(&pipeline, "go").await.unwrap();
    let aggregate = &summary.results[&wave_core::StepId::new("fix")];
    assert_eq!(aggregate["total_workers"], 0);
    assert_eq!(aggregate["worker_results"].as_array().unwrap().len(), 0);
    assert_eq!(spec.fake.call_count("fix"), 0);
}

#[tokio::test]
async fn shared_file_conflict_fails_the_step() {
    let spec = Spec::new();
    std::fs::write(spec.project_root().join("items.json"), r#"["x", "y"]"#).unwrap();
    // Both items write the same relative path.
    spec.fake
        .set_default("fix", ScriptedStep::writes("shared.txt", "contents"));

    let pipeline = load(FANOUT);
    let err = spec.executor.execute(&pipeline, "go").await.unwrap_err();
    let source = match &err {
        EngineError::PhaseFailure { source, .. } => source.as_ref(),
        other => panic!("unexpected error: {other}"),
    };
    match source {
        EngineError::FileConflict { path, workers, .. } => {
            assert_eq!(path, "shared.txt");
            assert_eq!(workers, &[0, 1]);
        }
        other => panic!("unexpected source: {other}"),
    }

    let events = spec.sink.events();
    let conflict = events
        .iter()
        .find(|e| e.state == StepState::MatrixConflict)
        .expect("matrix_conflict event");
    let message = conflict.message.as_deref().unwrap();
    assert!(message.contains("shared.txt"), "{message}");
    assert!(message.contains("[0, 1]"), "{message}");
}
