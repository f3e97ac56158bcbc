//! S5: resume from a mid-pipeline step with prior state on disk

use crate::prelude::{load, Spec};
use wave_adapters::ScriptedStep;
use wave_core::{RunStatus, StepState};
use wave_engine::ResumeManager;

const PIPELINE: &str = r#"
name: three
steps:
  - id: one
    persona: architect
    exec: { type: prompt, source: "First" }
    output_artifacts:
      - { name: out, path: artifact.json }
  - id: two
    persona: engineer
    dependencies: [one]
    memory:
      inject_artifacts:
        - { source_step: one, artifact_name: out, local_name: one.json }
    exec: { type: prompt, source: "Second" }
    output_artifacts:
      - { name: out, path: artifact.json }
  - id: three
    persona: engineer
    dependencies: [two]
    memory:
      inject_artifacts:
        - { source_step: two, artifact_name: out, local_name: two.json }
    exec: { type: prompt, source: "Third" }
    output_artifacts:
      - { name: out, path: artifact.json }
"#;

#[tokio::test]
async fn resume_from_step_two_reuses_step_one_output() {
    let spec = Spec::new();
    // A prior run completed step one on disk.
    let prior = spec.ws_root.join("three-0a0a0a0a/one");
    std::fs::create_dir_all(&prior).unwrap();
    std::fs::write(prior.join("artifact.json"), r#"{"origin": "prior-run"}"#).unwrap();

    for id in ["two", "three"] {
        spec.fake
            .set_default(id, ScriptedStep::writes("artifact.json", r#"{"status": "ok"}"#));
    }

    let pipeline = load(PIPELINE);
    let manager = ResumeManager::new(&spec.executor);
    let summary = manager
        .resume_from_step(&pipeline, "go", "two", false)
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_ne!(summary.run_id.as_str(), "three-0a0a0a0a", "fresh RunID");

    // Step one never re-ran, but observers saw it complete.
    assert_eq!(spec.fake.call_count("one"), 0);
    assert_eq!(spec.fake.call_count("two"), 1);
    assert_eq!(spec.fake.call_count("three"), 1);
    assert_eq!(spec.completed_steps(), ["one", "two", "three"]);
    assert_eq!(spec.sink.count_state(StepState::Resuming), 1);

    // Step two's injected artifact came from the prior run's workspace.
    let injected = spec
        .ws_root
        .join(summary.run_id.as_str())
        .join("two/.wave/artifacts/one.json");
    assert_eq!(
        std::fs::read_to_string(injected).unwrap(),
        r#"{"origin": "prior-run"}"#
    );
}

#[tokio::test]
async fn resume_without_prior_state_is_blocked() {
    let spec = Spec::new();
    let pipeline = load(PIPELINE);
    let manager = ResumeManager::new(&spec.executor);
    let err = manager
        .resume_from_step(&pipeline, "go", "three", false)
        .await
        .unwrap_err();
    assert!(
        err.to_string().contains("incomplete"),
        "expected prerequisite failure, got: {err}"
    );
}

#[tokio::test]
async fn resumed_walk_matches_fresh_suffix_run() {
    let spec = Spec::new();
    let prior = spec.ws_root.join("three-0a0a0a0a/one");
    std::fs::create_dir_all(&prior).unwrap();
    std::fs::write(prior.join("artifact.json"), r#"{"status": "ok"}"#).unwrap();
    for id in ["two", "three"] {
        spec.fake
            .set_default(id, ScriptedStep::writes("artifact.json", r#"{"status": "ok"}"#));
    }

    let pipeline = load(PIPELINE);
    let manager = ResumeManager::new(&spec.executor);
    let summary = manager
        .resume_from_step(&pipeline, "go", "two", false)
        .await
        .unwrap();

    // The executed suffix is exactly steps two and three, in order.
    let executed: Vec<String> = spec
        .fake
        .calls()
        .into_iter()
        .map(|c| c.step_id.to_string())
        .collect();
    assert_eq!(executed, ["two", "three"]);
    assert_eq!(summary.steps.len(), 2);
}
