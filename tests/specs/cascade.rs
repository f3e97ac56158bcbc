//! S6: stale cascade with mtime verification

use crate::prelude::load;
use std::collections::HashMap;
use std::path::Path;
use wave_core::StepId;
use wave_engine::{detect_cascade, CascadeOptions};

const PIPELINE: &str = r#"
name: chain
steps:
  - id: a
    persona: architect
    exec: { type: prompt, source: "First" }
    output_artifacts:
      - { name: out, path: out.json }
  - id: b
    persona: engineer
    dependencies: [a]
    memory:
      inject_artifacts:
        - { source_step: a, artifact_name: out, local_name: a.json }
    exec: { type: prompt, source: "Second" }
    output_artifacts:
      - { name: out, path: out.json }
  - id: c
    persona: engineer
    dependencies: [b]
    memory:
      inject_artifacts:
        - { source_step: b, artifact_name: out, local_name: b.json }
    exec: { type: prompt, source: "Third" }
"#;

fn pin_mtime(path: &Path, epoch: u64) {
    let status = std::process::Command::new("touch")
        .arg("-m")
        .arg("-d")
        .arg(format!("@{epoch}"))
        .arg(path)
        .status()
        .unwrap();
    assert!(status.success());
}

fn seed_workspaces(root: &Path, mtimes: &[(&str, u64)]) -> HashMap<StepId, std::path::PathBuf> {
    let mut map = HashMap::new();
    for (id, epoch) in mtimes {
        let ws = root.join(id);
        std::fs::create_dir_all(&ws).unwrap();
        std::fs::write(ws.join("out.json"), "{}").unwrap();
        pin_mtime(&ws.join("out.json"), *epoch);
        pin_mtime(&ws, *epoch);
        map.insert(StepId::new(*id), ws);
    }
    map
}

#[tokio::test]
async fn touching_a_stales_b_and_c() {
    let dir = tempfile::tempdir().unwrap();
    // A's workspace is newer than B's.
    let workspaces = seed_workspaces(
        dir.path(),
        &[("a", 2_000_000_000), ("b", 1_000_000_000), ("c", 1_100_000_000)],
    );
    let report = detect_cascade(
        &load(PIPELINE),
        &StepId::new("a"),
        &workspaces,
        &CascadeOptions { verify_mtime: true },
    )
    .unwrap();
    assert_eq!(report.stale_ids(), ["b", "c"]);
}

#[tokio::test]
async fn b_newer_than_a_clears_the_cascade() {
    let dir = tempfile::tempdir().unwrap();
    // B re-ran after A's change, and C after B.
    let workspaces = seed_workspaces(
        dir.path(),
        &[("a", 1_000_000_000), ("b", 2_000_000_000), ("c", 2_100_000_000)],
    );
    let report = detect_cascade(
        &load(PIPELINE),
        &StepId::new("a"),
        &workspaces,
        &CascadeOptions { verify_mtime: true },
    )
    .unwrap();
    assert!(report.stale.is_empty(), "{:?}", report.stale_ids());
}

#[tokio::test]
async fn structural_scan_ignores_mtimes_when_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let workspaces = seed_workspaces(
        dir.path(),
        &[("a", 1_000_000_000), ("b", 2_000_000_000), ("c", 2_100_000_000)],
    );
    let report = detect_cascade(
        &load(PIPELINE),
        &StepId::new("a"),
        &workspaces,
        &CascadeOptions::default(),
    )
    .unwrap();
    assert_eq!(report.stale_ids(), ["b", "c"]);
}
