// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{pipeline, step, step_with_deps, with_inject, with_output};
use wave_manifest::Pipeline;

fn diamond() -> Pipeline {
    // a -> b, a -> c, {b, c} -> d, plus an independent branch x -> y.
    let a = with_output(step("a"), "seed", "seed.json");
    let b = with_inject(step_with_deps("b", &["a"]), "a", "seed", "seed.json");
    let c = with_inject(step_with_deps("c", &["a"]), "a", "seed", "seed.json");
    let mut d = with_inject(step_with_deps("d", &["b", "c"]), "b", "b-out", "b.json");
    d = with_inject(d, "c", "c-out", "c.json");
    let x = with_output(step("x"), "side", "side.json");
    let y = with_inject(step_with_deps("y", &["x"]), "x", "side", "side.json");
    pipeline("demo", vec![a, b, c, d, x, y])
}

fn no_workspaces() -> HashMap<StepId, PathBuf> {
    HashMap::new()
}

#[test]
fn diamond_closure_in_declaration_order() {
    let report = detect_cascade(
        &diamond(),
        &StepId::new("a"),
        &no_workspaces(),
        &CascadeOptions::default(),
    )
    .unwrap();
    assert_eq!(report.stale_ids(), ["b", "c", "d"]);

    let b = &report.stale[0];
    assert!(b.direct);
    assert_eq!(b.artifacts, ["a:seed"]);
    assert!(b.reason.contains("modified step a"));

    let d = &report.stale[2];
    assert!(!d.direct);
    assert!(d.reason.contains("transitively"));
    assert_eq!(d.artifacts, ["b:b-out", "c:c-out"]);
}

#[test]
fn independent_branch_stays_clean() {
    let report = detect_cascade(
        &diamond(),
        &StepId::new("a"),
        &no_workspaces(),
        &CascadeOptions::default(),
    )
    .unwrap();
    assert!(!report.stale_ids().contains(&"x"));
    assert!(!report.stale_ids().contains(&"y"));

    let report = detect_cascade(
        &diamond(),
        &StepId::new("x"),
        &no_workspaces(),
        &CascadeOptions::default(),
    )
    .unwrap();
    assert_eq!(report.stale_ids(), ["y"]);
}

#[test]
fn midstream_modification_only_affects_downstream() {
    let report = detect_cascade(
        &diamond(),
        &StepId::new("b"),
        &no_workspaces(),
        &CascadeOptions::default(),
    )
    .unwrap();
    assert_eq!(report.stale_ids(), ["d"]);
}

#[test]
fn leaf_modification_has_empty_cascade() {
    let report = detect_cascade(
        &diamond(),
        &StepId::new("d"),
        &no_workspaces(),
        &CascadeOptions::default(),
    )
    .unwrap();
    assert!(report.stale.is_empty());
    assert!(report.render().contains("no downstream steps are stale"));
}

#[test]
fn unknown_step_is_an_error() {
    let err = detect_cascade(
        &diamond(),
        &StepId::new("ghost"),
        &no_workspaces(),
        &CascadeOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        crate::error::EngineError::StepNotFound { .. }
    ));
}

#[test]
fn report_render_ends_with_recommendation() {
    let report = detect_cascade(
        &diamond(),
        &StepId::new("a"),
        &no_workspaces(),
        &CascadeOptions::default(),
    )
    .unwrap();
    let rendered = report.render();
    assert!(rendered.starts_with("cascade from modified step a:"));
    assert!(rendered.contains("a:seed"));
    assert!(rendered.ends_with("re-run recommendation: wave resume <pipeline> --from b"));
}

// --- mtime verification ---

/// Recursively pin a tree's mtimes to a fixed epoch second.
fn set_tree_mtime(path: &Path, epoch: u64) {
    if path.is_dir() {
        for entry in std::fs::read_dir(path).unwrap().flatten() {
            set_tree_mtime(&entry.path(), epoch);
        }
    }
    let status = std::process::Command::new("touch")
        .arg("-m")
        .arg("-d")
        .arg(format!("@{epoch}"))
        .arg(path)
        .status()
        .unwrap();
    assert!(status.success());
}

fn linear() -> Pipeline {
    let a = with_output(step("a"), "out", "out.json");
    let b = with_inject(step_with_deps("b", &["a"]), "a", "out", "a.json");
    let c = with_inject(step_with_deps("c", &["b"]), "b", "out", "b.json");
    pipeline("linear", vec![a, b, c])
}

fn workspace_fixture(dir: &Path, mtimes: &[(&str, u64)]) -> HashMap<StepId, PathBuf> {
    let mut map = HashMap::new();
    for (id, epoch) in mtimes {
        let ws = dir.join(id);
        std::fs::create_dir_all(&ws).unwrap();
        std::fs::write(ws.join("out.json"), "{}").unwrap();
        set_tree_mtime(&ws, *epoch);
        map.insert(StepId::new(*id), ws);
    }
    map
}

#[test]
fn source_newer_than_consumer_keeps_cascade() {
    let dir = tempfile::tempdir().unwrap();
    // A touched after B ran: B and C stay stale.
    let workspaces = workspace_fixture(
        dir.path(),
        &[("a", 2_000_000_000), ("b", 1_000_000_000), ("c", 1_500_000_000)],
    );
    let report = detect_cascade(
        &linear(),
        &StepId::new("a"),
        &workspaces,
        &CascadeOptions { verify_mtime: true },
    )
    .unwrap();
    assert_eq!(report.stale_ids(), ["b", "c"]);
}

#[test]
fn consumer_newer_than_source_is_dropped_with_its_downstream() {
    let dir = tempfile::tempdir().unwrap();
    // B re-ran after A changed (and C after B): nothing is stale.
    let workspaces = workspace_fixture(
        dir.path(),
        &[("a", 1_000_000_000), ("b", 2_000_000_000), ("c", 2_500_000_000)],
    );
    let report = detect_cascade(
        &linear(),
        &StepId::new("a"),
        &workspaces,
        &CascadeOptions { verify_mtime: true },
    )
    .unwrap();
    assert!(report.stale.is_empty(), "{:?}", report.stale_ids());
}

#[test]
fn missing_consumer_workspace_stays_stale() {
    let dir = tempfile::tempdir().unwrap();
    let workspaces = workspace_fixture(dir.path(), &[("a", 1_000_000_000)]);
    let report = detect_cascade(
        &linear(),
        &StepId::new("a"),
        &workspaces,
        &CascadeOptions { verify_mtime: true },
    )
    .unwrap();
    assert_eq!(report.stale_ids(), ["b", "c"]);
}

#[test]
fn missing_source_workspace_keeps_consumer_stale() {
    let dir = tempfile::tempdir().unwrap();
    // B exists and is recent, but A's workspace is gone: no freshness proof.
    let workspaces = workspace_fixture(dir.path(), &[("b", 2_000_000_000)]);
    let report = detect_cascade(
        &linear(),
        &StepId::new("a"),
        &workspaces,
        &CascadeOptions { verify_mtime: true },
    )
    .unwrap();
    assert_eq!(report.stale_ids(), ["b", "c"]);
}

#[test]
fn latest_workspaces_prefers_newest_run_and_direct_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("ws");
    std::fs::create_dir_all(root.join("linear-0001/a")).unwrap();
    std::fs::create_dir_all(root.join("linear-0002/a")).unwrap();
    std::fs::create_dir_all(root.join("linear-0002/__wt_linear-0002")).unwrap();
    let workspaces = WorkspaceManager::new(&root, dir.path());

    let map = latest_workspaces(&workspaces, &linear());
    assert!(map[&StepId::new("a")].ends_with("linear-0002/a"));
    // b has no direct dir anywhere; the newest run's worktree stands in.
    assert!(map[&StepId::new("b")].ends_with("__wt_linear-0002"));
}

#[test]
fn max_mtime_sees_nested_files() {
    let dir = tempfile::tempdir().unwrap();
    let ws = dir.path().join("ws");
    std::fs::create_dir_all(ws.join("nested")).unwrap();
    std::fs::write(ws.join("nested/deep.txt"), "x").unwrap();
    std::fs::write(ws.join("nested/new.txt"), "y").unwrap();
    set_tree_mtime(&ws, 1_000_000_000);
    // A newer file deep in the tree raises the workspace mtime.
    set_tree_mtime(&ws.join("nested/new.txt"), 1_500_000_000);

    let observed = max_mtime(&ws).unwrap();
    let expected = std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_500_000_000);
    assert_eq!(observed, expected);
}
