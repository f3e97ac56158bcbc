// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{pipeline, step, step_with_deps};

fn ids(order: &[StepId]) -> Vec<&str> {
    order.iter().map(StepId::as_str).collect()
}

#[test]
fn linear_chain_in_declaration_order() {
    let p = pipeline(
        "linear",
        vec![
            step("a"),
            step_with_deps("b", &["a"]),
            step_with_deps("c", &["b"]),
        ],
    );
    let order = validate_dag(&p).unwrap();
    assert_eq!(ids(&order), ["a", "b", "c"]);
}

#[test]
fn declaration_order_breaks_ties() {
    // b and c both depend only on a: declaration order decides.
    let p = pipeline(
        "diamond",
        vec![
            step("a"),
            step_with_deps("b", &["a"]),
            step_with_deps("c", &["a"]),
            step_with_deps("d", &["b", "c"]),
        ],
    );
    let order = validate_dag(&p).unwrap();
    assert_eq!(ids(&order), ["a", "b", "c", "d"]);
}

#[test]
fn steps_declared_out_of_order_still_sort() {
    let p = pipeline(
        "reversed",
        vec![step_with_deps("last", &["first"]), step("first")],
    );
    let order = validate_dag(&p).unwrap();
    assert_eq!(ids(&order), ["first", "last"]);
}

#[test]
fn every_step_visited_exactly_once() {
    let p = pipeline(
        "wide",
        vec![
            step("root"),
            step_with_deps("w1", &["root"]),
            step_with_deps("w2", &["root"]),
            step_with_deps("w3", &["root"]),
            step_with_deps("join", &["w1", "w2", "w3"]),
        ],
    );
    let order = validate_dag(&p).unwrap();
    assert_eq!(order.len(), 5);
    let mut sorted = ids(&order);
    sorted.sort_unstable();
    assert_eq!(sorted, ["join", "root", "w1", "w2", "w3"]);
    // Dependencies precede dependents.
    let pos = |id: &str| order.iter().position(|s| s == id).unwrap();
    assert!(pos("root") < pos("w1"));
    assert!(pos("w1") < pos("join"));
    assert!(pos("w3") < pos("join"));
}

#[test]
fn dangling_dependency_is_named() {
    let p = pipeline("broken", vec![step("a"), step_with_deps("b", &["ghost"])]);
    let err = validate_dag(&p).unwrap_err();
    assert_eq!(
        err,
        DagError::DanglingDependency {
            step: "b".to_string(),
            missing: "ghost".to_string(),
        }
    );
}

#[test]
fn two_cycle_is_detected_with_path() {
    let p = pipeline(
        "cyclic",
        vec![step_with_deps("a", &["b"]), step_with_deps("b", &["a"])],
    );
    let err = validate_dag(&p).unwrap_err();
    match err {
        DagError::CycleDetected { path } => {
            assert!(path.len() >= 3, "path should close the loop: {path:?}");
            assert_eq!(path.first(), path.last());
            assert!(path.contains(&"a".to_string()));
            assert!(path.contains(&"b".to_string()));
        }
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn self_dependency_is_a_cycle() {
    let p = pipeline("selfie", vec![step_with_deps("a", &["a"])]);
    let err = validate_dag(&p).unwrap_err();
    assert!(matches!(err, DagError::CycleDetected { .. }));
}

#[test]
fn longer_cycle_names_an_edge_on_the_loop() {
    let p = pipeline(
        "loopy",
        vec![
            step("pre"),
            step_with_deps("a", &["pre", "c"]),
            step_with_deps("b", &["a"]),
            step_with_deps("c", &["b"]),
        ],
    );
    let err = validate_dag(&p).unwrap_err();
    match err {
        DagError::CycleDetected { path } => {
            for id in ["a", "b", "c"] {
                assert!(path.contains(&id.to_string()), "{id} missing from {path:?}");
            }
            assert!(!path.contains(&"pre".to_string()));
        }
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn workspace_ref_is_a_cycle_edge() {
    let mut a = step("a");
    a.workspace.step_ref = Some("b".into());
    let mut b = step("b");
    b.workspace.step_ref = Some("a".into());
    let p = pipeline("refcycle", vec![a, b]);
    let err = validate_dag(&p).unwrap_err();
    assert!(matches!(err, DagError::CycleDetected { .. }));
}

#[test]
fn workspace_ref_to_unknown_step_is_dangling() {
    let mut a = step("a");
    a.workspace.step_ref = Some("ghost".into());
    let p = pipeline("refdangle", vec![a]);
    let err = validate_dag(&p).unwrap_err();
    assert!(matches!(err, DagError::DanglingDependency { .. }));
}

#[test]
fn workspace_ref_orders_before_referrer() {
    let mut b = step("b");
    b.workspace.step_ref = Some("a".into());
    let p = pipeline("refonly", vec![b, step("a")]);
    let order = validate_dag(&p).unwrap();
    assert_eq!(ids(&order), ["a", "b"]);
}
