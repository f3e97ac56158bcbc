// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DAG validation and topological scheduling
//!
//! Dependencies and `workspace.ref` edges form the edge set: a ref is a
//! scheduling constraint as much as a dependency, so ref cycles are rejected
//! the same way. The sort is deterministic: DFS post-order, visiting steps
//! and their edges in declaration order, so otherwise-unordered steps keep
//! their declared relative position.

use std::collections::HashMap;
use thiserror::Error;
use wave_core::StepId;
use wave_manifest::{Pipeline, Step};

/// Definition-level DAG errors.
#[derive(Debug, Error, PartialEq)]
pub enum DagError {
    #[error("step {step} depends on unknown step: {missing}")]
    DanglingDependency { step: String, missing: String },
    #[error("dependency cycle: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },
}

/// Validate the pipeline DAG and return a deterministic topological order.
///
/// Fails with [`DagError::DanglingDependency`] when an edge names a step
/// that does not exist, and [`DagError::CycleDetected`] (naming the edges
/// that close the loop) when the graph has a cycle.
pub fn validate_dag(pipeline: &Pipeline) -> Result<Vec<StepId>, DagError> {
    let by_id: HashMap<&str, &Step> = pipeline
        .steps
        .iter()
        .map(|s| (s.id.as_str(), s))
        .collect();

    // Every edge endpoint must exist before we walk anything.
    for step in &pipeline.steps {
        for dep in edges_of(step) {
            if !by_id.contains_key(dep.as_str()) {
                return Err(DagError::DanglingDependency {
                    step: step.id.to_string(),
                    missing: dep.to_string(),
                });
            }
        }
    }

    let mut order = Vec::with_capacity(pipeline.steps.len());
    let mut visited: HashMap<&str, VisitState> = HashMap::new();
    let mut stack: Vec<&str> = Vec::new();

    for step in &pipeline.steps {
        visit(step, &by_id, &mut visited, &mut stack, &mut order)?;
    }

    Ok(order)
}

/// Topologically sort a pre-validated pipeline.
///
/// Identical to [`validate_dag`]; kept as a named operation for call sites
/// that have already validated and only want the order.
pub fn topo_sort(pipeline: &Pipeline) -> Result<Vec<StepId>, DagError> {
    validate_dag(pipeline)
}

#[derive(Clone, Copy, PartialEq)]
enum VisitState {
    InProgress,
    Done,
}

/// Dependency edges plus the workspace ref edge, declaration-ordered.
fn edges_of(step: &Step) -> impl Iterator<Item = &StepId> {
    step.dependencies
        .iter()
        .chain(step.workspace.step_ref.iter())
}

fn visit<'a>(
    step: &'a Step,
    by_id: &HashMap<&str, &'a Step>,
    visited: &mut HashMap<&'a str, VisitState>,
    stack: &mut Vec<&'a str>,
    order: &mut Vec<StepId>,
) -> Result<(), DagError> {
    match visited.get(step.id.as_str()) {
        Some(VisitState::Done) => return Ok(()),
        Some(VisitState::InProgress) => {
            // The edge we just followed closes a loop; report the loop from
            // its first occurrence on the stack.
            let start = stack
                .iter()
                .position(|id| *id == step.id.as_str())
                .unwrap_or(0);
            let mut path: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
            path.push(step.id.to_string());
            return Err(DagError::CycleDetected { path });
        }
        None => {}
    }

    visited.insert(step.id.as_str(), VisitState::InProgress);
    stack.push(step.id.as_str());

    for dep in edges_of(step) {
        if let Some(upstream) = by_id.get(dep.as_str()) {
            visit(upstream, by_id, visited, stack, order)?;
        }
    }

    stack.pop();
    visited.insert(step.id.as_str(), VisitState::Done);
    order.push(step.id.clone());
    Ok(())
}

#[cfg(test)]
#[path = "dag_tests.rs"]
mod tests;
