// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative outcome extraction
//!
//! Steps may declare outcomes: named values pulled from a JSON output
//! artifact by dot-path, collected into the run summary for end-of-run
//! reporting. Extraction is best-effort — a missing path yields null rather
//! than failing a step that already completed.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use wave_manifest::Step;

/// Extract the step's declared outcomes from its artifacts on disk.
pub fn extract_outcomes(step: &Step, workspace: &Path) -> BTreeMap<String, Value> {
    let mut outcomes = BTreeMap::new();
    for spec in &step.outcomes {
        let value = step
            .output(&spec.artifact)
            .map(|artifact| workspace.join(&artifact.path))
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|text| serde_json::from_str::<Value>(&text).ok())
            .and_then(|doc| lookup_dot_path(&doc, &spec.path).cloned())
            .unwrap_or(Value::Null);
        outcomes.insert(spec.name.clone(), value);
    }
    outcomes
}

/// Walk a dot-path (`a.b.c`) through objects; numeric segments index arrays.
pub fn lookup_dot_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    if path.is_empty() {
        return Some(current);
    }
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
#[path = "outcomes_tests.rs"]
mod tests;
