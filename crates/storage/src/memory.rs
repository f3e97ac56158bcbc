// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory state store

use crate::store::{
    ArtifactRow, EventQuery, EventRow, ListRunsOptions, StateStore, StoreError,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use wave_core::{RunId, RunRecord, StepId};

#[derive(Default)]
struct MemoryState {
    runs: Vec<RunRecord>,
    events: HashMap<RunId, Vec<EventRow>>,
    artifacts: HashMap<RunId, Vec<ArtifactRow>>,
}

/// Process-local store; everything lives behind one lock.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total logged event count across runs (test convenience).
    pub fn event_count(&self) -> usize {
        self.state.lock().events.values().map(Vec::len).sum()
    }
}

impl StateStore for MemoryStore {
    fn create_run(&self, record: RunRecord) -> Result<(), StoreError> {
        self.state.lock().runs.push(record);
        Ok(())
    }

    fn update_run(&self, record: RunRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        match state.runs.iter_mut().find(|r| r.run_id == record.run_id) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(StoreError::RunNotFound(record.run_id.to_string())),
        }
    }

    fn get_run(&self, run_id: &RunId) -> Result<RunRecord, StoreError> {
        self.state
            .lock()
            .runs
            .iter()
            .find(|r| r.run_id == *run_id)
            .cloned()
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))
    }

    fn list_runs(&self, opts: ListRunsOptions) -> Result<Vec<RunRecord>, StoreError> {
        let state = self.state.lock();
        let mut runs: Vec<RunRecord> = state
            .runs
            .iter()
            .filter(|r| {
                opts.pipeline
                    .as_deref()
                    .is_none_or(|name| r.pipeline_name == name)
            })
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at_epoch_ms.cmp(&a.created_at_epoch_ms));
        if opts.limit > 0 {
            runs.truncate(opts.limit);
        }
        Ok(runs)
    }

    fn log_event(&self, row: EventRow) -> Result<(), StoreError> {
        self.state
            .lock()
            .events
            .entry(row.run_id.clone())
            .or_default()
            .push(row);
        Ok(())
    }

    fn get_events(&self, run_id: &RunId, query: EventQuery) -> Result<Vec<EventRow>, StoreError> {
        let state = self.state.lock();
        let mut rows: Vec<EventRow> = state
            .events
            .get(run_id)
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        query
                            .step_id
                            .as_ref()
                            .is_none_or(|step| row.step_id.as_ref() == Some(step))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if query.limit > 0 {
            rows.truncate(query.limit);
        }
        Ok(rows)
    }

    fn record_artifact(&self, row: ArtifactRow) -> Result<(), StoreError> {
        self.state
            .lock()
            .artifacts
            .entry(row.run_id.clone())
            .or_default()
            .push(row);
        Ok(())
    }

    fn get_artifacts(
        &self,
        run_id: &RunId,
        step_id: &StepId,
    ) -> Result<Vec<ArtifactRow>, StoreError> {
        Ok(self
            .state
            .lock()
            .artifacts
            .get(run_id)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.step_id == *step_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
