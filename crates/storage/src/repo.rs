// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! Run and node-execution repositories over the JSON store.
//!
//! Runs live at `runs/<workflow>/<run_id>.json`, attempts at
//! `executions/<workflow>/<run_id>/<node>@<attempt>.json`. The engine
//! is the only writer for a given run; the store mutex serializes
//! run-id allocation so concurrent creates cannot collide.

use crate::json::JsonStore;
use pb_core::model::{NodeExecution, RunInfo};
use pb_core::ports::{NodeExecutionRepository, RunRepository, StorageError};
use std::path::Path;
use std::sync::Mutex;

/// File-backed implementation of both persistence repositories
pub struct FileStore {
    store: JsonStore,
    alloc: Mutex<()>,
}

impl FileStore {
    /// Open (or create) a state directory
    pub fn open(base_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Ok(Self {
            store: JsonStore::open(base_path.as_ref())?,
            alloc: Mutex::new(()),
        })
    }

    fn runs_kind(workflow_name: &str) -> String {
        format!("runs/{}", sanitize(workflow_name))
    }

    fn executions_kind(workflow_name: &str, run_id: i64) -> String {
        format!("executions/{}/{run_id}", sanitize(workflow_name))
    }

    fn execution_id(node_id: &str, attempt: u32) -> String {
        format!("{node_id}@{attempt}")
    }
}

impl RunRepository for FileStore {
    fn create_run(&self, run: &RunInfo) -> Result<i64, StorageError> {
        let _guard = self.alloc.lock().unwrap_or_else(|e| e.into_inner());

        let kind = Self::runs_kind(&run.workflow_name);
        let next_id = self
            .store
            .list(&kind)?
            .iter()
            .filter_map(|id| id.parse::<i64>().ok())
            .max()
            .unwrap_or(0)
            + 1;

        let mut record = run.clone();
        record.run_id = next_id;
        self.store.save(&kind, &next_id.to_string(), &record)?;
        tracing::debug!(workflow = %run.workflow_name, run_id = next_id, "created run");
        Ok(next_id)
    }

    fn update_run(&self, run: &RunInfo) -> Result<(), StorageError> {
        let kind = Self::runs_kind(&run.workflow_name);
        let id = run.run_id.to_string();
        if !self.store.exists(&kind, &id) {
            return Err(StorageError::NotFound { kind, id });
        }
        self.store.save(&kind, &id, run)
    }

    fn get_run(&self, workflow_name: &str, run_id: i64) -> Result<RunInfo, StorageError> {
        self.store
            .load(&Self::runs_kind(workflow_name), &run_id.to_string())
    }

    fn list_runs(&self, workflow_name: &str) -> Result<Vec<RunInfo>, StorageError> {
        let kind = Self::runs_kind(workflow_name);
        let mut runs = Vec::new();
        for id in self.store.list(&kind)? {
            runs.push(self.store.load::<RunInfo>(&kind, &id)?);
        }
        runs.sort_by(|a, b| b.run_id.cmp(&a.run_id));
        Ok(runs)
    }
}

impl NodeExecutionRepository for FileStore {
    fn create_execution(&self, execution: &NodeExecution) -> Result<(), StorageError> {
        let kind = Self::executions_kind(&execution.workflow_name, execution.run_id);
        self.store.save(
            &kind,
            &Self::execution_id(&execution.node_id, execution.attempt),
            execution,
        )
    }

    fn update_execution(&self, execution: &NodeExecution) -> Result<(), StorageError> {
        let kind = Self::executions_kind(&execution.workflow_name, execution.run_id);
        let id = Self::execution_id(&execution.node_id, execution.attempt);
        if !self.store.exists(&kind, &id) {
            return Err(StorageError::NotFound { kind, id });
        }
        self.store.save(&kind, &id, execution)
    }

    fn list_executions(
        &self,
        workflow_name: &str,
        run_id: i64,
    ) -> Result<Vec<NodeExecution>, StorageError> {
        let kind = Self::executions_kind(workflow_name, run_id);
        let mut executions = Vec::new();
        for id in self.store.list(&kind)? {
            executions.push(self.store.load::<NodeExecution>(&kind, &id)?);
        }
        executions.sort_by(|a, b| {
            a.node_id
                .cmp(&b.node_id)
                .then_with(|| a.attempt.cmp(&b.attempt))
        });
        Ok(executions)
    }

    fn latest_attempt(
        &self,
        workflow_name: &str,
        run_id: i64,
        node_id: &str,
    ) -> Result<Option<NodeExecution>, StorageError> {
        let executions = self.list_executions(workflow_name, run_id)?;
        Ok(executions
            .into_iter()
            .filter(|e| e.node_id == node_id)
            .max_by_key(|e| e.attempt))
    }
}

/// Workflow titles become directory names; the canonical name lives
/// inside the record.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "repo_tests.rs"]
mod tests;
