// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! Ports consumed by the engine: process execution, operator IO, and
//! the persistence repositories

use crate::model::{NodeExecution, RunInfo};
use std::time::Duration;
use thiserror::Error;

/// Result of running a shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Errors from the process runner itself (a command that ran and failed
/// is a normal `CommandOutput` with a non-zero exit code)
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn command: {0}")]
    Spawn(String),
    #[error("process runner internal error: {0}")]
    Internal(String),
}

/// Shell command execution.
///
/// The runner must enforce `timeout`: on expiry it terminates the
/// process group and yields a non-zero exit code.
pub trait ProcessRunner: Send + Sync {
    fn run(
        &self,
        command: &str,
        timeout: Duration,
        interactive: bool,
    ) -> Result<CommandOutput, ProcessError>;
}

/// Operator-facing input/output for node execution
pub trait IoHandler: Send + Sync {
    /// Show a prompt and return the operator's decision
    fn prompt(&self, node_id: &str, node_name: &str, text: &str) -> bool;

    /// Show a node description or skip rationale
    fn description(&self, node_id: &str, node_name: &str, text: &str);

    /// Show captured command output
    fn command_output(
        &self,
        node_id: &str,
        node_name: &str,
        description: Option<&str>,
        stdout: &str,
        stderr: &str,
    );

    /// Show a function result
    fn function_output(&self, node_id: &str, node_name: &str, description: Option<&str>, result: &str);
}

impl<T: ProcessRunner + ?Sized> ProcessRunner for std::sync::Arc<T> {
    fn run(
        &self,
        command: &str,
        timeout: Duration,
        interactive: bool,
    ) -> Result<CommandOutput, ProcessError> {
        (**self).run(command, timeout, interactive)
    }
}

impl<T: IoHandler + ?Sized> IoHandler for std::sync::Arc<T> {
    fn prompt(&self, node_id: &str, node_name: &str, text: &str) -> bool {
        (**self).prompt(node_id, node_name, text)
    }

    fn description(&self, node_id: &str, node_name: &str, text: &str) {
        (**self).description(node_id, node_name, text)
    }

    fn command_output(
        &self,
        node_id: &str,
        node_name: &str,
        description: Option<&str>,
        stdout: &str,
        stderr: &str,
    ) {
        (**self).command_output(node_id, node_name, description, stdout, stderr)
    }

    fn function_output(&self, node_id: &str, node_name: &str, description: Option<&str>, result: &str) {
        (**self).function_output(node_id, node_name, description, result)
    }
}

/// Errors from the persistence layer; the engine treats these as fatal
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("not found: {kind}/{id}")]
    NotFound { kind: String, id: String },
}

/// Durable store for runs. Run-id allocation must be serialized per
/// workflow so concurrent creates cannot collide.
pub trait RunRepository: Send + Sync {
    /// Persist a new run, assigning the next run id for its workflow
    fn create_run(&self, run: &RunInfo) -> Result<i64, StorageError>;

    /// Idempotent keyed update of status, counts, and end time
    fn update_run(&self, run: &RunInfo) -> Result<(), StorageError>;

    fn get_run(&self, workflow_name: &str, run_id: i64) -> Result<RunInfo, StorageError>;

    /// All runs for a workflow, newest first
    fn list_runs(&self, workflow_name: &str) -> Result<Vec<RunInfo>, StorageError>;
}

/// Durable store for node execution attempts
pub trait NodeExecutionRepository: Send + Sync {
    fn create_execution(&self, execution: &NodeExecution) -> Result<(), StorageError>;

    /// Idempotent keyed update of a previously created attempt
    fn update_execution(&self, execution: &NodeExecution) -> Result<(), StorageError>;

    /// All attempts for a run, ordered by (node_id, attempt)
    fn list_executions(
        &self,
        workflow_name: &str,
        run_id: i64,
    ) -> Result<Vec<NodeExecution>, StorageError>;

    /// The attempt with the highest number for a node, if any
    fn latest_attempt(
        &self,
        workflow_name: &str,
        run_id: i64,
        node_id: &str,
    ) -> Result<Option<NodeExecution>, StorageError>;
}
