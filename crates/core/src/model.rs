// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! Domain model: runbooks, nodes, runs, and execution attempts

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use thiserror::Error;

/// Default per-node timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default `when` expression: always execute
pub const DEFAULT_WHEN: &str = "true";

/// Default post-prompt for manual nodes
pub const DEFAULT_MANUAL_PROMPT: &str = "Continue with the next step?";

/// Errors raised by domain invariants at construction time
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("node '{0}' cannot be both critical and skipped")]
    CriticalSkipped(String),
    #[error("manual node '{0}' requires a non-empty prompt_after")]
    EmptyManualPrompt(String),
}

/// Terminal and transient states of a node execution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Running,
    Ok,
    Nok,
    Skipped,
}

impl NodeStatus {
    /// Whether this status is terminal (the attempt will not change again)
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeStatus::Ok | NodeStatus::Nok | NodeStatus::Skipped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeStatus::Pending => "pending",
            NodeStatus::Running => "running",
            NodeStatus::Ok => "ok",
            NodeStatus::Nok => "nok",
            NodeStatus::Skipped => "skipped",
        }
    }
}

/// Overall state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Ok,
    Nok,
    Aborted,
}

impl RunStatus {
    /// OK and NOK are final; RUNNING and ABORTED can be resumed
    pub fn is_final(self) -> bool {
        matches!(self, RunStatus::Ok | RunStatus::Nok)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Ok => "ok",
            RunStatus::Nok => "nok",
            RunStatus::Aborted => "aborted",
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "ok" => Ok(RunStatus::Ok),
            "nok" => Ok(RunStatus::Nok),
            "aborted" => Ok(RunStatus::Aborted),
            other => Err(format!("unknown run status '{other}'")),
        }
    }
}

/// How a run was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Run,
    Resume,
}

/// The work a node performs, by kind
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Operator approval step
    Manual,
    /// Shell command
    Command { command: String, interactive: bool },
    /// Plugin-dispatched function call
    Function {
        plugin: String,
        function: String,
        params: Map<String, serde_json::Value>,
        plugin_config: Map<String, serde_json::Value>,
    },
}

impl NodeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Manual => "Manual",
            NodeKind::Command { .. } => "Command",
            NodeKind::Function { .. } => "Function",
        }
    }
}

/// A single step in a runbook
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub depends_on: Vec<String>,
    pub critical: bool,
    pub name: String,
    pub description: Option<String>,
    /// Prompt shown before the node runs; empty disables it
    pub prompt_before: String,
    /// Prompt shown after the node runs; empty disables it.
    /// Manual nodes require a non-empty value.
    pub prompt_after: String,
    pub skip: bool,
    /// Template expression gating execution, evaluated at run time
    pub when: String,
    /// Timeout in seconds (enforced for Command nodes)
    pub timeout: u64,
    pub kind: NodeKind,
}

impl Node {
    /// Display name: explicit name, or the id
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// A validated, immutable runbook
#[derive(Debug, Clone)]
pub struct Runbook {
    pub title: String,
    pub description: String,
    pub version: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    /// Nodes in declaration order
    pub nodes: IndexMap<String, Node>,
}

impl Runbook {
    /// Construct a runbook, enforcing per-node invariants.
    ///
    /// Graph-level validation (dependency resolution, acyclicity,
    /// `when` syntax) is the engine's responsibility.
    pub fn new(
        title: String,
        description: String,
        version: String,
        author: String,
        created_at: DateTime<Utc>,
        nodes: IndexMap<String, Node>,
    ) -> Result<Self, ModelError> {
        for (id, node) in &nodes {
            if node.critical && node.skip {
                return Err(ModelError::CriticalSkipped(id.clone()));
            }
            if matches!(node.kind, NodeKind::Manual) && node.prompt_after.is_empty() {
                return Err(ModelError::EmptyManualPrompt(id.clone()));
            }
        }
        Ok(Self {
            title,
            description,
            version,
            author,
            created_at,
            nodes,
        })
    }

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }
}

/// A persisted run of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub workflow_name: String,
    /// Monotonically increasing, scoped to `workflow_name`, assigned by
    /// the run repository
    pub run_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: RunStatus,
    #[serde(default)]
    pub nodes_ok: u32,
    #[serde(default)]
    pub nodes_nok: u32,
    #[serde(default)]
    pub nodes_skipped: u32,
    pub trigger: Trigger,
}

impl RunInfo {
    /// A fresh RUNNING run; the repository assigns the real run id
    pub fn started(workflow_name: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            run_id: 0,
            start_time,
            end_time: None,
            status: RunStatus::Running,
            nodes_ok: 0,
            nodes_nok: 0,
            nodes_skipped: 0,
            trigger: Trigger::Run,
        }
    }
}

/// One attempt at executing a node, persisted append-on-retry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExecution {
    pub workflow_name: String,
    pub run_id: i64,
    pub node_id: String,
    /// Starts at 1, increases by 1 per retry
    pub attempt: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: NodeStatus,
    /// "approved" or "rejected" when an operator decided the outcome
    pub operator_decision: Option<String>,
    pub result_text: Option<String>,
    pub exit_code: Option<i32>,
    pub exception: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub duration_ms: Option<i64>,
}

impl NodeExecution {
    /// A new attempt in RUNNING state
    pub fn running(
        workflow_name: impl Into<String>,
        run_id: i64,
        node_id: impl Into<String>,
        attempt: u32,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            run_id,
            node_id: node_id.into(),
            attempt,
            start_time,
            end_time: None,
            status: NodeStatus::Running,
            operator_decision: None,
            result_text: None,
            exit_code: None,
            exception: None,
            stdout: None,
            stderr: None,
            duration_ms: None,
        }
    }

    /// A terminal SKIPPED attempt with a rationale
    pub fn skipped(
        workflow_name: impl Into<String>,
        run_id: i64,
        node_id: impl Into<String>,
        attempt: u32,
        time: DateTime<Utc>,
        rationale: impl Into<String>,
    ) -> Self {
        let mut execution = Self::running(workflow_name, run_id, node_id, attempt, time);
        execution.status = NodeStatus::Skipped;
        execution.end_time = Some(time);
        execution.result_text = Some(rationale.into());
        execution.duration_ms = Some(0);
        execution
    }

    /// Close the attempt with a terminal status, stamping end time and duration
    pub fn finish(&mut self, status: NodeStatus, end_time: DateTime<Utc>) {
        self.status = status;
        self.end_time = Some(end_time);
        self.duration_ms = Some((end_time - self.start_time).num_milliseconds());
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
