// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! The runbook execution engine.
//!
//! Advances one node at a time through the topological order, creating
//! an attempt record per execution, dispatching by node kind through
//! the external ports, and aggregating run status from the latest
//! attempt of each node.

use crate::validate::{self, ValidationErrors};
use pb_core::model::{
    Node, NodeExecution, NodeKind, NodeStatus, RunInfo, RunStatus, Runbook, Trigger,
};
use pb_core::plugin::{validate_params, PluginError, PluginRegistry};
use pb_core::ports::{
    IoHandler, NodeExecutionRepository, ProcessRunner, RunRepository, StorageError,
};
use pb_core::Clock;
use pb_runbook::{evaluate_condition, ConditionContext, TemplateEngine};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Engine-level failures. Errors inside a node's execution are captured
/// into its attempt record and do not surface here; persistence errors
/// always do.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("unknown node '{0}'")]
    UnknownNode(String),
    #[error("start node '{0}' not found in runbook")]
    UnknownStartNode(String),
    #[error("cannot resume run {run_id} with status {status}")]
    NotResumable { run_id: i64, status: &'static str },
    #[error("node '{node}' has no attempt to skip")]
    NothingToSkip { node: String },
    #[error("retry attempt {attempt} for node '{node}' must exceed latest attempt {latest}")]
    InvalidAttempt {
        node: String,
        attempt: u32,
        latest: u32,
    },
}

/// Outcome of a node's internal execution, before it is copied into
/// the attempt record
#[derive(Debug, Default)]
struct NodeOutcome {
    status: Option<NodeStatus>,
    operator_decision: Option<String>,
    result_text: Option<String>,
    exit_code: Option<i32>,
    exception: Option<String>,
    stdout: Option<String>,
    stderr: Option<String>,
}

impl NodeOutcome {
    fn rejected() -> Self {
        Self {
            status: Some(NodeStatus::Nok),
            operator_decision: Some("rejected".to_string()),
            ..Self::default()
        }
    }
}

/// Core engine for executing runbooks
pub struct Engine<C: Clock, P: ProcessRunner, H: IoHandler> {
    clock: C,
    process: P,
    io: H,
    runs: Arc<dyn RunRepository>,
    executions: Arc<dyn NodeExecutionRepository>,
    plugins: Arc<PluginRegistry>,
    templates: TemplateEngine,
}

impl<C: Clock, P: ProcessRunner, H: IoHandler> Engine<C, P, H> {
    pub fn new(
        clock: C,
        process: P,
        io: H,
        runs: Arc<dyn RunRepository>,
        executions: Arc<dyn NodeExecutionRepository>,
        plugins: Arc<PluginRegistry>,
    ) -> Self {
        Self {
            clock,
            process,
            io,
            runs,
            executions,
            plugins,
            templates: TemplateEngine::new(),
        }
    }

    /// Validate the runbook graph and `when` syntax
    pub fn validate(&self, runbook: &Runbook) -> Result<(), ValidationErrors> {
        validate::validate(runbook)
    }

    /// Topological execution order
    pub fn execution_order(&self, runbook: &Runbook) -> Result<Vec<String>, ValidationErrors> {
        crate::graph::execution_order(runbook)
    }

    /// Validate the runbook and persist a new RUNNING run. The
    /// repository assigns the next run id for this workflow.
    pub fn start_run(&self, runbook: &Runbook) -> Result<RunInfo, EngineError> {
        self.validate(runbook)?;

        let mut run = RunInfo::started(&runbook.title, self.clock.now());
        run.run_id = self.runs.create_run(&run)?;
        tracing::info!(workflow = %runbook.title, run_id = run.run_id, "started run");
        Ok(run)
    }

    /// Re-open an existing run. Only RUNNING and ABORTED runs are
    /// resumable; OK and NOK are final.
    pub fn resume_run(&self, runbook: &Runbook, run_id: i64) -> Result<RunInfo, EngineError> {
        let mut run = self.runs.get_run(&runbook.title, run_id)?;

        if run.status.is_final() {
            return Err(EngineError::NotResumable {
                run_id,
                status: run.status.as_str(),
            });
        }

        run.status = RunStatus::Running;
        run.trigger = Trigger::Resume;
        run.end_time = None;
        self.runs.update_run(&run)?;
        tracing::info!(workflow = %runbook.title, run_id, "resumed run");
        Ok(run)
    }

    /// Select the nodes to execute.
    ///
    /// A fresh run executes the whole order. A resumed run starts at
    /// `start_node` (or the beginning) and includes every node whose
    /// latest attempt is not OK or SKIPPED.
    pub fn nodes_to_run(
        &self,
        runbook: &Runbook,
        run: &RunInfo,
        order: &[String],
        start_node: Option<&str>,
    ) -> Result<Vec<String>, EngineError> {
        if run.trigger == Trigger::Run {
            return Ok(order.to_vec());
        }

        let start_index = match start_node {
            None => 0,
            Some(id) => order
                .iter()
                .position(|n| n == id)
                .ok_or_else(|| EngineError::UnknownStartNode(id.to_string()))?,
        };

        let latest = self.latest_per_node(&runbook.title, run.run_id)?;
        Ok(order[start_index..]
            .iter()
            .filter(|node_id| {
                latest
                    .get(node_id.as_str())
                    .map(|e| !matches!(e.status, NodeStatus::Ok | NodeStatus::Skipped))
                    .unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    /// Execute a single node: skip short-circuit, `when` gate, attempt
    /// creation, dispatch, attempt update.
    pub fn execute_node(
        &self,
        runbook: &Runbook,
        node_id: &str,
        run: &RunInfo,
        variables: &Map<String, Value>,
    ) -> Result<(NodeStatus, NodeExecution), EngineError> {
        let node = runbook
            .get_node(node_id)
            .ok_or_else(|| EngineError::UnknownNode(node_id.to_string()))?;

        let latest = self
            .executions
            .latest_attempt(&runbook.title, run.run_id, node_id)?;
        let attempt = latest.map(|e| e.attempt + 1).unwrap_or(1);

        // Structural skip implies critical=false by domain invariant
        if node.skip {
            return self.record_skip(runbook, node, run, attempt, "Node skipped (skip = true)");
        }

        // Conditional skip: evaluate `when` against the latest attempts
        let history = self.executions.list_executions(&runbook.title, run.run_id)?;
        let context = ConditionContext::from_history(&history);
        let should_execute =
            match evaluate_condition(&self.templates, &node.when, variables, &context) {
                Ok(result) => result,
                Err(e) => {
                    // Fail open: a broken expression must never
                    // silently skip work
                    tracing::warn!(
                        node = node_id,
                        condition = %node.when,
                        error = %e,
                        "condition evaluation failed, defaulting to execute"
                    );
                    true
                }
            };
        if !should_execute {
            let rationale = format!("Node skipped due to condition: {}", node.when);
            return self.record_skip(runbook, node, run, attempt, &rationale);
        }

        let start_time = self.clock.now();
        let mut execution =
            NodeExecution::running(&runbook.title, run.run_id, node_id, attempt, start_time);
        self.executions.create_execution(&execution)?;

        let outcome = self.execute_internal(node);
        self.close_attempt(&mut execution, outcome)?;
        Ok((execution.status, execution))
    }

    /// Run a fresh attempt with an explicit attempt number, which must
    /// exceed the current latest. Gates are not re-evaluated: a retry
    /// is an explicit operator decision.
    pub fn execute_node_retry(
        &self,
        runbook: &Runbook,
        node_id: &str,
        run: &RunInfo,
        attempt: u32,
    ) -> Result<(NodeStatus, NodeExecution), EngineError> {
        let node = runbook
            .get_node(node_id)
            .ok_or_else(|| EngineError::UnknownNode(node_id.to_string()))?;

        let latest = self
            .executions
            .latest_attempt(&runbook.title, run.run_id, node_id)?
            .map(|e| e.attempt)
            .unwrap_or(0);
        if attempt <= latest {
            return Err(EngineError::InvalidAttempt {
                node: node_id.to_string(),
                attempt,
                latest,
            });
        }

        let start_time = self.clock.now();
        let mut execution =
            NodeExecution::running(&runbook.title, run.run_id, node_id, attempt, start_time);
        self.executions.create_execution(&execution)?;

        let outcome = self.execute_internal(node);
        self.close_attempt(&mut execution, outcome)?;
        Ok((execution.status, execution))
    }

    /// Mutate the latest attempt of a failed node to SKIPPED
    pub fn skip_failed_node(
        &self,
        run: &RunInfo,
        node_id: &str,
    ) -> Result<NodeExecution, EngineError> {
        let mut execution = self
            .executions
            .latest_attempt(&run.workflow_name, run.run_id, node_id)?
            .ok_or_else(|| EngineError::NothingToSkip {
                node: node_id.to_string(),
            })?;
        execution.status = NodeStatus::Skipped;
        self.executions.update_execution(&execution)?;
        tracing::info!(node = node_id, "node skipped after failure");
        Ok(execution)
    }

    /// Transition the run to ABORTED
    pub fn abort_run(&self, run: &mut RunInfo) -> Result<(), EngineError> {
        run.status = RunStatus::Aborted;
        run.end_time = Some(self.clock.now());
        self.runs.update_run(run)?;
        tracing::warn!(workflow = %run.workflow_name, run_id = run.run_id, "run aborted");
        Ok(())
    }

    /// Aggregate run status from the latest attempt per node.
    ///
    /// Counts are always persisted, even when the status is unchanged.
    /// A NOK latest attempt on a critical node makes the run NOK
    /// immediately; otherwise the run terminates once every node has a
    /// terminal latest attempt. An out-of-band ABORTED transition is
    /// adopted here.
    pub fn update_run_status(
        &self,
        runbook: &Runbook,
        run: &mut RunInfo,
    ) -> Result<RunStatus, EngineError> {
        let stored = self.runs.get_run(&run.workflow_name, run.run_id)?;
        if stored.status == RunStatus::Aborted && run.status != RunStatus::Aborted {
            tracing::warn!(
                workflow = %run.workflow_name,
                run_id = run.run_id,
                "run was aborted out of band"
            );
            run.status = RunStatus::Aborted;
            run.end_time = stored.end_time;
        }

        let latest = self.latest_per_node(&run.workflow_name, run.run_id)?;

        run.nodes_ok = 0;
        run.nodes_nok = 0;
        run.nodes_skipped = 0;
        for execution in latest.values() {
            match execution.status {
                NodeStatus::Ok => run.nodes_ok += 1,
                NodeStatus::Nok => run.nodes_nok += 1,
                NodeStatus::Skipped => run.nodes_skipped += 1,
                NodeStatus::Pending | NodeStatus::Running => {}
            }
        }

        if run.status == RunStatus::Aborted {
            self.runs.update_run(run)?;
            return Ok(RunStatus::Aborted);
        }

        let critical_failure = latest.iter().any(|(node_id, execution)| {
            execution.status == NodeStatus::Nok
                && runbook
                    .get_node(node_id)
                    .map(|n| n.critical)
                    .unwrap_or(false)
        });
        if critical_failure {
            run.status = RunStatus::Nok;
            if run.end_time.is_none() {
                run.end_time = Some(self.clock.now());
            }
            self.runs.update_run(run)?;
            tracing::error!(
                workflow = %run.workflow_name,
                run_id = run.run_id,
                "critical node failed, run is nok"
            );
            return Ok(RunStatus::Nok);
        }

        let all_terminal = runbook.nodes.keys().all(|node_id| {
            latest
                .get(node_id.as_str())
                .map(|e| e.status.is_terminal())
                .unwrap_or(false)
        });
        if all_terminal {
            run.status = if run.nodes_nok > 0 {
                RunStatus::Nok
            } else {
                RunStatus::Ok
            };
            if run.end_time.is_none() {
                run.end_time = Some(self.clock.now());
            }
            self.runs.update_run(run)?;
            tracing::info!(
                workflow = %run.workflow_name,
                run_id = run.run_id,
                status = run.status.as_str(),
                "run finished"
            );
            return Ok(run.status);
        }

        self.runs.update_run(run)?;
        Ok(RunStatus::Running)
    }

    /// Drive a node selection in order with no retries, stopping when
    /// aggregation leaves RUNNING (critical failure, completion, or an
    /// abort). Interactive retry/skip/abort loops belong to the caller.
    pub fn run_to_completion(
        &self,
        runbook: &Runbook,
        run: &mut RunInfo,
        nodes: &[String],
        variables: &Map<String, Value>,
    ) -> Result<RunStatus, EngineError> {
        for node_id in nodes {
            self.execute_node(runbook, node_id, run, variables)?;
            let status = self.update_run_status(runbook, run)?;
            if status != RunStatus::Running {
                return Ok(status);
            }
        }
        self.update_run_status(runbook, run)
    }

    /// Latest attempt per node for a run
    fn latest_per_node(
        &self,
        workflow_name: &str,
        run_id: i64,
    ) -> Result<HashMap<String, NodeExecution>, EngineError> {
        let history = self.executions.list_executions(workflow_name, run_id)?;
        let mut latest: HashMap<String, NodeExecution> = HashMap::new();
        for execution in history {
            let keep = latest
                .get(&execution.node_id)
                .map(|current| execution.attempt > current.attempt)
                .unwrap_or(true);
            if keep {
                latest.insert(execution.node_id.clone(), execution);
            }
        }
        Ok(latest)
    }

    fn record_skip(
        &self,
        runbook: &Runbook,
        node: &Node,
        run: &RunInfo,
        attempt: u32,
        rationale: &str,
    ) -> Result<(NodeStatus, NodeExecution), EngineError> {
        let execution = NodeExecution::skipped(
            &runbook.title,
            run.run_id,
            &node.id,
            attempt,
            self.clock.now(),
            rationale,
        );
        self.executions.create_execution(&execution)?;
        self.io.description(&node.id, node.display_name(), rationale);
        tracing::info!(node = %node.id, rationale, "node skipped");
        Ok((NodeStatus::Skipped, execution))
    }

    fn close_attempt(
        &self,
        execution: &mut NodeExecution,
        outcome: NodeOutcome,
    ) -> Result<(), EngineError> {
        execution.operator_decision = outcome.operator_decision;
        execution.result_text = outcome.result_text;
        execution.exit_code = outcome.exit_code;
        execution.exception = outcome.exception;
        execution.stdout = outcome.stdout;
        execution.stderr = outcome.stderr;
        execution.finish(
            outcome.status.unwrap_or(NodeStatus::Nok),
            self.clock.now(),
        );
        self.executions.update_execution(execution)?;
        tracing::info!(
            node = %execution.node_id,
            attempt = execution.attempt,
            status = execution.status.as_str(),
            "attempt finished"
        );
        Ok(())
    }

    /// Dispatch by node kind. Failures are captured into the outcome,
    /// never propagated.
    fn execute_internal(&self, node: &Node) -> NodeOutcome {
        if !node.prompt_before.is_empty()
            && !self
                .io
                .prompt(&node.id, node.display_name(), &node.prompt_before)
        {
            return NodeOutcome::rejected();
        }

        match &node.kind {
            NodeKind::Manual => self.execute_manual(node),
            NodeKind::Command {
                command,
                interactive,
            } => self.execute_command(node, command, *interactive),
            NodeKind::Function {
                plugin,
                function,
                params,
                plugin_config,
            } => self.execute_function(node, plugin, function, params, plugin_config),
        }
    }

    fn execute_manual(&self, node: &Node) -> NodeOutcome {
        if let Some(description) = &node.description {
            self.io.description(&node.id, node.display_name(), description);
        }

        // prompt_after is mandatory for manual nodes
        let approved = self
            .io
            .prompt(&node.id, node.display_name(), &node.prompt_after);
        NodeOutcome {
            status: Some(if approved { NodeStatus::Ok } else { NodeStatus::Nok }),
            operator_decision: Some(if approved { "approved" } else { "rejected" }.to_string()),
            ..NodeOutcome::default()
        }
    }

    fn execute_command(&self, node: &Node, command: &str, interactive: bool) -> NodeOutcome {
        let timeout = Duration::from_secs(node.timeout);
        match self.process.run(command, timeout, interactive) {
            Ok(output) => {
                let mut outcome = NodeOutcome {
                    status: Some(if output.exit_code == 0 {
                        NodeStatus::Ok
                    } else {
                        NodeStatus::Nok
                    }),
                    exit_code: Some(output.exit_code),
                    stdout: Some(output.stdout.clone()),
                    stderr: Some(output.stderr.clone()),
                    ..NodeOutcome::default()
                };

                if !output.stdout.is_empty() || !output.stderr.is_empty() {
                    self.io.command_output(
                        &node.id,
                        node.display_name(),
                        node.description.as_deref(),
                        &output.stdout,
                        &output.stderr,
                    );
                }

                // Confirm success only; a failed command never prompts
                if outcome.status == Some(NodeStatus::Ok)
                    && !node.prompt_after.is_empty()
                    && !self
                        .io
                        .prompt(&node.id, node.display_name(), &node.prompt_after)
                {
                    outcome.status = Some(NodeStatus::Nok);
                    outcome.operator_decision = Some("rejected".to_string());
                }
                outcome
            }
            Err(e) => NodeOutcome {
                status: Some(NodeStatus::Nok),
                exception: Some(e.to_string()),
                ..NodeOutcome::default()
            },
        }
    }

    fn execute_function(
        &self,
        node: &Node,
        plugin: &str,
        function: &str,
        params: &Map<String, Value>,
        plugin_config: &Map<String, Value>,
    ) -> NodeOutcome {
        match self.call_plugin(plugin, function, params, plugin_config) {
            Ok(result_text) => {
                let mut outcome = NodeOutcome {
                    status: Some(NodeStatus::Ok),
                    result_text: Some(result_text.clone()),
                    ..NodeOutcome::default()
                };

                if !result_text.is_empty() {
                    self.io.function_output(
                        &node.id,
                        node.display_name(),
                        node.description.as_deref(),
                        &result_text,
                    );

                    if !node.prompt_after.is_empty()
                        && !self
                            .io
                            .prompt(&node.id, node.display_name(), &node.prompt_after)
                    {
                        outcome.status = Some(NodeStatus::Nok);
                        outcome.operator_decision = Some("rejected".to_string());
                    }
                }
                outcome
            }
            Err(e) => NodeOutcome {
                status: Some(NodeStatus::Nok),
                exception: Some(e.to_string()),
                ..NodeOutcome::default()
            },
        }
    }

    fn call_plugin(
        &self,
        plugin_name: &str,
        function: &str,
        params: &Map<String, Value>,
        plugin_config: &Map<String, Value>,
    ) -> Result<String, PluginError> {
        let instance = self.plugins.get(plugin_name, plugin_config)?;
        let mut plugin = instance.lock().unwrap_or_else(|e| e.into_inner());

        let metadata = plugin.metadata();
        let validated = validate_params(&metadata, function, params)?;

        let result = plugin.execute(function, &validated).map_err(|e| match e {
            already @ PluginError::Execution { .. } => already,
            other => PluginError::Execution {
                plugin: plugin_name.to_string(),
                function: function.to_string(),
                message: other.to_string(),
            },
        })?;

        Ok(stringify_result(&result))
    }
}

/// Plugin results persist as text in `result_text`
fn stringify_result(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
