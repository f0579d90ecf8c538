// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! Conditional execution: `id:success` / `id:failure` dependency sugar
//! and run-time evaluation of `when` expressions.

use crate::template::{TemplateEngine, TemplateError};
use minijinja::Value as TemplateValue;
use pb_core::model::{NodeExecution, NodeStatus};
use pb_core::value::parse_bool_str;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Unknown conditional suffix on a dependency entry
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid dependency condition '{0}' (expected 'success' or 'failure')")]
pub struct InvalidCondition(pub String);

/// The condition carried by a dependency suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepCondition {
    Success,
    Failure,
}

/// A dependency entry, possibly carrying a conditional suffix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalDependency {
    pub node_id: String,
    pub condition: Option<DepCondition>,
}

impl ConditionalDependency {
    /// Parse `"deploy"`, `"deploy:success"`, or `"deploy:failure"`
    pub fn parse(dependency: &str) -> Result<Self, InvalidCondition> {
        match dependency.split_once(':') {
            None => Ok(Self {
                node_id: dependency.to_string(),
                condition: None,
            }),
            Some((node_id, "success")) => Ok(Self {
                node_id: node_id.to_string(),
                condition: Some(DepCondition::Success),
            }),
            Some((node_id, "failure")) => Ok(Self {
                node_id: node_id.to_string(),
                condition: Some(DepCondition::Failure),
            }),
            Some((_, other)) => Err(InvalidCondition(other.to_string())),
        }
    }

    /// The `when` clause equivalent of this dependency's condition,
    /// without surrounding braces
    pub fn when_clause(&self) -> Option<String> {
        self.condition.map(|condition| match condition {
            DepCondition::Success => format!("has_succeeded(\"{}\")", self.node_id),
            DepCondition::Failure => format!("has_failed(\"{}\")", self.node_id),
        })
    }
}

/// Strip conditional suffixes from a dependency list.
///
/// Returns the plain node ids and the AND-combined clause (braceless)
/// accumulated from any suffixes.
pub fn fold_dependencies(
    dependencies: &[String],
) -> Result<(Vec<String>, Option<String>), InvalidCondition> {
    let mut node_ids = Vec::with_capacity(dependencies.len());
    let mut clauses = Vec::new();

    for dependency in dependencies {
        let parsed = ConditionalDependency::parse(dependency)?;
        if let Some(clause) = parsed.when_clause() {
            clauses.push(clause);
        }
        node_ids.push(parsed.node_id);
    }

    let combined = if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" and "))
    };
    Ok((node_ids, combined))
}

/// Fold a dependency clause into an explicit `when` expression,
/// producing a single template string.
///
/// The result must stay one expression: concatenating separate
/// `{{ }}` blocks would render to a string like `"true and false"`,
/// which boolean coercion treats as truthy.
pub fn combine_when(explicit: &str, clause: Option<&str>) -> String {
    let explicit = explicit.trim();
    let Some(clause) = clause else {
        return explicit.to_string();
    };

    if explicit.is_empty() || explicit == "true" {
        return format!("{{{{ {clause} }}}}");
    }

    let inner = single_expression_body(explicit).unwrap_or(explicit);
    format!("{{{{ {clause} and ({inner}) }}}}")
}

/// If the string is exactly one `{{ expr }}` block, return the body
fn single_expression_body(s: &str) -> Option<&str> {
    let body = s.strip_prefix("{{")?.strip_suffix("}}")?;
    if body.contains("{{") || body.contains("}}") {
        return None;
    }
    Some(body.trim())
}

/// Latest-attempt-per-node view of the current run, consulted by the
/// `when` helper functions
#[derive(Debug, Clone, Default)]
pub struct ConditionContext {
    executions: HashMap<String, NodeExecution>,
}

impl ConditionContext {
    /// Build from the latest attempt of each node
    pub fn new(executions: HashMap<String, NodeExecution>) -> Self {
        Self { executions }
    }

    /// Reduce a full attempt history to the latest attempt per node
    pub fn from_history(history: &[NodeExecution]) -> Self {
        let mut executions: HashMap<String, NodeExecution> = HashMap::new();
        for execution in history {
            let keep = executions
                .get(&execution.node_id)
                .map(|current| execution.attempt > current.attempt)
                .unwrap_or(true);
            if keep {
                executions.insert(execution.node_id.clone(), execution.clone());
            }
        }
        Self { executions }
    }

    fn status_of(&self, node_id: &str) -> Option<NodeStatus> {
        self.executions.get(node_id).map(|e| e.status)
    }
}

/// Evaluate a `when` expression against workflow variables and the
/// execution context, coercing the rendered result to a boolean.
pub fn evaluate_condition(
    engine: &TemplateEngine,
    condition: &str,
    variables: &Map<String, Value>,
    context: &ConditionContext,
) -> Result<bool, TemplateError> {
    let mut env = engine.environment();
    let executions = Arc::new(context.executions.clone());

    {
        let executions = Arc::clone(&executions);
        env.add_function("has_succeeded", move |node_id: String| {
            executions
                .get(&node_id)
                .map(|e| e.status == NodeStatus::Ok)
                .unwrap_or(false)
        });
    }
    {
        let executions = Arc::clone(&executions);
        env.add_function("has_failed", move |node_id: String| {
            executions
                .get(&node_id)
                .map(|e| e.status == NodeStatus::Nok)
                .unwrap_or(false)
        });
    }
    {
        let executions = Arc::clone(&executions);
        env.add_function("has_run", move |node_id: String| {
            executions.contains_key(&node_id)
        });
    }
    {
        let executions = Arc::clone(&executions);
        env.add_function("is_skipped", move |node_id: String| {
            executions
                .get(&node_id)
                .map(|e| e.status == NodeStatus::Skipped)
                .unwrap_or(false)
        });
    }
    {
        let executions = Arc::clone(&executions);
        env.add_function("previous_node", move |node_id: String| {
            let record = match executions.get(&node_id) {
                Some(e) => json!({
                    "exit_code": e.exit_code,
                    "status": e.status.as_str(),
                    "output": e.stdout.clone().or_else(|| e.result_text.clone()),
                    "stdout": e.stdout,
                    "stderr": e.stderr,
                    "result_text": e.result_text,
                    "exists": true,
                }),
                None => json!({
                    "exit_code": null,
                    "status": null,
                    "output": null,
                    "stdout": null,
                    "stderr": null,
                    "result_text": null,
                    "exists": false,
                }),
            };
            TemplateValue::from_serialize(&record)
        });
    }

    let rendered = engine.render_in(&env, condition, variables)?;
    Ok(truthy(&rendered))
}

/// Rendered-string boolean coercion: the usual spellings map to their
/// value, the empty string is false, anything else non-empty is true.
fn truthy(rendered: &str) -> bool {
    let trimmed = rendered.trim();
    if let Some(value) = parse_bool_str(trimmed) {
        return value;
    }
    !trimmed.is_empty()
}

#[cfg(test)]
#[path = "conditions_tests.rs"]
mod tests;
