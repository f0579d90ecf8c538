// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! Topological ordering with cycle detection

use crate::validate::{ValidationError, ValidationErrors};
use pb_core::model::Runbook;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Depth-first topological sort of the dependency graph.
///
/// Nodes are visited in declaration order and appended after their
/// dependencies, so every node follows everything it depends on.
/// Nodes unreachable from any sink are still included. A cycle
/// (including a self-loop) is a validation error.
pub fn execution_order(runbook: &Runbook) -> Result<Vec<String>, ValidationErrors> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut order: Vec<String> = Vec::with_capacity(runbook.nodes.len());

    for node_id in runbook.nodes.keys() {
        visit(runbook, node_id, &mut marks, &mut order).map_err(|error| ValidationErrors {
            errors: vec![error],
        })?;
    }

    Ok(order)
}

fn visit<'a>(
    runbook: &'a Runbook,
    node_id: &'a str,
    marks: &mut HashMap<&'a str, Mark>,
    order: &mut Vec<String>,
) -> Result<(), ValidationError> {
    match marks.get(node_id) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::InProgress) => {
            return Err(ValidationError::Cycle {
                node: node_id.to_string(),
            })
        }
        None => {}
    }

    marks.insert(node_id, Mark::InProgress);

    let node = runbook
        .nodes
        .get(node_id)
        .ok_or_else(|| ValidationError::UnknownDependency {
            node: node_id.to_string(),
            dependency: node_id.to_string(),
        })?;
    for dependency in &node.depends_on {
        let dependency =
            runbook
                .nodes
                .get_key_value(dependency.as_str())
                .map(|(k, _)| k.as_str())
                .ok_or_else(|| ValidationError::UnknownDependency {
                    node: node_id.to_string(),
                    dependency: dependency.clone(),
                })?;
        visit(runbook, dependency, marks, order)?;
    }

    marks.insert(node_id, Mark::Done);
    order.push(node_id.to_string());
    Ok(())
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
