// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! Semantic validation of runbooks, independent of parsing:
//! reference integrity, acyclicity, and `when` expression syntax.

use crate::graph;
use pb_core::model::Runbook;
use pb_runbook::TemplateEngine;

/// A single validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `depends_on` names a node that does not exist
    UnknownDependency { node: String, dependency: String },
    /// The dependency graph contains a cycle through this node
    Cycle { node: String },
    /// A `when` expression does not parse under the template grammar
    InvalidWhen { node: String, message: String },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::UnknownDependency { node, dependency } => write!(
                f,
                "node '{node}' depends on non-existent node '{dependency}'"
            ),
            ValidationError::Cycle { node } => {
                write!(f, "dependency cycle detected at node '{node}'")
            }
            ValidationError::InvalidWhen { node, message } => {
                write!(f, "invalid 'when' condition on node '{node}': {message}")
            }
        }
    }
}

/// Collection of validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    pub errors: Vec<ValidationError>,
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "runbook validation failed with {} error(s):",
            self.errors.len()
        )?;
        for (i, error) in self.errors.iter().enumerate() {
            writeln!(f, "  {}: {}", i + 1, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Validate a runbook: every `depends_on` reference resolves, the graph
/// is acyclic, and every `when` expression parses.
///
/// Unresolved references are reported before cycle detection; cycle
/// detection over a graph with dangling edges is undefined.
pub fn validate(runbook: &Runbook) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();

    for (node_id, node) in &runbook.nodes {
        for dependency in &node.depends_on {
            if !runbook.nodes.contains_key(dependency) {
                errors.push(ValidationError::UnknownDependency {
                    node: node_id.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        if let Err(cycle_errors) = graph::execution_order(runbook) {
            errors.extend(cycle_errors.errors);
        }
    }

    let templates = TemplateEngine::new();
    for (node_id, node) in &runbook.nodes {
        if let Err(e) = templates.check_syntax(&node.when) {
            errors.push(ValidationError::InvalidWhen {
                node: node_id.clone(),
                message: e.to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors { errors })
    }
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
