// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! `pb export-dot`: render the dependency DAG as Graphviz DOT

use clap::Args;
use pb_core::model::{NodeKind, Runbook};
use pb_runbook::RunbookParser;
use serde_json::Map;
use std::path::PathBuf;

#[derive(Args)]
pub struct ExportDotArgs {
    /// Runbook file path
    pub file: PathBuf,

    /// Output DOT file path (defaults to the runbook path with .dot)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub fn export_dot(args: &ExportDotArgs) -> anyhow::Result<i32> {
    let runbook = RunbookParser::new().parse_file(&args.file, &Map::new())?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.file.with_extension("dot"));

    std::fs::write(&output, to_dot(&runbook))?;
    println!("DOT file created: {}", output.display());
    Ok(0)
}

fn to_dot(runbook: &Runbook) -> String {
    let mut dot = String::new();
    dot.push_str("digraph runbook {\n");
    dot.push_str("    rankdir=LR;\n");
    dot.push_str(&format!("    label={};\n", quote(&runbook.title)));
    dot.push_str("    node [fontname=\"Helvetica\"];\n\n");

    for (node_id, node) in &runbook.nodes {
        let shape = match node.kind {
            NodeKind::Manual => "ellipse",
            NodeKind::Command { .. } => "box",
            NodeKind::Function { .. } => "component",
        };
        let mut attrs = vec![
            format!("shape={shape}"),
            format!(
                "label={}",
                quote(&format!("{}\\n({})", node.display_name(), node.kind.type_name()))
            ),
        ];
        if node.critical {
            attrs.push("color=red".to_string());
        }
        if node.skip {
            attrs.push("style=dashed".to_string());
        }
        dot.push_str(&format!("    {} [{}];\n", quote(node_id), attrs.join(", ")));
    }

    dot.push('\n');
    for (node_id, node) in &runbook.nodes {
        for dependency in &node.depends_on {
            dot.push_str(&format!("    {} -> {};\n", quote(dependency), quote(node_id)));
        }
    }

    dot.push_str("}\n");
    dot
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use indexmap::IndexMap;
    use pb_core::model::{Node, DEFAULT_TIMEOUT_SECS, DEFAULT_WHEN};

    fn node(id: &str, deps: &[&str], critical: bool) -> Node {
        Node {
            id: id.to_string(),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            critical,
            name: id.to_string(),
            description: None,
            prompt_before: String::new(),
            prompt_after: String::new(),
            skip: false,
            when: DEFAULT_WHEN.to_string(),
            timeout: DEFAULT_TIMEOUT_SECS,
            kind: NodeKind::Command {
                command: "true".to_string(),
                interactive: false,
            },
        }
    }

    #[test]
    fn dot_output_has_nodes_and_edges() {
        let nodes: IndexMap<String, Node> = [node("build", &[], false), node("deploy", &["build"], true)]
            .into_iter()
            .map(|n| (n.id.clone(), n))
            .collect();
        let runbook = Runbook::new(
            "demo".to_string(),
            "d".to_string(),
            "1".to_string(),
            "a".to_string(),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            nodes,
        )
        .unwrap();

        let dot = to_dot(&runbook);
        assert!(dot.contains("\"build\" -> \"deploy\""));
        assert!(dot.contains("shape=box"));
        assert!(dot.contains("color=red"));
    }
}
