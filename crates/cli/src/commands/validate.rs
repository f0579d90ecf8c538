// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! `pb validate`: parse and validate a runbook file.
//!
//! Runbooks may declare required variables, so the same variable
//! sources as `pb run` are accepted; `--check-vars` lists the declared
//! variables with their constraints.

use crate::commands::run::{collect_variables, VarArgs};
use anyhow::Context;
use clap::Args;
use indexmap::IndexMap;
use pb_core::model::NodeKind;
use pb_core::value::{VarType, VariableDefinition};
use pb_runbook::RunbookParser;
use std::path::PathBuf;

#[derive(Args)]
pub struct ValidateArgs {
    /// Runbook file path
    pub file: PathBuf,

    /// Show variable information
    #[arg(long)]
    pub check_vars: bool,

    #[command(flatten)]
    pub var_args: VarArgs,
}

pub fn validate(args: &ValidateArgs) -> anyhow::Result<i32> {
    let parser = RunbookParser::new();

    if args.check_vars {
        let content = std::fs::read_to_string(&args.file)
            .with_context(|| format!("cannot read {}", args.file.display()))?;
        let definitions = parser.variable_definitions(&content)?;
        print_variable_information(&definitions);
    }

    let variables = collect_variables(&args.var_args)?;

    println!("Parsing runbook: {}", args.file.display());
    let runbook = parser.parse_file(&args.file, &variables)?;

    println!("Validating runbook...");
    pb_engine::validate(&runbook)?;

    println!("Runbook is valid!");
    println!("\nRunbook: {}", runbook.title);
    println!("Description: {}", runbook.description);
    println!("Version: {}", runbook.version);
    println!("Author: {}", runbook.author);
    println!("Created: {}", runbook.created_at.to_rfc3339());
    println!("Nodes: {}", runbook.nodes.len());

    let count = |predicate: fn(&NodeKind) -> bool| {
        runbook.nodes.values().filter(|n| predicate(&n.kind)).count()
    };
    println!("  manual nodes: {}", count(|k| matches!(k, NodeKind::Manual)));
    println!(
        "  command nodes: {}",
        count(|k| matches!(k, NodeKind::Command { .. }))
    );
    println!(
        "  function nodes: {}",
        count(|k| matches!(k, NodeKind::Function { .. }))
    );
    println!(
        "  skipped nodes: {}",
        runbook.nodes.values().filter(|n| n.skip).count()
    );

    Ok(0)
}

fn print_variable_information(definitions: &IndexMap<String, VariableDefinition>) {
    if definitions.is_empty() {
        println!("No variables defined in this workflow");
        return;
    }

    let required: Vec<_> = definitions.iter().filter(|(_, d)| d.required).collect();
    let optional: Vec<_> = definitions.iter().filter(|(_, d)| !d.required).collect();

    println!("Variables ({}):", definitions.len());
    if !required.is_empty() {
        println!("\nRequired variables ({}):", required.len());
        for (name, definition) in &required {
            print_variable(name, definition);
        }
    }
    if !optional.is_empty() {
        println!("\nOptional variables ({}):", optional.len());
        for (name, definition) in &optional {
            print_variable(name, definition);
        }
    }
    println!();
}

fn print_variable(name: &str, definition: &VariableDefinition) {
    let mut details = Vec::new();
    if definition.var_type != VarType::String {
        details.push(format!("type: {}", definition.var_type));
    }
    if let Some(default) = &definition.default {
        details.push(format!("default: {default}"));
    }
    if let Some(choices) = &definition.choices {
        let rendered: Vec<String> = choices.iter().map(|c| c.to_string()).collect();
        details.push(format!("choices: [{}]", rendered.join(", ")));
    }
    if let Some(min) = definition.min {
        details.push(format!("min: {min}"));
    }
    if let Some(max) = definition.max {
        details.push(format!("max: {max}"));
    }
    if let Some(pattern) = &definition.pattern {
        details.push(format!("pattern: {pattern}"));
    }

    let details = if details.is_empty() {
        String::new()
    } else {
        format!(" ({})", details.join(", "))
    };
    let description = definition
        .description
        .as_deref()
        .map(|d| format!(" - {d}"))
        .unwrap_or_default();

    println!("  - {name}{details}{description}");
}
