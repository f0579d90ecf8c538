// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! `pb show`: inspect persisted runs and their execution history

use chrono::{DateTime, Utc};
use clap::Args;
use pb_core::ports::{NodeExecutionRepository, RunRepository};
use pb_storage::FileStore;
use std::path::Path;

#[derive(Args)]
pub struct ShowArgs {
    /// Workflow name (the runbook title)
    pub workflow: String,

    /// Show a single run in detail
    #[arg(long)]
    pub run_id: Option<i64>,
}

pub fn show(args: &ShowArgs, state_path: &Path) -> anyhow::Result<i32> {
    let store = FileStore::open(state_path)?;

    match args.run_id {
        None => list_runs(&store, &args.workflow),
        Some(run_id) => show_run(&store, &args.workflow, run_id),
    }
}

fn list_runs(store: &FileStore, workflow: &str) -> anyhow::Result<i32> {
    let runs = store.list_runs(workflow)?;
    if runs.is_empty() {
        println!("No runs found for workflow: {workflow}");
        return Ok(0);
    }

    println!(
        "{:>6}  {:<25}  {:<8}  {:>3}  {:>3}  {:>7}",
        "run", "start time", "status", "ok", "nok", "skipped"
    );
    for run in runs {
        println!(
            "{:>6}  {:<25}  {:<8}  {:>3}  {:>3}  {:>7}",
            run.run_id,
            format_time(Some(run.start_time)),
            run.status.as_str(),
            run.nodes_ok,
            run.nodes_nok,
            run.nodes_skipped
        );
    }
    Ok(0)
}

fn show_run(store: &FileStore, workflow: &str, run_id: i64) -> anyhow::Result<i32> {
    let run = store.get_run(workflow, run_id)?;

    println!("Run: {workflow} #{run_id}");
    println!("Start time: {}", format_time(Some(run.start_time)));
    println!("End time:   {}", format_time(run.end_time));
    println!("Status:     {}", run.status.as_str());
    println!(
        "Nodes ok: {}, nok: {}, skipped: {}",
        run.nodes_ok, run.nodes_nok, run.nodes_skipped
    );

    let executions = store.list_executions(workflow, run_id)?;
    if executions.is_empty() {
        return Ok(0);
    }

    println!("\n{:<20}  {:>7}  {:<8}  {:>10}", "node", "attempt", "status", "duration");
    for execution in executions {
        let duration = execution
            .duration_ms
            .map(|ms| format!("{:.2}s", ms as f64 / 1000.0))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20}  {:>7}  {:<8}  {:>10}",
            execution.node_id,
            execution.attempt,
            execution.status.as_str(),
            duration
        );
    }
    Ok(0)
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".to_string())
}
