// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! `pb set-status`: force-transition a run out of band (typically to
//! `aborted` so it can be resumed)

use anyhow::anyhow;
use chrono::Utc;
use clap::Args;
use pb_core::model::RunStatus;
use pb_core::ports::RunRepository;
use pb_storage::FileStore;
use std::path::Path;

#[derive(Args)]
pub struct SetStatusArgs {
    /// Workflow name (the runbook title)
    pub workflow: String,

    /// Run ID to transition
    pub run_id: i64,

    /// New status: running, ok, nok, or aborted
    pub status: String,
}

pub fn set_status(args: &SetStatusArgs, state_path: &Path) -> anyhow::Result<i32> {
    let status: RunStatus = args.status.parse().map_err(|e: String| anyhow!(e))?;

    let store = FileStore::open(state_path)?;
    let mut run = store.get_run(&args.workflow, args.run_id)?;

    let previous = run.status;
    run.status = status;
    run.end_time = match status {
        RunStatus::Running => None,
        _ => run.end_time.or_else(|| Some(Utc::now())),
    };
    store.update_run(&run)?;

    println!(
        "Run {}#{} transitioned: {} -> {}",
        args.workflow,
        args.run_id,
        previous.as_str(),
        status.as_str()
    );
    Ok(0)
}
