// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pb: a runbook engine for operations

mod commands;
mod error;
mod io;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pb", version, about = "Playbook - a runbook engine for operations")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// State directory (defaults to the platform data directory)
    #[arg(long, global = true)]
    state_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a playbook from start to finish
    Run(commands::run::RunArgs),
    /// Resume a previously started run
    Resume(commands::run::ResumeArgs),
    /// Validate a runbook file
    Validate(commands::validate::ValidateArgs),
    /// Show runs and execution history
    Show(commands::show::ShowArgs),
    /// Force-transition a run's status
    SetStatus(commands::set_status::SetStatusArgs),
    /// Export the runbook DAG as Graphviz DOT
    ExportDot(commands::export_dot::ExportDotArgs),
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let state_path = cli.state_path.clone().unwrap_or_else(default_state_path);

    let result = match &cli.command {
        Commands::Run(args) => commands::run::run(args, &state_path),
        Commands::Resume(args) => commands::run::resume(args, &state_path),
        Commands::Validate(args) => commands::validate::validate(args),
        Commands::Show(args) => commands::show::show(args, &state_path),
        Commands::SetStatus(args) => commands::set_status::set_status(args, &state_path),
        Commands::ExportDot(args) => commands::export_dot::export_dot(args),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(error::exit_code(&e));
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn default_state_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("playbook").join("state"))
        .unwrap_or_else(|| PathBuf::from(".playbook-state"))
}
