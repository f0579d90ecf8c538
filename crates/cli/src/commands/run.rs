// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! `pb run` and `pb resume`: drive a runbook through the engine with
//! interactive retry/skip/abort handling on failure

use crate::io::{self, ConsoleIoHandler};
use anyhow::Context;
use clap::Args;
use pb_adapters::ShellProcessRunner;
use pb_core::model::{NodeStatus, RunStatus, Runbook};
use pb_core::plugin::PluginRegistry;
use pb_core::ports::{NodeExecutionRepository, RunRepository};
use pb_core::{NodeExecution, RunInfo, SystemClock};
use pb_engine::{Engine, EngineError};
use pb_runbook::{ParseError, RunbookParser, VariableError, VariableManager, DEFAULT_ENV_PREFIX};
use pb_storage::FileStore;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

type CliEngine = Engine<SystemClock, ShellProcessRunner, ConsoleIoHandler>;

#[derive(Args)]
pub struct RunArgs {
    /// Runbook file path
    pub file: PathBuf,

    #[command(flatten)]
    pub exec: ExecArgs,
}

#[derive(Args)]
pub struct ResumeArgs {
    /// Runbook file path
    pub file: PathBuf,

    /// Run ID to resume
    pub run_id: i64,

    /// Node ID to resume from
    #[arg(long = "node")]
    pub start_node: Option<String>,

    #[command(flatten)]
    pub exec: ExecArgs,
}

/// Variable sources shared by every command that parses a runbook
#[derive(Args)]
pub struct VarArgs {
    /// Set a variable in KEY=VALUE format (repeatable)
    #[arg(long = "var")]
    pub vars: Vec<String>,

    /// Load variables from a file (TOML, JSON, YAML, or .env)
    #[arg(long)]
    pub vars_file: Option<PathBuf>,

    /// Environment variable prefix for loading variables
    #[arg(long, default_value = DEFAULT_ENV_PREFIX)]
    pub vars_env: String,
}

#[derive(Args)]
pub struct ExecArgs {
    /// Maximum retry attempts per failed node
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    #[command(flatten)]
    pub var_args: VarArgs,

    /// Don't prompt for missing required variables
    #[arg(long)]
    pub no_interactive_vars: bool,

    /// Approve every prompt and never retry (non-interactive mode)
    #[arg(long = "yes", short = 'y')]
    pub assume_yes: bool,
}

pub fn run(args: &RunArgs, state_path: &Path) -> anyhow::Result<i32> {
    execute_workflow(&args.file, state_path, None, None, &args.exec)
}

pub fn resume(args: &ResumeArgs, state_path: &Path) -> anyhow::Result<i32> {
    execute_workflow(
        &args.file,
        state_path,
        Some(args.run_id),
        args.start_node.as_deref(),
        &args.exec,
    )
}

fn execute_workflow(
    file: &Path,
    state_path: &Path,
    run_id: Option<i64>,
    start_node: Option<&str>,
    exec: &ExecArgs,
) -> anyhow::Result<i32> {
    let mut variables = collect_variables(&exec.var_args)?;

    println!("Parsing runbook: {}", file.display());
    let parser = RunbookParser::new();
    let runbook = parse_with_prompting(&parser, file, &mut variables, exec)?;

    // `when` expressions see every workflow variable, defaults included
    let variables = with_defaults(&parser, file, variables)?;

    let plugins = Arc::new(PluginRegistry::new());
    let engine = build_engine(state_path, exec.assume_yes, Arc::clone(&plugins))?;

    let mut run = match run_id {
        Some(run_id) => {
            println!("Resuming run: {} (run {run_id})", runbook.title);
            engine.resume_run(&runbook, run_id)?
        }
        None => {
            let run = engine.start_run(&runbook)?;
            println!("Starting run: {} (run {})", runbook.title, run.run_id);
            run
        }
    };

    let order = engine.execution_order(&runbook).map_err(EngineError::from)?;
    let nodes = engine.nodes_to_run(&runbook, &run, &order, start_node)?;

    if nodes.is_empty() {
        println!("No nodes to execute - all nodes are already completed");
        return Ok(0);
    }

    let final_status = execute_nodes(&engine, &runbook, &mut run, &nodes, &variables, exec)?;
    plugins.cleanup_all();
    print_summary(&run);

    Ok(if final_status == RunStatus::Ok { 0 } else { 1 })
}

fn execute_nodes(
    engine: &CliEngine,
    runbook: &Runbook,
    run: &mut RunInfo,
    nodes: &[String],
    variables: &Map<String, Value>,
    exec: &ExecArgs,
) -> anyhow::Result<RunStatus> {
    for node_id in nodes {
        let node = runbook
            .get_node(node_id)
            .ok_or_else(|| EngineError::UnknownNode(node_id.clone()))?;
        println!(
            "\n=== {} step: {} ===",
            node.kind.type_name(),
            node.display_name()
        );

        let (status, execution) = engine.execute_node(runbook, node_id, run, variables)?;

        match status {
            NodeStatus::Ok => println!("Completed: {}", node.display_name()),
            NodeStatus::Skipped => println!("Skipped: {}", node.display_name()),
            NodeStatus::Nok => {
                println!("Failed: {}", node.display_name());
                if !node.critical && !exec.assume_yes {
                    handle_failure(engine, runbook, run, node_id, execution, exec.max_retries)?;
                }
            }
            NodeStatus::Pending | NodeStatus::Running => {}
        }

        let aggregated = engine.update_run_status(runbook, run)?;
        if aggregated != RunStatus::Running {
            return Ok(aggregated);
        }
    }

    Ok(engine.update_run_status(runbook, run)?)
}

/// Interactive retry/skip/abort loop for a failed non-critical node
fn handle_failure(
    engine: &CliEngine,
    runbook: &Runbook,
    run: &mut RunInfo,
    node_id: &str,
    mut execution: NodeExecution,
    max_retries: u32,
) -> anyhow::Result<()> {
    loop {
        if let Some(exception) = &execution.exception {
            eprintln!("Error: {exception}");
        }
        if let Some(stderr) = execution.stderr.as_deref().filter(|s| !s.is_empty()) {
            eprintln!("stderr:\n{stderr}");
        }

        let attempt = execution.attempt;
        if attempt >= max_retries {
            let choice = io::ask_choice(
                &format!("Node failed. Maximum retries ({max_retries}) reached. Skip (s) or Abort (a)? "),
                &["s", "a"],
                "a",
            );
            match choice.as_str() {
                "s" => {
                    println!("Skipping node");
                    engine.skip_failed_node(run, node_id)?;
                }
                _ => {
                    println!("Aborting run");
                    engine.abort_run(run)?;
                }
            }
            return Ok(());
        }

        let choice = io::ask_choice(
            &format!("Node failed (attempt {attempt}/{max_retries}). Retry (r), Skip (s), or Abort (a)? "),
            &["r", "s", "a"],
            "r",
        );
        match choice.as_str() {
            "r" => {
                let next = attempt + 1;
                println!("Retrying '{node_id}' (attempt {next}/{max_retries})...");
                let (status, retried) = engine.execute_node_retry(runbook, node_id, run, next)?;
                if status == NodeStatus::Ok {
                    println!("Node '{node_id}' succeeded on attempt {next}");
                    return Ok(());
                }
                println!("Retry attempt {next} failed");
                execution = retried;
            }
            "s" => {
                println!("Skipping node");
                engine.skip_failed_node(run, node_id)?;
                return Ok(());
            }
            _ => {
                println!("Aborting run");
                engine.abort_run(run)?;
                return Ok(());
            }
        }
    }
}

fn print_summary(run: &RunInfo) {
    match run.status {
        RunStatus::Ok => println!("\nRun completed successfully"),
        RunStatus::Aborted => println!("\nRun aborted"),
        _ => println!("\nRun failed"),
    }
    println!(
        "nodes ok: {}, nok: {}, skipped: {}",
        run.nodes_ok, run.nodes_nok, run.nodes_skipped
    );
}

/// Collect variables from all sources: CLI > file > environment
pub fn collect_variables(args: &VarArgs) -> anyhow::Result<Map<String, Value>> {
    let manager = VariableManager::new();

    let cli = manager.parse_cli_vars(&args.vars)?;
    let file = match &args.vars_file {
        Some(path) => manager.load_file(path)?,
        None => Map::new(),
    };
    let env = manager.load_env(&args.vars_env);

    Ok(manager.merge(cli, file, env, Map::new()))
}

/// Parse the runbook; on missing required variables, prompt for values
/// (unless non-interactive) and retry once.
fn parse_with_prompting(
    parser: &RunbookParser,
    file: &Path,
    variables: &mut Map<String, Value>,
    exec: &ExecArgs,
) -> anyhow::Result<Runbook> {
    match parser.parse_file(file, variables) {
        Ok(runbook) => Ok(runbook),
        Err(ParseError::Variables(VariableError::MissingRequired(missing)))
            if !exec.no_interactive_vars && !exec.assume_yes =>
        {
            let content = std::fs::read_to_string(file)
                .with_context(|| format!("cannot read {}", file.display()))?;
            let definitions = parser.variable_definitions(&content)?;

            for name in &missing {
                let Some(definition) = definitions.get(name) else {
                    continue;
                };
                let mut prompt = format!("Enter value for {name}");
                if let Some(description) = &definition.description {
                    prompt.push_str(&format!(" ({description})"));
                }
                if let Some(choices) = &definition.choices {
                    let rendered: Vec<String> =
                        choices.iter().map(|c| c.to_string()).collect();
                    prompt.push_str(&format!(" [choices: {}]", rendered.join(", ")));
                }
                prompt.push_str(": ");

                loop {
                    let input = io::read_line(&prompt);
                    match definition.coerce_and_validate(Value::String(input)) {
                        Ok(value) => {
                            variables.insert(name.clone(), value);
                            break;
                        }
                        Err(e) => println!("Invalid value: {e}. Please try again."),
                    }
                }
            }

            Ok(parser.parse_file(file, variables)?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Lay the caller-provided variables over the runbook's defaults
fn with_defaults(
    parser: &RunbookParser,
    file: &Path,
    provided: Map<String, Value>,
) -> anyhow::Result<Map<String, Value>> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let definitions = parser.variable_definitions(&content)?;
    let defaults: Map<String, Value> = definitions
        .iter()
        .filter_map(|(name, def)| def.default.clone().map(|v| (name.clone(), v)))
        .collect();

    let manager = VariableManager::new();
    Ok(manager.merge(provided, Map::new(), Map::new(), defaults))
}

pub fn build_engine(
    state_path: &Path,
    assume_yes: bool,
    plugins: Arc<PluginRegistry>,
) -> anyhow::Result<CliEngine> {
    tracing::debug!(state_path = %state_path.display(), "opening state store");
    let store = Arc::new(FileStore::open(state_path)?);
    Ok(Engine::new(
        SystemClock,
        ShellProcessRunner::new()?,
        ConsoleIoHandler::new(assume_yes),
        Arc::clone(&store) as Arc<dyn RunRepository>,
        store as Arc<dyn NodeExecutionRepository>,
        plugins,
    ))
}
