//! CLI command handlers: run, validate, list node types.

use anyhow::{Context, Result, bail};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::engine::arg_parser::{Cli, Commands, CommonArgs, RunArgs};
use crate::engine::progress::ProgressThread;
use crate::engine::registry::NodeRegistry;
use crate::graph::{ExecutionPlan, Graph};
use crate::pipeline::{RunHandle, RunResult, RunStatus, Supervisor};
use crate::utils::config::EngineConfig;
use crate::utils::{load_pipeline, setup_logging};

/// Dispatch the parsed command line.
pub fn handle_cli(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Run(args) => handle_run(args),
        Commands::Validate(args) => handle_validate(args),
        Commands::Nodes => handle_nodes(),
    }
}

/// Load, validate and expand the pipeline file. Returns the graph, its engine config and the
/// file's timeout.
fn prepare(common: &CommonArgs) -> Result<(Graph, EngineConfig, Option<Duration>)> {
    setup_logging(common.verbose);
    let file = load_pipeline(&common.file)?;
    let registry = NodeRegistry::with_builtins();
    let graph = file
        .graph(&registry)
        .with_context(|| format!("invalid pipeline {}", common.file.display()))?;
    Ok((graph, file.settings.engine_config(), file.settings.timeout()))
}

/// Run a pipeline file. Fails (non-zero exit) when the run status is `Failed`.
pub fn handle_run(args: &RunArgs) -> Result<()> {
    let (graph, config, file_timeout) = prepare(&args.common)?;
    let timeout = args.timeout.map(Duration::from_secs).or(file_timeout);
    let plan = graph.expand(&config)?;
    debug!("{}", plan.describe());

    let handle = start_interruptible(plan)?;
    let monitor = handle.monitor();
    let progress = (args.common.verbose && !args.json).then(|| ProgressThread::spawn(monitor));
    let result = handle.await_completion(timeout);
    if let Some(progress) = progress {
        progress.finish();
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }
    if result.status == RunStatus::Failed {
        let first = result
            .errors
            .first()
            .map(ToString::to_string)
            .unwrap_or_default();
        bail!("run failed: {first}");
    }
    Ok(())
}

/// Start `plan` with Ctrl+C wired to cancel it. If the handler cannot be installed, the run is
/// cancelled and drained before the error is returned.
pub fn start_interruptible(plan: ExecutionPlan) -> Result<RunHandle> {
    let handle = Supervisor::start(plan)?;
    let cancel_monitor = handle.monitor();
    let installed = ctrlc::set_handler(move || {
        warn!("interrupted, cancelling run");
        cancel_monitor.cancel();
    });
    if let Err(e) = installed {
        handle.cancel();
        let result = handle.await_completion(None);
        debug!("run drained after handler failure: {}", result.status);
        return Err(e).context("set Ctrl+C handler");
    }
    Ok(handle)
}

/// Validate a pipeline file and print its wiring.
pub fn handle_validate(args: &CommonArgs) -> Result<()> {
    let (graph, config, _) = prepare(args)?;
    let plan = graph.expand(&config)?;
    println!("{}: ok", args.file.display());
    println!("order: {}", graph.topological_order().join(" -> "));
    println!("{}", plan.describe());
    Ok(())
}

/// Print the built-in node types.
pub fn handle_nodes() -> Result<()> {
    for node_type in NodeRegistry::with_builtins().types() {
        println!("{node_type}");
    }
    Ok(())
}

fn print_summary(result: &RunResult) {
    // node -> (copies, read, written, rejected)
    let mut per_node: BTreeMap<&str, (usize, u64, u64, u64)> = BTreeMap::new();
    for s in &result.statistics {
        let e = per_node.entry(s.node.as_str()).or_default();
        e.0 += 1;
        e.1 += s.rows_read;
        e.2 += s.rows_written;
        e.3 += s.rows_rejected;
    }
    println!("status: {} ({:.3?})", result.status, result.elapsed);
    for (node, (copies, read, written, rejected)) in per_node {
        println!("  {node} x{copies}: read {read}, written {written}, rejected {rejected}");
    }
    for err in &result.errors {
        println!("  error: {err}");
    }
}
