use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Run row-streaming pipelines defined in TOML files.
#[derive(Clone, Parser)]
#[command(name = "hopflow", version)]
#[command(about = "Run row-streaming pipelines defined in TOML files.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Run a pipeline until it completes, fails, or is cancelled (Ctrl+C).
    Run(RunArgs),
    /// Check a pipeline file and print its expanded wiring without running it.
    Validate(CommonArgs),
    /// List the built-in node types.
    Nodes,
}

/// Arguments shared by commands that take a pipeline file.
#[derive(Clone, Args)]
pub struct CommonArgs {
    /// Pipeline definition (TOML).
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Verbose output.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

#[derive(Clone, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Cancel the run after this many seconds. Overrides `timeout_secs` from the file.
    #[arg(long, short = 't', value_parser = clap::value_parser!(u64))]
    pub timeout: Option<u64>,

    /// Print the run result as JSON.
    #[arg(long)]
    pub json: bool,
}
