//! Hopflow CLI: run, validate, and inspect pipeline files.

use anyhow::Result;
use clap::Parser;
use hopflow::engine::arg_parser::Cli;
use hopflow::engine::handle_cli;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_cli(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
