//! Log output for runs. Worker threads are named after the copy they drive (`node.copy`), so
//! every line carries that label; lines from the CLI thread show `main`.

use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

/// Install the global logger. Dependencies log at warn; hopflow logs at info, or debug with
/// `verbose`. `RUST_LOG` still overrides both. Safe to call more than once.
pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let _ = Builder::from_default_env()
        .filter_level(LevelFilter::Warn)
        .filter_module(env!("CARGO_PKG_NAME"), level)
        .format(|buf, record| {
            let current = std::thread::current();
            let copy_label = current.name().unwrap_or("main");
            let tag = env!("CARGO_PKG_NAME").cyan();
            match record.level() {
                Level::Error => writeln!(
                    buf,
                    "[{tag} {} {}] {}",
                    "ERROR".red(),
                    copy_label.white(),
                    record.args()
                ),
                Level::Warn => writeln!(
                    buf,
                    "[{tag} {} {}] {}",
                    "WARN".yellow(),
                    copy_label.white(),
                    record.args()
                ),
                _ => writeln!(buf, "[{tag} {}] {}", copy_label.dimmed(), record.args()),
            }
        })
        .try_init();
}
