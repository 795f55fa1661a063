//! Point Ledger CLI
//!
//! Replays a CSV file of charge/use requests against an in-memory ledger and
//! prints the final balances.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- requests.csv --workers 8 --history > balances.csv
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity

use clap::Parser;
use log::info;
use point_ledger::{ReplayConfig, ReplayEngine, Result};
use std::fs::File;
use std::io::{self, BufReader};
use std::process;

fn main() {
    env_logger::init();

    let config = ReplayConfig::parse();
    if let Err(e) = run(config) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(config: ReplayConfig) -> Result<()> {
    let file = File::open(&config.input)?;
    let reader = BufReader::new(file);

    let mut engine = ReplayEngine::in_memory();
    let summary = engine.process_csv(reader, config.workers)?;
    info!(
        "Replayed {} with {} worker(s): {} applied, {} rejected, {} skipped",
        config.input.display(),
        config.workers,
        summary.applied,
        summary.rejected,
        summary.skipped
    );

    let stdout = io::stdout();
    let handle = stdout.lock();
    engine.write_output(handle, config.history)?;

    Ok(())
}
