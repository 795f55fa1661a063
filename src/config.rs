//! Command-line configuration for the replay binary.

use clap::builder::RangedU64ValueParser;
use clap::Parser;
use std::path::PathBuf;

/// Replays a CSV file of charge/use requests against an in-memory ledger.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "point-ledger")]
#[command(about = "Per-user point ledger replay", long_about = None)]
pub struct ReplayConfig {
    /// CSV file of point requests (`type,user,amount`)
    pub input: PathBuf,

    /// Number of worker threads applying requests. `1` keeps file order.
    #[arg(
        long,
        default_value_t = 1,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub workers: usize,

    /// Append the history section to the output
    #[arg(long)]
    pub history: bool,
}
