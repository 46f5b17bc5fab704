//! CLI definitions and entry point.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Mirror a Jira project into `SQLite` and derive cycle-time metrics
#[derive(Parser, Debug)]
#[command(name = "cadence", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Connection config path (default ./cadence.json)
    #[arg(long, global = true, env = "CADENCE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database path (default ./cadence.db)
    #[arg(long, global = true, env = "CADENCE_DB")]
    pub db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synchronize the local mirror with the remote tracker
    Sync,

    /// Cycle-time report for a date range
    Cycle(RangeArgs),

    /// Per-status dwell (loiter) report for a date range
    Loiter(RangeArgs),

    /// Monthly open/closed report
    Monthly(MonthlyArgs),

    /// Show the watermark and local row counts
    Status,
}

#[derive(Args, Debug)]
pub struct RangeArgs {
    /// Window start (RFC3339 or YYYY-MM-DD)
    #[arg(long)]
    pub from: String,

    /// Window end (RFC3339 or YYYY-MM-DD)
    #[arg(long)]
    pub to: String,

    /// Output as CSV
    #[arg(long)]
    pub csv: bool,
}

#[derive(Args, Debug)]
pub struct MonthlyArgs {
    /// Month token, e.g. 2024-05
    #[arg(long)]
    pub month: String,

    /// Output as CSV
    #[arg(long)]
    pub csv: bool,
}
