//! Cycle-time command implementation.

use crate::cli::commands::open_context;
use crate::cli::{Cli, RangeArgs};
use crate::error::Result;
use crate::format::{csv, text};
use crate::metrics;
use crate::util::time::parse_range_bound;
use chrono::Utc;

/// Execute the cycle-time report for a date range.
///
/// # Errors
///
/// Propagates bad range arguments, storage errors, and ordering-contract
/// violations from the reconciliation pass.
pub fn execute(args: &RangeArgs, cli: &Cli) -> Result<()> {
    let (config, storage) = open_context(cli)?;
    let from = parse_range_bound(&args.from, "--from")?;
    let to = parse_range_bound(&args.to, "--to")?;

    let changes = storage.status_changes_in_window(from, to, &config.workflow)?;
    let report = metrics::cycle::compute(&changes, &config.workflow, from, to, Utc::now())?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if args.csv {
        print!("{}", csv::cycle_csv(&report));
    } else {
        print!("{}", text::render_cycle(&report));
    }
    Ok(())
}
