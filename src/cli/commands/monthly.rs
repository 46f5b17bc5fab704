//! Monthly report command implementation.

use crate::cli::commands::open_context;
use crate::cli::{Cli, MonthlyArgs};
use crate::error::Result;
use crate::format::{csv, text};
use crate::metrics;
use crate::util::time::month_bounds;
use chrono::Duration;

/// Execute the monthly open/closed report.
///
/// # Errors
///
/// Propagates a malformed month token and storage errors.
pub fn execute(args: &MonthlyArgs, cli: &Cli) -> Result<()> {
    let (config, storage) = open_context(cli)?;
    let (start, end) = month_bounds(&args.month)?;

    let tickets = storage.tickets_touching(start, end)?;
    let report = metrics::monthly::compute(
        &tickets,
        &args.month,
        Duration::minutes(config.workflow.min_worked_minutes),
    )?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if args.csv {
        print!("{}", csv::monthly_csv(&report));
    } else {
        print!("{}", text::render_monthly(&report));
    }
    Ok(())
}
