//! Sync command implementation.

use crate::cli::Cli;
use crate::cli::commands::open_context;
use crate::error::Result;
use crate::remote::{JiraClient, RetryPolicy};
use crate::sync::SyncEngine;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// Execute the sync command: one full pass plus history backfill.
///
/// # Errors
///
/// Propagates configuration, remote, and storage errors. A mid-pass failure
/// leaves the watermark untouched so the next run retries the same window.
pub fn execute(cli: &Cli) -> Result<()> {
    let (config, mut storage) = open_context(cli)?;
    let remote = JiraClient::connect(&config, RetryPolicy::default())?;

    let started = Utc::now();
    info!(project = %config.project, "starting sync pass");

    let bar = if cli.quiet || cli.json {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message("syncing");
        bar
    };

    let report = SyncEngine::new(&remote, &mut storage, &config)
        .with_progress(bar.clone())
        .sync()?;
    bar.finish_and_clear();

    if cli.json {
        let json = serde_json::json!({
            "tickets": report.tickets_upserted,
            "events": report.events_upserted,
            "pages": report.pages,
            "backfilled_tickets": report.backfilled_tickets,
            "watermark": report.watermark.to_rfc3339(),
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else if !cli.quiet {
        let elapsed = Utc::now() - started;
        println!(
            "Synchronized {} tickets and {} history events in {}s (backfilled {} tickets)",
            report.tickets_upserted,
            report.events_upserted,
            elapsed.num_seconds(),
            report.backfilled_tickets
        );
    }
    Ok(())
}
