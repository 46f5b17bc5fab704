//! Status command implementation: watermark and local row counts.

use crate::cli::commands::open_context;
use crate::cli::Cli;
use crate::error::Result;
use crate::format::text;

/// Execute the status command.
///
/// # Errors
///
/// Propagates configuration and storage errors.
pub fn execute(cli: &Cli) -> Result<()> {
    let (_config, storage) = open_context(cli)?;
    let counts = storage.counts()?;
    let watermark = storage.watermark()?;

    if cli.json {
        let json = serde_json::json!({
            "watermark": watermark.map(|wm| wm.to_rfc3339()),
            "tickets": counts.tickets,
            "history_events": counts.history_events,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        print!("{}", text::render_status(&counts, watermark));
    }
    Ok(())
}
