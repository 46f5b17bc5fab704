//! Logging initialization.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Verbosity: default shows warnings, `-v` debug, `-vv` trace, `--quiet`
/// errors only. `CADENCE_LOG` overrides everything when set.
///
/// # Errors
///
/// Returns an error if a subscriber was already installed.
pub fn init_logging(
    verbose: u8,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let default = if quiet {
        "error"
    } else {
        match verbose {
            0 => "cadence=warn",
            1 => "cadence=debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_env("CADENCE_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()?;
    Ok(())
}
