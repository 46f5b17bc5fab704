use cadence::cli::{commands, Cli, Commands};
use cadence::logging::init_logging;
use cadence::CadenceError;
use clap::Parser;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.quiet) {
        eprintln!("Failed to initialize logging: {e}");
        // Continue without logging rather than refusing to run.
    }

    let result = match &cli.command {
        Commands::Sync => commands::sync::execute(&cli),
        Commands::Cycle(args) => commands::cycle::execute(args, &cli),
        Commands::Loiter(args) => commands::loiter::execute(args, &cli),
        Commands::Monthly(args) => commands::monthly::execute(args, &cli),
        Commands::Status => commands::status::execute(&cli),
    };

    if let Err(e) = result {
        handle_error(&e, cli.json);
    }
}

/// Print the error (JSON when requested) and exit non-zero.
fn handle_error(err: &CadenceError, json_mode: bool) -> ! {
    if json_mode {
        let json = serde_json::json!({
            "error": err.to_string(),
            "suggestion": err.suggestion(),
        });
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| err.to_string())
        );
    } else {
        eprintln!("error: {err}");
        if let Some(suggestion) = err.suggestion() {
            eprintln!("  hint: {suggestion}");
        }
    }
    std::process::exit(err.exit_code());
}
