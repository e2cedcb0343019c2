use clap::Parser;
use dmarc_analyzer::cli::{run, Cli};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // stdout carries verdicts only
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    // Load environment before clap reads OLLAMA_URL
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    let code = match run(cli).await {
        Ok(summary) if summary.is_success() => {
            tracing::info!(succeeded = summary.succeeded, "CLI completed successfully");
            0
        }
        Ok(summary) => {
            tracing::warn!(
                succeeded = summary.succeeded,
                failed = summary.failed(),
                "CLI completed with failed files"
            );
            eprintln!(
                "{} of {} file(s) could not be analysed",
                summary.failed(),
                summary.total()
            );
            1
        }
        Err(e) => {
            tracing::error!(error = %e, "CLI exited with error");
            eprintln!("Error: {e:#}");
            1
        }
    };

    // A pending stdin read from the confirmation prompt would keep the runtime
    // from shutting down.
    std::process::exit(code)
}
