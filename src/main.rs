//! table-accessor - Main entry point.
//!
//! Runs one table operation against PostgreSQL or SQLite and prints the
//! result as JSON.

use clap::Parser;
use std::process::ExitCode;
use table_accessor::cli::{self, Cli, ErrorReport};
use table_accessor::config::{Config, load_dotenv};
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr so stdout carries only the JSON result.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env must be loaded before clap reads env fallbacks
    let dotenv_path = load_dotenv();
    let cli = Cli::parse();

    init_tracing(&cli.config);
    match &dotenv_path {
        Some(path) => debug!(path = %path.display(), "Loaded .env"),
        None => debug!("No .env file found"),
    }

    info!(
        command = ?cli.command,
        "Starting table-accessor v{}",
        env!("CARGO_PKG_VERSION")
    );

    match cli::run(&cli).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "Failed to encode result");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            error!(kind = %e.kind(), error = %e, "Command failed");
            let report = ErrorReport::from(&e);
            match serde_json::to_string_pretty(&report) {
                Ok(text) => eprintln!("{}", text),
                Err(_) => eprintln!("Error: {}", e),
            }
            ExitCode::FAILURE
        }
    }
}
