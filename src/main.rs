mod cli;
mod config;
mod migrate;
mod model;
mod reconcile;
mod sonar;

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = match config::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::from(2);
        }
    };

    let run = match cli.resolve(&config) {
        Ok(run) => run,
        Err(e) => {
            error!("{e}");
            let _ = Cli::command().print_help();
            return ExitCode::from(2);
        }
    };

    match migrate::run(&run).await {
        Ok(summary) => {
            if let Some(config) = summary.config {
                info!(
                    "Done: {} configuration changes, {} failed",
                    config.applied.len(),
                    config.failed
                );
            }
            if let Some(issues) = summary.issues {
                info!(
                    "Done: {} issues processed, {} updated, {} unmatched",
                    issues.processed, issues.updated, issues.unmatched
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error migrating sonar issues: {e:#}");
            ExitCode::FAILURE
        }
    }
}
