//! catalog-ingest - product catalog scraper and loader.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalog_ingest::browser::ChromeLauncher;
use catalog_ingest::cli::{self, Cli};
use catalog_ingest::config::ProcessEnv;
use catalog_ingest::pipeline::ingest;
use catalog_ingest::sink::SinkOutcome;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    let default_filter = if cli::is_verbose() {
        "catalog_ingest=debug"
    } else {
        "catalog_ingest=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match ingest(&cli.run_args(), &ProcessEnv, &ChromeLauncher).await {
        Ok(summary) => {
            match summary.outcome {
                SinkOutcome::Snapshot { path, count } => {
                    info!("Done: {} items saved to {}", count, path.display())
                }
                SinkOutcome::Inserted { count } => info!("Done: {} records inserted", count),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    }
}
