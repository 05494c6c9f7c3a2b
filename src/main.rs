mod cli;
mod config;
mod error;
mod model;
mod reporter;
mod tracker;

use clap::error::ErrorKind;
use clap::Parser;
use tracing::Level;

use cli::Cli;
use config::{AppConfig, EndpointConfig};
use error::{EXIT_FAILURE, EXIT_SUCCESS};
use tracker::azure::AzureDevOpsTracker;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            println!("{e}");
            std::process::exit(EXIT_FAILURE);
        }
    };

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .init();

    std::process::exit(run(&cli).await);
}

async fn run(cli: &Cli) -> i32 {
    // Reject conflicting arguments before touching config or network
    if let Err(e) = cli.selection() {
        println!("{e}");
        return e.exit_code();
    }

    let config = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            println!("Error: {e:#}");
            return EXIT_FAILURE;
        }
    };
    let tracker = match build_tracker(cli, &config) {
        Ok(t) => t,
        Err(e) => {
            println!("Error: {e:#}");
            return EXIT_FAILURE;
        }
    };

    match cli::execute(cli, Box::new(tracker), config.search.task_limit).await {
        Ok(summary) if summary.is_success() => EXIT_SUCCESS,
        Ok(_) => EXIT_FAILURE,
        Err(e) => {
            println!("{e}");
            e.exit_code()
        }
    }
}

fn build_tracker(cli: &Cli, config: &AppConfig) -> anyhow::Result<AzureDevOpsTracker> {
    let endpoint = EndpointConfig::new(&config.endpoint, &cli.project_path)?;
    Ok(AzureDevOpsTracker::new(endpoint, &cli.token)?)
}
