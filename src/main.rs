//! `baas-api` binary: parses the command line and runs one command.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use baas_api::{
    cli::{Cli, Commands},
    commands,
    config::Config,
};

/// Filter used when `RUST_LOG` is unset
const DEFAULT_LOG_FILTER: &str = "baas_api=info,tower_http=info";
const VERBOSE_LOG_FILTER: &str = "baas_api=debug,tower_http=debug,sea_orm=info";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // .env may carry RUST_LOG
    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    let config = Config::from_env();
    tracing::debug!(host = %config.server_host, port = config.server_port, "Configuration loaded");

    let result = match cli.command {
        Commands::Serve(args) => commands::serve::execute(args, config).await,
        Commands::Migrate(args) => commands::migrate::execute(args, config).await,
        Commands::Jobs(args) => commands::jobs::execute(args, config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "Command failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// `--verbose` wins over `RUST_LOG`.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(filter)
        .init();
}
