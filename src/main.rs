use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use eshop_api::cli::{self, Cli};
use eshop_api::config;
use eshop_api::supervisor::Supervisor;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("eshop_api=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::config().clone();
    tracing::info!("Starting eshop-api in {:?} mode", config.environment);

    let supervisor = Supervisor::new();
    supervisor.install_panic_hook();

    if let Err(e) = cli::run(cli, config, &supervisor).await {
        match std::env::var("CLI_VERBOSE").as_deref() {
            Ok("true") | Ok("1") => eprintln!("Error: {e:?}"),
            _ => eprintln!("Error: {e:#}"),
        }
        supervisor.fail("startup or runtime error");
    }

    supervisor.exit_code()
}
