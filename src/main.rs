//! fieldstore - Main entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use fieldstore::{
    cli::{run_command, Cli},
    config::Config,
    store::SqliteStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{}", e))?;
    let store = SqliteStore::new(&config.database).await?;

    run_command(cli.command, &store).await
}
