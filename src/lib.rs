pub mod backends;
pub mod commands;
pub mod core;
pub mod models;
pub mod storage;

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    commands::Cli::parse().run().await
}
