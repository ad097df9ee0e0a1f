//! ROMMend command-line client entry point.

mod app;
mod cli;
mod config;
mod progress;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Logs go to stderr; stdout carries listings and status lines.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting rommend");

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let config = config::Config::load_from(&config_path)?;
    tracing::debug!(path = %config_path.display(), "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(cli, config, config_path))
}
