use anyhow::Result;
use clap::Parser;

mod agent;
mod cli;
mod commands;
mod config;
mod logging;
mod rename;
mod runner;
mod session;
mod tower;
mod utils;

use cli::{Cli, Commands};
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config)?;

    // The dashboard owns the terminal, so its logs go to a file.
    let _guard = if matches!(cli.command, Commands::Dashboard(_)) {
        Some(logging::init_file(&config.log)?)
    } else {
        logging::init_stderr(&config.log);
        None
    };
    match &config.source {
        Some(path) => tracing::debug!("Loaded config from {:?}", path),
        None => tracing::debug!("No config file found, using defaults"),
    }

    match cli.command {
        Commands::Open(args) => commands::open::execute(args, config).await,
        Commands::New(args) => commands::new::execute(args, config).await,
        Commands::Watch(args) => commands::watch::execute(args, config).await,
        Commands::Swap(args) => commands::swap::execute(args, config).await,
        Commands::Status(args) => commands::status::execute(args, config).await,
        Commands::Kill(args) => commands::kill::execute(args, config).await,
        Commands::Dashboard(args) => commands::dashboard::execute(args, config).await,
    }
}
