//! Loom CLI entry point.

use anyhow::Context;
use clap::Parser;

use loom::cli::{Cli, Commands};
use loom::infrastructure::config::SettingsLoader;
use loom::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => SettingsLoader::load_from_file(path),
        None => SettingsLoader::load(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(err) => loom::cli::handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from(&settings.logging))
        .context("Failed to initialize logging")
    {
        Ok(logger) => logger,
        Err(err) => loom::cli::handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Validate(args) => loom::cli::commands::validate::execute(args, cli.json).await,
        Commands::DryRun(args) => loom::cli::commands::dry_run::execute(args, cli.json).await,
        Commands::Run(args) => loom::cli::commands::run::execute(args, &settings, cli.json).await,
    };

    if let Err(err) = result {
        loom::cli::handle_error(err, cli.json);
    }
}
