//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::dry_run::DryRunArgs;
use super::commands::run::RunArgs;
use super::commands::validate::ValidateArgs;

#[derive(Parser, Debug)]
#[command(name = "loom")]
#[command(about = "Loom - runtime scaffolding for long-horizon persona simulation", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Runtime settings file (defaults to .loom/config.yaml + .loom/local.yaml)
    #[arg(long, global = true, env = "LOOM_SETTINGS")]
    pub settings: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a persona config file
    Validate(ValidateArgs),

    /// Show per-turn plans and scaffolding without calling any model
    DryRun(DryRunArgs),

    /// Execute persona rollouts against a target model
    Run(RunArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AdversaryKind;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "loom",
            "run",
            "persona.yaml",
            "--persona-model",
            "mock/p",
            "--target",
            "mock/t",
            "--rollouts",
            "3",
            "--adversary",
            "both",
            "--seed",
            "42",
            "--output",
            "out",
            "--json",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.rollouts, 3);
                assert_eq!(args.adversary, Some(AdversaryKind::Both));
                assert_eq!(args.seed, Some(42));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_adversary_rejected() {
        let result = Cli::try_parse_from([
            "loom", "run", "p.yaml", "--persona-model", "a/b", "--target", "c/d", "--adversary",
            "sneaky", "--output", "out",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_dry_run() {
        let cli = Cli::try_parse_from(["loom", "dry-run", "p.yaml", "--turns", "5", "--prompts"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::DryRun(DryRunArgs { turns: Some(5), prompts: true, .. })
        ));
    }
}
