//! `loom dry-run` - per-turn scaffolding preview without any model calls.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{LoomConfig, Scaffolding};
use crate::infrastructure::config::PersonaLoader;
use crate::services::{Scaffolder, TurnPlan};

#[derive(Args, Debug)]
pub struct DryRunArgs {
    /// Path to the persona YAML config
    pub config: PathBuf,

    /// Number of turns to preview (defaults to the config's expected_turns)
    #[arg(short, long)]
    pub turns: Option<u32>,

    /// Print the assembled scaffolding for every turn
    #[arg(long)]
    pub prompts: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct DryRunTurn {
    #[serde(flatten)]
    pub plan: TurnPlan,
    /// Absent on turns where the previous instructions stay in force.
    pub scaffolding: Option<Scaffolding>,
}

#[derive(Debug, serde::Serialize)]
pub struct DryRunOutput {
    pub persona: String,
    pub expected_turns: u32,
    pub turns: Vec<DryRunTurn>,
    #[serde(skip)]
    pub show_prompts: bool,
}

impl DryRunOutput {
    /// Plan and assemble the first `turns` turns of `config`.
    pub fn build(config: &LoomConfig, turns: Option<u32>) -> Result<Self> {
        let expected_turns = config.trajectory.expected_turns;
        let scaffolder = Scaffolder::new(config, expected_turns)?;
        let exhausted = BTreeSet::new();
        let count = turns.unwrap_or(expected_turns).min(expected_turns);

        let turns = (0..count)
            .map(|turn| {
                let plan = scaffolder.plan(turn)?;
                let scaffolding = scaffolder.assemble(&plan, &exhausted, None)?;
                Ok(DryRunTurn { plan, scaffolding })
            })
            .collect::<Result<Vec<_>, crate::domain::errors::RolloutError>>()
            .context("Failed to plan turns")?;

        Ok(Self {
            persona: config.persona_name().to_string(),
            expected_turns,
            turns,
            show_prompts: false,
        })
    }
}

impl CommandOutput for DryRunOutput {
    fn to_human(&self) -> String {
        let plans: Vec<TurnPlan> = self.turns.iter().map(|t| t.plan.clone()).collect();
        let mut lines = vec![
            format!(
                "Dry run for {} ({} of {} turns)",
                style(&self.persona).bold(),
                self.turns.len(),
                self.expected_turns
            ),
            TableFormatter::new().format_turn_plans(&plans),
        ];

        if self.show_prompts {
            for turn in &self.turns {
                lines.push(format!(
                    "\n{}",
                    style(format!(
                        "── turn {} · {} · {} ──",
                        turn.plan.turn, turn.plan.phase, turn.plan.injection_mode
                    ))
                    .cyan()
                ));
                lines.push(match &turn.scaffolding {
                    Some(Scaffolding::Full { blocks }) => blocks.render(),
                    Some(Scaffolding::Reminder { text }) => text.clone(),
                    None => style("(previous instructions stay in force)").dim().to_string(),
                });
            }
        }

        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: DryRunArgs, json_mode: bool) -> Result<()> {
    let config = PersonaLoader::load(&args.config)?;
    let mut result = DryRunOutput::build(&config, args.turns)?;
    result.show_prompts = args.prompts;
    output(&result, json_mode);
    Ok(())
}
