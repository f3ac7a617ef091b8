//! `loom validate` - load and validate a persona config.

use anyhow::Result;
use clap::Args;
use console::style;
use std::path::PathBuf;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::LoomConfig;
use crate::infrastructure::config::PersonaLoader;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the persona YAML config
    pub config: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct PhaseSummary {
    pub name: String,
    pub ends_at: f64,
    pub revelations: usize,
}

#[derive(Debug, serde::Serialize)]
pub struct ValidateOutput {
    pub valid: bool,
    pub path: String,
    pub persona: String,
    pub schema_version: String,
    pub fingerprint: String,
    pub expected_turns: u32,
    pub dimensions: Vec<String>,
    pub phases: Vec<PhaseSummary>,
}

impl ValidateOutput {
    pub fn from_config(path: &std::path::Path, config: &LoomConfig) -> Self {
        let expected_turns = config.trajectory.expected_turns;
        Self {
            valid: true,
            path: path.display().to_string(),
            persona: config.persona_name().to_string(),
            schema_version: config.schema_version.clone(),
            fingerprint: config.fingerprint(),
            expected_turns,
            dimensions: config.trajectory.dimensions.keys().cloned().collect(),
            phases: config
                .trajectory
                .phases
                .iter()
                .map(|phase| PhaseSummary {
                    name: phase.name.clone(),
                    ends_at: phase.end_condition.as_position(expected_turns),
                    revelations: phase.revelations.len(),
                })
                .collect(),
        }
    }
}

impl CommandOutput for ValidateOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "{} Config valid: {} ({} dimensions, {} phases, {} turns)",
            style("✓").green(),
            style(&self.persona).bold(),
            self.dimensions.len(),
            self.phases.len(),
            self.expected_turns
        )];
        lines.push(format!("  schema:      {}", self.schema_version));
        lines.push(format!("  fingerprint: {}", self.fingerprint));
        lines.push(format!("  dimensions:  {}", self.dimensions.join(", ")));
        for phase in &self.phases {
            lines.push(format!(
                "  phase {:<20} ends at {:.2} ({} revelations)",
                phase.name, phase.ends_at, phase.revelations
            ));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: ValidateArgs, json_mode: bool) -> Result<()> {
    let config = PersonaLoader::load(&args.config)?;
    output(&ValidateOutput::from_config(&args.config, &config), json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::sample_config;
    use std::path::Path;

    #[test]
    fn test_summary_lists_phases_in_order() {
        let config = sample_config();
        let out = ValidateOutput::from_config(Path::new("persona.yaml"), &config);
        assert!(out.valid);
        assert_eq!(out.phases.len(), config.trajectory.phases.len());
        assert!((out.phases.last().unwrap().ends_at - 1.0).abs() < 1e-9);
        assert_eq!(out.fingerprint.len(), 12);
        assert_eq!(out.to_json()["persona"], config.persona_name());
    }
}
