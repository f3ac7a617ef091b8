//! Table output formatting for CLI commands
//!
//! Turn plans and rollout summaries rendered with comfy-table. Colors follow
//! `console`'s terminal detection, which honours `NO_COLOR`.

use comfy_table::{presets, Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use super::truncate;
use crate::cli::commands::run::RolloutSummary;
use crate::domain::models::InjectionMode;
use crate::services::TurnPlan;

/// Table formatter for CLI output
pub struct TableFormatter {
    use_colors: bool,
    max_width: Option<u16>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: console::colors_enabled(),
            max_width: None,
        }
    }

    pub fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self { use_colors, max_width }
    }

    /// One row per turn: position, phase, injection mode and every
    /// dimension's prescribed intensity.
    pub fn format_turn_plans(&self, plans: &[TurnPlan]) -> String {
        let mut table = self.create_base_table();
        let dimensions: Vec<&String> = plans
            .first()
            .map(|plan| plan.intensities.keys().collect())
            .unwrap_or_default();

        let mut header = vec![
            bold("Turn"),
            bold("Position"),
            bold("Phase"),
            bold("Injection"),
        ];
        header.extend(dimensions.iter().map(|name| bold(name)));
        table.set_header(header);

        for plan in plans {
            let mut row = vec![
                Cell::new(plan.turn).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.3}", plan.position)).set_alignment(CellAlignment::Right),
                Cell::new(truncate(&plan.phase, 24)),
                self.mode_cell(plan.injection_mode),
            ];
            row.extend(dimensions.iter().map(|name| {
                let value = plan.intensities.get(*name).copied().unwrap_or_default();
                Cell::new(format!("{value:.3}")).set_alignment(CellAlignment::Right)
            }));
            table.add_row(row);
        }

        table.to_string()
    }

    /// One row per rollout of a run.
    pub fn format_rollouts(&self, rollouts: &[RolloutSummary]) -> String {
        let mut table = self.create_base_table();
        table.set_header(vec![
            bold("Rollout"),
            bold("Status"),
            bold("Turns"),
            bold("Regenerations"),
            bold("Monitor events"),
            bold("Seed"),
            bold("Transcript"),
        ]);

        for rollout in rollouts {
            let status = match &rollout.reason {
                Some(reason) => format!("{} ({})", rollout.status, truncate(reason, 40)),
                None => rollout.status.clone(),
            };
            let status_cell = if self.use_colors {
                Cell::new(status).fg(status_color(&rollout.status))
            } else {
                Cell::new(status)
            };

            table.add_row(vec![
                Cell::new(format!("{:03}", rollout.index)),
                status_cell,
                Cell::new(rollout.turns).set_alignment(CellAlignment::Right),
                Cell::new(rollout.regenerations).set_alignment(CellAlignment::Right),
                Cell::new(rollout.monitor_events).set_alignment(CellAlignment::Right),
                Cell::new(rollout.seed),
                Cell::new(rollout.path.as_deref().unwrap_or("-")),
            ]);
        }

        table.to_string()
    }

    fn mode_cell(&self, mode: InjectionMode) -> Cell {
        let cell = Cell::new(mode.as_str());
        if !self.use_colors {
            return cell;
        }
        match mode {
            InjectionMode::Full => cell.fg(Color::Green),
            InjectionMode::Reminder => cell.fg(Color::Cyan),
            InjectionMode::None => cell.fg(Color::DarkGrey),
        }
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        if let Some(width) = self.max_width {
            table.set_width(width);
        }
        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn bold(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold)
}

fn status_color(status: &str) -> Color {
    match status {
        "complete" => Color::Green,
        "cancelled" => Color::Yellow,
        "failed" => Color::Red,
        _ => Color::White,
    }
}
