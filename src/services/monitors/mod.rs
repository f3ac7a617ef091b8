//! Runtime monitors run against every persona candidate.

pub mod repetition;
pub mod similarity;
pub mod stagnation;

pub use repetition::RepetitionMonitor;
pub use stagnation::StagnationMonitor;

use crate::domain::errors::{RolloutError, RolloutResult};
use crate::domain::models::LoomConfig;
use crate::domain::ports::Monitor;

/// The monitor chain for a config, in check order.
pub fn build_monitors(config: &LoomConfig) -> RolloutResult<Vec<Box<dyn Monitor>>> {
    let interaction = &config.interaction;
    let repetition = RepetitionMonitor::new(interaction.repetition_detection.clone())
        .map_err(|e| RolloutError::ConfigPrecondition(format!("invalid banned pattern: {e}")))?;

    Ok(vec![
        Box::new(repetition),
        Box::new(StagnationMonitor::new(interaction.stagnation_detection.clone())),
    ])
}
