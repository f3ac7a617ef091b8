//! Semantic validation of persona configs.
//!
//! Parsing guarantees shape; this module checks the cross-field invariants
//! the rollout engine relies on (phase coverage, dimension bounds, curve
//! parameters, monitor thresholds).

use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::errors::CurveError;
use crate::domain::models::{
    DimensionSpec, LoomConfig, TrajectorySpec, SUPPORTED_SCHEMA_VERSIONS,
};
use crate::services::curve;
use crate::services::monitors::repetition::compile_banned_pattern;

/// Tolerance when comparing the final phase boundary against 1.0.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// Persona config error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Expected a .yaml or .yml file, got: {0}")]
    UnsupportedExtension(PathBuf),

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported schema_version '{found}'. Supported: {supported}")]
    UnsupportedSchemaVersion { found: String, supported: String },

    #[error("expected_turns must be positive")]
    InvalidExpectedTurns,

    #[error("At least one phase is required")]
    NoPhases,

    #[error("At least one dimension is required")]
    NoDimensions,

    #[error("Duplicate phase name '{0}'")]
    DuplicatePhase(String),

    #[error("Phase '{phase}' ends at {boundary:.4}, which must be greater than the previous boundary {previous:.4}")]
    PhaseOrder {
        phase: String,
        boundary: f64,
        previous: f64,
    },

    #[error("Last phase '{phase}' must end at 1.0, got {boundary:.4}")]
    FinalBoundary { phase: String, boundary: f64 },

    #[error("Dimension '{dimension}': min_value ({min}) must be less than max_value ({max})")]
    InvalidBounds { dimension: String, min: f64, max: f64 },

    #[error("Dimension '{dimension}': {field} ({value}) must lie within [{min}, {max}]")]
    ValueOutOfBounds {
        dimension: String,
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Dimension '{dimension}': max_value ({max}) exceeds safety intensity_ceiling ({ceiling})")]
    CeilingExceeded {
        dimension: String,
        max: f64,
        ceiling: f64,
    },

    #[error("Safety intensity_ceiling must be in (0, 1], got {0}")]
    InvalidCeiling(f64),

    #[error("Dimension '{dimension}' ({curve} curve): {source}")]
    Curve {
        dimension: String,
        curve: &'static str,
        #[source]
        source: CurveError,
    },

    #[error("{context} references unknown phase '{phase}'")]
    UnknownPhase { context: String, phase: String },

    #[error("{context} references unknown dimension '{dimension}'")]
    UnknownDimension { context: String, dimension: String },

    #[error("Revelation '{0}' has no variant text")]
    EmptyRevelation(String),

    #[error("Invalid {0}: must be at least 1")]
    ZeroValue(&'static str),

    #[error("Invalid {field}: {value}. Must be within [0, 1]")]
    ThresholdOutOfRange { field: &'static str, value: f64 },

    #[error("Invalid banned pattern '{pattern}': {message}")]
    InvalidBannedPattern { pattern: String, message: String },
}

/// Validates a parsed [`LoomConfig`].
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a persona config, returning the first violation found.
    pub fn validate(config: &LoomConfig) -> Result<(), ConfigError> {
        if !SUPPORTED_SCHEMA_VERSIONS.contains(&config.schema_version.as_str()) {
            return Err(ConfigError::UnsupportedSchemaVersion {
                found: config.schema_version.clone(),
                supported: SUPPORTED_SCHEMA_VERSIONS.join(", "),
            });
        }

        let ceiling = config.safety.intensity_ceiling;
        if ceiling.is_nan() || ceiling <= 0.0 || ceiling > 1.0 {
            return Err(ConfigError::InvalidCeiling(ceiling));
        }

        Self::validate_trajectory(&config.trajectory, ceiling)?;
        Self::validate_interaction(config)?;
        Ok(())
    }

    fn validate_trajectory(trajectory: &TrajectorySpec, ceiling: f64) -> Result<(), ConfigError> {
        if trajectory.expected_turns == 0 {
            return Err(ConfigError::InvalidExpectedTurns);
        }
        if trajectory.phases.is_empty() {
            return Err(ConfigError::NoPhases);
        }
        if trajectory.dimensions.is_empty() {
            return Err(ConfigError::NoDimensions);
        }

        for (name, dimension) in &trajectory.dimensions {
            Self::validate_dimension(name, dimension, ceiling)?;
        }

        if let Some(primary) = &trajectory.primary_dimension {
            Self::require_dimension(trajectory, "trajectory.primary_dimension", primary)?;
        }

        let mut seen = BTreeSet::new();
        let mut previous = 0.0;
        for phase in &trajectory.phases {
            if !seen.insert(phase.name.as_str()) {
                return Err(ConfigError::DuplicatePhase(phase.name.clone()));
            }

            let boundary = phase.end_condition.as_position(trajectory.expected_turns);
            if boundary.is_nan() || boundary <= previous {
                return Err(ConfigError::PhaseOrder {
                    phase: phase.name.clone(),
                    boundary,
                    previous,
                });
            }
            previous = boundary;

            if let Some(primary) = &phase.primary_dimension {
                let context = format!("phase '{}' primary_dimension", phase.name);
                Self::require_dimension(trajectory, &context, primary)?;
            }

            for revelation in &phase.revelations {
                if revelation.variants.is_empty() {
                    return Err(ConfigError::EmptyRevelation(revelation.topic.clone()));
                }
                if let Some(dimension) = &revelation.dimension {
                    let context = format!("revelation '{}'", revelation.topic);
                    Self::require_dimension(trajectory, &context, dimension)?;
                }
            }
        }

        if let Some(last) = trajectory.phases.last() {
            if (previous - 1.0).abs() > BOUNDARY_EPSILON {
                return Err(ConfigError::FinalBoundary {
                    phase: last.name.clone(),
                    boundary: previous,
                });
            }
        }

        Ok(())
    }

    fn validate_dimension(name: &str, dimension: &DimensionSpec, ceiling: f64) -> Result<(), ConfigError> {
        let (min, max) = (dimension.min_value, dimension.max_value);
        if min.is_nan() || max.is_nan() || min >= max {
            return Err(ConfigError::InvalidBounds {
                dimension: name.to_string(),
                min,
                max,
            });
        }
        if max > ceiling {
            return Err(ConfigError::CeilingExceeded {
                dimension: name.to_string(),
                max,
                ceiling,
            });
        }

        for (field, value) in [
            ("min_value", min),
            ("start_value", dimension.start_value),
            ("end_value", dimension.end_value),
        ] {
            let (low, high) = if field == "min_value" { (0.0, 1.0) } else { (min, max) };
            if value.is_nan() || value < low || value > high {
                return Err(ConfigError::ValueOutOfBounds {
                    dimension: name.to_string(),
                    field,
                    value,
                    min: low,
                    max: high,
                });
            }
        }

        curve::check_parameters(dimension).map_err(|source| ConfigError::Curve {
            dimension: name.to_string(),
            curve: dimension.curve.kind(),
            source,
        })
    }

    fn validate_interaction(config: &LoomConfig) -> Result<(), ConfigError> {
        let interaction = &config.interaction;

        if interaction.injection.frequency == 0 {
            return Err(ConfigError::ZeroValue("injection.frequency"));
        }
        if interaction.injection.reminder_frequency == 0 {
            return Err(ConfigError::ZeroValue("injection.reminder_frequency"));
        }

        for phase in interaction.response_length.by_phase.keys() {
            if config.trajectory.phase(phase).is_none() {
                return Err(ConfigError::UnknownPhase {
                    context: "response_length.by_phase".to_string(),
                    phase: phase.clone(),
                });
            }
        }

        let stagnation = &interaction.stagnation_detection;
        if stagnation.enabled && stagnation.window == 0 {
            return Err(ConfigError::ZeroValue("stagnation_detection.window"));
        }
        for (field, value) in [
            ("stagnation_detection.similarity_threshold", stagnation.similarity_threshold),
            ("stagnation_detection.convergence_threshold", stagnation.convergence_threshold),
        ] {
            if value.is_nan() || !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange { field, value });
            }
        }

        for pattern in &interaction.repetition_detection.banned_patterns {
            compile_banned_pattern(pattern).map_err(|err| ConfigError::InvalidBannedPattern {
                pattern: pattern.clone(),
                message: err.to_string(),
            })?;
        }

        Ok(())
    }

    fn require_dimension(
        trajectory: &TrajectorySpec,
        context: &str,
        dimension: &str,
    ) -> Result<(), ConfigError> {
        if trajectory.dimensions.contains_key(dimension) {
            Ok(())
        } else {
            Err(ConfigError::UnknownDimension {
                context: context.to_string(),
                dimension: dimension.to_string(),
            })
        }
    }
}
