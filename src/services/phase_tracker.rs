//! Phase resolution and revelation gating.

use std::collections::BTreeSet;

use crate::domain::errors::PhaseError;
use crate::domain::models::{PhaseSpec, RevelationSpec, RevelationVariants, TrajectorySpec};

/// Intensity below which the subtle variant is chosen.
pub const SUBTLE_BELOW: f64 = 0.33;
/// Intensity below which the moderate variant is chosen.
pub const MODERATE_BELOW: f64 = 0.66;

const BOUNDARY_EPSILON: f64 = 1e-9;

/// Severity of a revelation variant, ordered low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Subtle,
    Moderate,
    Direct,
}

impl Severity {
    const ORDER: [Self; 3] = [Self::Subtle, Self::Moderate, Self::Direct];

    pub fn for_intensity(intensity: f64) -> Self {
        if intensity < SUBTLE_BELOW {
            Self::Subtle
        } else if intensity < MODERATE_BELOW {
            Self::Moderate
        } else {
            Self::Direct
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subtle => "subtle",
            Self::Moderate => "moderate",
            Self::Direct => "direct",
        }
    }

    fn text(self, variants: &RevelationVariants) -> Option<&str> {
        match self {
            Self::Subtle => variants.subtle.as_deref(),
            Self::Moderate => variants.moderate.as_deref(),
            Self::Direct => variants.direct.as_deref(),
        }
    }
}

/// Pick the variant text for `target`, searching outward (lower severity
/// first) when the exact variant is missing.
pub fn select_variant(variants: &RevelationVariants, target: Severity) -> Option<(Severity, &str)> {
    let target_idx = Severity::ORDER.iter().position(|s| *s == target).unwrap_or(1);
    for offset in 0..Severity::ORDER.len() {
        let below = target_idx.checked_sub(offset);
        let above = Some(target_idx + offset).filter(|i| *i < Severity::ORDER.len());
        for idx in [below, above].into_iter().flatten() {
            let severity = Severity::ORDER[idx];
            if let Some(text) = severity.text(variants) {
                return Some((severity, text));
            }
        }
    }
    None
}

/// The phase in force at a position, with everything it unlocks.
#[derive(Debug, Clone)]
pub struct ActivePhase<'a> {
    pub index: usize,
    pub phase: &'a PhaseSpec,
    /// Revelations from this phase and every earlier one, in config order.
    pub unlocked: Vec<&'a RevelationSpec>,
}

impl<'a> ActivePhase<'a> {
    pub fn name(&self) -> &'a str {
        &self.phase.name
    }

    /// Unlocked revelations not yet exhausted.
    pub fn available<'s>(&'s self, exhausted: &'s BTreeSet<String>) -> impl Iterator<Item = &'a RevelationSpec> + 's {
        self.unlocked
            .iter()
            .copied()
            .filter(move |rev| !exhausted.contains(&rev.topic))
    }
}

/// Maps trajectory positions onto the ordered phase list.
#[derive(Debug, Clone)]
pub struct PhaseTracker<'a> {
    trajectory: &'a TrajectorySpec,
    boundaries: Vec<f64>,
}

impl<'a> PhaseTracker<'a> {
    /// Build a tracker, checking that the phases cover `[0, 1]`.
    pub fn new(trajectory: &'a TrajectorySpec, expected_turns: u32) -> Result<Self, PhaseError> {
        if trajectory.phases.is_empty() {
            return Err(PhaseError::NoPhases);
        }

        let boundaries: Vec<f64> = trajectory
            .phases
            .iter()
            .map(|phase| phase.end_condition.as_position(expected_turns))
            .collect();

        if let Some(pair) = boundaries.windows(2).find(|w| w[1] < w[0]) {
            return Err(PhaseError::PhaseCoverageGap { position: pair[1] });
        }
        if let Some(last) = boundaries.last().copied() {
            if (last - 1.0).abs() > BOUNDARY_EPSILON {
                return Err(PhaseError::PhaseCoverageGap { position: last });
            }
        }

        Ok(Self { trajectory, boundaries })
    }

    /// Resolve the phase covering `position`.
    ///
    /// Phase `i` covers `(end(i-1), end(i)]`, so a position on a boundary
    /// belongs to the phase ending there. The first phase also owns 0.0.
    pub fn resolve(&self, position: f64) -> Result<ActivePhase<'a>, PhaseError> {
        if !(0.0..=1.0).contains(&position) {
            return Err(PhaseError::PhaseCoverageGap { position });
        }

        let last = self.boundaries.len() - 1;
        let index = self
            .boundaries
            .iter()
            .position(|end| position <= *end + BOUNDARY_EPSILON)
            .unwrap_or(last);

        let phases = &self.trajectory.phases;
        let unlocked = phases[..=index]
            .iter()
            .flat_map(|phase| phase.revelations.iter())
            .collect();

        Ok(ActivePhase {
            index,
            phase: &phases[index],
            unlocked,
        })
    }
}
