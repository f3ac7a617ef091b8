//! Trajectory curve interpolation.
//!
//! Maps a trajectory position `p ∈ [0, 1]` to a dimension intensity. Every
//! output is clamped to the dimension's `[min_value, max_value]` and then to
//! the global safety ceiling.

use crate::domain::errors::CurveError;
use crate::domain::models::{CurveSpec, DimensionSpec};

/// Steepness of the logistic curve.
pub const SIGMOID_STEEPNESS: f64 = 12.0;

/// Compute the clamped intensity of `dimension` at `position`.
pub fn interpolate(dimension: &DimensionSpec, position: f64, ceiling: f64) -> Result<f64, CurveError> {
    check_parameters(dimension)?;
    let p = if position.is_nan() { 0.0 } else { position.clamp(0.0, 1.0) };
    let raw = raw_value(dimension, p);
    Ok(clamp_value(raw, dimension.min_value, dimension.max_value, ceiling))
}

/// Validate curve parameters and bounds without interpolating.
pub fn check_parameters(dimension: &DimensionSpec) -> Result<(), CurveError> {
    if dimension.min_value.is_nan()
        || dimension.max_value.is_nan()
        || dimension.min_value > dimension.max_value
    {
        return Err(invalid(format!(
            "min_value {} exceeds max_value {}",
            dimension.min_value, dimension.max_value
        )));
    }
    if !dimension.start_value.is_finite() || !dimension.end_value.is_finite() {
        return Err(invalid("start_value and end_value must be finite"));
    }

    match &dimension.curve {
        CurveSpec::Linear => Ok(()),
        CurveSpec::Sigmoid { midpoint_pct } => {
            if *midpoint_pct > 0.0 && *midpoint_pct < 1.0 {
                Ok(())
            } else {
                Err(invalid(format!("sigmoid midpoint_pct {midpoint_pct} must lie in (0, 1)")))
            }
        }
        CurveSpec::DelayedRamp { delay_pct } => {
            if *delay_pct >= 0.0 && *delay_pct < 1.0 {
                Ok(())
            } else {
                Err(invalid(format!("delayed_ramp delay_pct {delay_pct} must lie in [0, 1)")))
            }
        }
        CurveSpec::Step { step_thresholds, step_levels } => {
            check_step(step_thresholds, step_levels, dimension.start_value, dimension.end_value)
        }
    }
}

fn check_step(thresholds: &[f64], levels: &[f64], start: f64, end: f64) -> Result<(), CurveError> {
    if thresholds.is_empty() {
        return Err(invalid("step curve requires at least one threshold"));
    }
    if thresholds.iter().any(|t| !(0.0..=1.0).contains(t)) {
        return Err(invalid("step thresholds must lie in [0, 1]"));
    }
    if thresholds.windows(2).any(|w| w[0] >= w[1]) {
        return Err(invalid("step thresholds must be strictly increasing"));
    }
    if levels.is_empty() {
        return Ok(());
    }
    if levels.len() != thresholds.len() {
        return Err(invalid(format!(
            "step curve has {} thresholds but {} levels",
            thresholds.len(),
            levels.len()
        )));
    }

    let mut sequence = Vec::with_capacity(levels.len() + 1);
    sequence.push(start);
    sequence.extend_from_slice(levels);
    let monotone = if end >= start {
        sequence.windows(2).all(|w| w[0] <= w[1])
    } else {
        sequence.windows(2).all(|w| w[0] >= w[1])
    };
    if monotone {
        Ok(())
    } else {
        Err(invalid("step levels must move monotonically from start_value toward end_value"))
    }
}

fn raw_value(dimension: &DimensionSpec, p: f64) -> f64 {
    let start = dimension.start_value;
    let span = dimension.end_value - start;

    match &dimension.curve {
        CurveSpec::Linear => start + p * span,
        CurveSpec::Sigmoid { midpoint_pct } => start + sigmoid_fraction(p, *midpoint_pct) * span,
        CurveSpec::DelayedRamp { delay_pct } => {
            if p <= *delay_pct {
                start
            } else {
                start + (p - delay_pct) / (1.0 - delay_pct) * span
            }
        }
        CurveSpec::Step { step_thresholds, step_levels } => {
            let passed = step_thresholds.iter().take_while(|t| **t <= p).count();
            if passed == 0 {
                start
            } else if step_levels.is_empty() {
                start + (passed as f64 / step_thresholds.len() as f64) * span
            } else {
                step_levels[passed - 1]
            }
        }
    }
}

/// Logistic fraction in `[0, 1]` with `f(0) = 0`, `f(midpoint) = 0.5`, `f(1) = 1`.
///
/// Each side of the midpoint is rescaled independently so the inflection
/// value is exact even for off-centre midpoints.
fn sigmoid_fraction(p: f64, midpoint: f64) -> f64 {
    let logistic = |x: f64| 1.0 / (1.0 + (-SIGMOID_STEEPNESS * (x - midpoint)).exp());
    let at_zero = logistic(0.0);
    let at_one = logistic(1.0);
    let at_p = logistic(p);

    if p <= midpoint {
        0.5 * (at_p - at_zero) / (0.5 - at_zero)
    } else {
        0.5 + 0.5 * (at_p - 0.5) / (at_one - 0.5)
    }
}

fn clamp_value(value: f64, min: f64, max: f64, ceiling: f64) -> f64 {
    value.max(min).min(max).min(ceiling)
}

fn invalid(message: impl Into<String>) -> CurveError {
    CurveError::InvalidCurveParameters(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const CEILING: f64 = 0.9;

    fn dim(curve: CurveSpec, start: f64, end: f64) -> DimensionSpec {
        DimensionSpec {
            description: String::new(),
            levels: vec![],
            curve,
            start_value: start,
            end_value: end,
            min_value: 0.0,
            max_value: 0.9,
        }
    }

    #[test]
    fn test_linear_midpoint() {
        let d = dim(CurveSpec::Linear, 0.1, 0.7);
        let v = interpolate(&d, 0.5, CEILING).unwrap();
        assert!((v - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_linear_endpoints() {
        let d = dim(CurveSpec::Linear, 0.1, 0.7);
        assert!((interpolate(&d, 0.0, CEILING).unwrap() - 0.1).abs() < 1e-9);
        assert!((interpolate(&d, 1.0, CEILING).unwrap() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_sigmoid_at_midpoint_is_halfway() {
        for midpoint in [0.2, 0.5, 0.7] {
            let d = dim(CurveSpec::Sigmoid { midpoint_pct: midpoint }, 0.1, 0.8);
            let v = interpolate(&d, midpoint, CEILING).unwrap();
            assert!((v - 0.45).abs() < 0.02, "midpoint {midpoint} gave {v}");
        }
    }

    #[test]
    fn test_sigmoid_hits_endpoints_and_is_monotone() {
        let d = dim(CurveSpec::Sigmoid { midpoint_pct: 0.4 }, 0.1, 0.8);
        assert!((interpolate(&d, 0.0, CEILING).unwrap() - 0.1).abs() < 1e-9);
        assert!((interpolate(&d, 1.0, CEILING).unwrap() - 0.8).abs() < 1e-9);

        let mut prev = f64::MIN;
        for i in 0..=100 {
            let v = interpolate(&d, f64::from(i) / 100.0, CEILING).unwrap();
            assert!(v >= prev - 1e-12);
            prev = v;
        }
    }

    #[test]
    fn test_sigmoid_decreasing() {
        let d = dim(CurveSpec::Sigmoid { midpoint_pct: 0.5 }, 0.8, 0.2);
        let early = interpolate(&d, 0.1, CEILING).unwrap();
        let late = interpolate(&d, 0.9, CEILING).unwrap();
        assert!(early > late);
    }

    #[test]
    fn test_sigmoid_rejects_edge_midpoint() {
        let d = dim(CurveSpec::Sigmoid { midpoint_pct: 1.0 }, 0.1, 0.8);
        assert!(matches!(interpolate(&d, 0.5, CEILING), Err(CurveError::InvalidCurveParameters(_))));
    }

    #[test]
    fn test_delayed_ramp_flat_before_delay() {
        let d = dim(CurveSpec::DelayedRamp { delay_pct: 0.4 }, 0.2, 0.8);
        for p in [0.0, 0.1, 0.25, 0.39] {
            assert_eq!(interpolate(&d, p, CEILING).unwrap(), 0.2);
        }
        let v = interpolate(&d, 0.7, CEILING).unwrap();
        assert!((v - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_step_evenly_spaced_levels() {
        let d = dim(
            CurveSpec::Step { step_thresholds: vec![0.25, 0.5, 0.75], step_levels: vec![] },
            0.0,
            0.9,
        );
        assert_eq!(interpolate(&d, 0.1, CEILING).unwrap(), 0.0);
        assert!((interpolate(&d, 0.3, CEILING).unwrap() - 0.3).abs() < 1e-9);
        assert!((interpolate(&d, 0.5, CEILING).unwrap() - 0.6).abs() < 1e-9);
        assert!((interpolate(&d, 0.99, CEILING).unwrap() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_step_explicit_levels() {
        let d = dim(
            CurveSpec::Step { step_thresholds: vec![0.3, 0.6], step_levels: vec![0.35, 0.8] },
            0.1,
            0.8,
        );
        assert_eq!(interpolate(&d, 0.29, CEILING).unwrap(), 0.1);
        assert_eq!(interpolate(&d, 0.3, CEILING).unwrap(), 0.35);
        assert_eq!(interpolate(&d, 0.7, CEILING).unwrap(), 0.8);
    }

    #[test]
    fn test_step_rejects_unsorted_thresholds() {
        let d = dim(
            CurveSpec::Step { step_thresholds: vec![0.6, 0.3], step_levels: vec![] },
            0.1,
            0.8,
        );
        assert!(interpolate(&d, 0.5, CEILING).is_err());
    }

    #[test]
    fn test_step_rejects_non_monotone_levels() {
        let d = dim(
            CurveSpec::Step { step_thresholds: vec![0.3, 0.6], step_levels: vec![0.6, 0.4] },
            0.1,
            0.8,
        );
        assert!(interpolate(&d, 0.5, CEILING).is_err());
    }

    #[test]
    fn test_clamped_to_bounds_and_ceiling() {
        let mut d = dim(CurveSpec::Linear, 0.0, 1.0);
        d.min_value = 0.2;
        d.max_value = 0.85;
        assert_eq!(interpolate(&d, 0.0, CEILING).unwrap(), 0.2);
        assert_eq!(interpolate(&d, 1.0, CEILING).unwrap(), 0.85);
        assert_eq!(interpolate(&d, 1.0, 0.5).unwrap(), 0.5);
    }

    #[test]
    fn test_min_above_max_rejected() {
        let mut d = dim(CurveSpec::Linear, 0.3, 0.5);
        d.min_value = 0.6;
        d.max_value = 0.4;
        assert!(interpolate(&d, 0.5, CEILING).is_err());
    }

    fn curve_strategy() -> impl Strategy<Value = CurveSpec> {
        prop_oneof![
            Just(CurveSpec::Linear),
            (0.05f64..0.95).prop_map(|m| CurveSpec::Sigmoid { midpoint_pct: m }),
            (0.0f64..0.95).prop_map(|d| CurveSpec::DelayedRamp { delay_pct: d }),
            prop::collection::btree_set(1u32..100, 1..5).prop_map(|set| CurveSpec::Step {
                step_thresholds: set.into_iter().map(|t| f64::from(t) / 100.0).collect(),
                step_levels: vec![],
            }),
        ]
    }

    proptest! {
        /// Property: every output respects min <= v <= max <= ceiling
        #[test]
        fn proptest_outputs_within_bounds(
            curve in curve_strategy(),
            start in 0.0f64..1.0,
            end in 0.0f64..1.0,
            min in 0.0f64..0.4,
            max in 0.5f64..0.9,
            p in 0.0f64..=1.0,
        ) {
            let mut d = dim(curve, start, end);
            d.min_value = min;
            d.max_value = max;
            let v = interpolate(&d, p, CEILING).unwrap();
            prop_assert!(v >= min - 1e-12 && v <= max + 1e-12, "{v} outside [{min}, {max}]");
            prop_assert!(v <= CEILING);
        }

        /// Property: step curves only produce configured levels
        #[test]
        fn proptest_step_only_discrete_levels(
            thresholds in prop::collection::btree_set(1u32..100, 1..5),
            p in 0.0f64..=1.0,
        ) {
            let thresholds: Vec<f64> = thresholds.into_iter().map(|t| f64::from(t) / 100.0).collect();
            let count = thresholds.len();
            let d = dim(CurveSpec::Step { step_thresholds: thresholds, step_levels: vec![] }, 0.0, 0.8);
            let v = interpolate(&d, p, CEILING).unwrap();
            let allowed: Vec<f64> = (0..=count).map(|i| i as f64 / count as f64 * 0.8).collect();
            prop_assert!(allowed.iter().any(|a| (a - v).abs() < 1e-9), "{v} not in {allowed:?}");
        }
    }
}
