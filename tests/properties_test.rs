//! Property tests over planning and seed derivation.

mod common;

use proptest::prelude::*;
use test_strategy::proptest;

use loom::domain::models::{derive_seed, InjectionMode};
use loom::services::injection::schedule;
use loom::services::Scaffolder;

/// Phases only ever move forward and intensities stay under the ceiling.
#[proptest]
fn prop_plans_are_monotone_and_bounded(#[strategy(1u32..60)] expected_turns: u32) {
    let config = common::fixture_config();
    let scaffolder = Scaffolder::new(&config, expected_turns).unwrap();
    let ceiling = config.safety.intensity_ceiling;

    let mut last_phase = 0;
    for turn in 0..expected_turns {
        let plan = scaffolder.plan(turn).unwrap();
        prop_assert!(plan.phase_index >= last_phase);
        last_phase = plan.phase_index;
        for value in plan.intensities.values() {
            prop_assert!((0.0..=ceiling).contains(value), "{value} outside [0, {ceiling}]");
        }
    }
}

/// Turn 0 always rebuilds, and any multiple of the frequency does too.
#[proptest]
fn prop_schedule_full_on_frequency(
    #[strategy(1u32..20)] frequency: u32,
    #[strategy(1u32..20)] reminder_frequency: u32,
    #[strategy(0u32..50)] k: u32,
) {
    prop_assert_eq!(schedule(0, frequency, reminder_frequency), InjectionMode::Full);
    prop_assert_eq!(schedule(k * frequency, frequency, reminder_frequency), InjectionMode::Full);
}

proptest::proptest! {
    /// Rollout seeds of one run never collide for small run sizes.
    #[test]
    fn prop_rollout_seeds_distinct(base in any::<u64>(), count in 2u32..64) {
        let mut seeds: Vec<u64> = (0..count).map(|i| derive_seed(base, i)).collect();
        seeds.sort_unstable();
        seeds.dedup();
        prop_assert_eq!(seeds.len(), count as usize);
    }
}
