//! Injection scheduling: which turns re-assert scaffolding.

use crate::domain::models::{InjectionMode, InjectionSpec};

/// Decide the injection mode for `turn`.
///
/// Full re-injection on multiples of `frequency` (turn 0 included), reminders
/// on multiples of `reminder_frequency` otherwise. A frequency of zero never
/// fires.
pub fn schedule(turn: u32, frequency: u32, reminder_frequency: u32) -> InjectionMode {
    let fires = |every: u32| turn.checked_rem(every) == Some(0);

    if fires(frequency) {
        InjectionMode::Full
    } else if fires(reminder_frequency) {
        InjectionMode::Reminder
    } else {
        InjectionMode::None
    }
}

/// Scheduler bound to a config's injection settings.
#[derive(Debug, Clone, Copy)]
pub struct InjectionScheduler {
    frequency: u32,
    reminder_frequency: u32,
}

impl InjectionScheduler {
    pub fn new(spec: &InjectionSpec) -> Self {
        Self {
            frequency: spec.frequency,
            reminder_frequency: spec.reminder_frequency,
        }
    }

    pub fn mode_for(&self, turn: u32) -> InjectionMode {
        schedule(turn, self.frequency, self.reminder_frequency)
    }
}
