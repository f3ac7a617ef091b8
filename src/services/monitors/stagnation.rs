//! Agreement-loop detection.
//!
//! Fires when the persona keeps saying the same thing (self-repetition) or
//! starts mirroring the counterpart (convergence). The produced message is
//! kept; the intervention shapes the next turn.

use std::collections::{BTreeMap, VecDeque};

use super::similarity::{aligned_similarity, window_self_similarity};
use crate::domain::models::{
    Message, MonitorResult, SpeakerRole, StagnationDetectionSpec, TriggerReason,
};
use crate::domain::ports::{Monitor, MonitorContext};
use crate::services::templates::{self, DEFAULT_INTERVENTION_TEMPLATE, GENERIC_INTERVENTION};

pub struct StagnationMonitor {
    spec: StagnationDetectionSpec,
    persona_window: VecDeque<String>,
    counterpart_window: VecDeque<String>,
}

impl StagnationMonitor {
    pub fn new(spec: StagnationDetectionSpec) -> Self {
        Self {
            persona_window: VecDeque::with_capacity(spec.window),
            counterpart_window: VecDeque::with_capacity(spec.window),
            spec,
        }
    }

    fn intervention_text(&self, ctx: &MonitorContext<'_>) -> String {
        let Some(revelation) = ctx.next_revelation else {
            return GENERIC_INTERVENTION.to_string();
        };
        let template = match self.spec.intervention_template.trim() {
            "" => DEFAULT_INTERVENTION_TEMPLATE,
            configured => configured,
        };
        let values = BTreeMap::from([
            ("name", ctx.persona_name.to_string()),
            ("next_unused_revelation", revelation.to_string()),
        ]);
        templates::substitute(template, &values)
    }

    /// Persona window for a check: recent accepted messages plus the candidate.
    fn persona_messages<'a>(&'a self, candidate: &'a str) -> Vec<&'a str> {
        let keep = self.spec.window.saturating_sub(1);
        let skip = self.persona_window.len().saturating_sub(keep);
        self.persona_window
            .iter()
            .skip(skip)
            .map(String::as_str)
            .chain(std::iter::once(candidate))
            .collect()
    }
}

fn push_bounded(window: &mut VecDeque<String>, capacity: usize, text: &str) {
    if capacity == 0 {
        return;
    }
    while window.len() >= capacity {
        window.pop_front();
    }
    window.push_back(text.to_string());
}

impl Monitor for StagnationMonitor {
    fn name(&self) -> &'static str {
        "stagnation"
    }

    fn check(&mut self, ctx: &MonitorContext<'_>) -> MonitorResult {
        if !self.spec.enabled || ctx.turn_index < self.spec.min_turn || self.spec.window < 2 {
            return MonitorResult::none();
        }
        if ctx.candidate.trim().is_empty() {
            return MonitorResult::none();
        }

        let persona = self.persona_messages(ctx.candidate);
        if let Some(score) = window_self_similarity(&persona, self.spec.aggregate) {
            if score > self.spec.similarity_threshold {
                return MonitorResult::inject(
                    TriggerReason::SelfRepetition,
                    format!("similarity {score:.3} > {:.3}", self.spec.similarity_threshold),
                    self.intervention_text(ctx),
                );
            }
        }

        let counterpart: Vec<&str> = self.counterpart_window.iter().map(String::as_str).collect();
        if let Some(score) = aligned_similarity(&persona, &counterpart, self.spec.aggregate) {
            if score > self.spec.convergence_threshold {
                return MonitorResult::inject(
                    TriggerReason::Convergence,
                    format!("convergence {score:.3} > {:.3}", self.spec.convergence_threshold),
                    self.intervention_text(ctx),
                );
            }
        }

        MonitorResult::none()
    }

    fn observe(&mut self, message: &Message) {
        match message.speaker {
            SpeakerRole::Persona => push_bounded(&mut self.persona_window, self.spec.window, &message.text),
            SpeakerRole::Interlocutor | SpeakerRole::Adversary => {
                push_bounded(&mut self.counterpart_window, self.spec.window, &message.text);
            }
            SpeakerRole::System => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::MonitorAction;

    fn spec() -> StagnationDetectionSpec {
        StagnationDetectionSpec {
            window: 4,
            min_turn: 5,
            intervention_template: "{name}: bring up {next_unused_revelation}".into(),
            ..StagnationDetectionSpec::default()
        }
    }

    fn ctx<'a>(turn: u32, candidate: &'a str, revelation: Option<&'a str>) -> MonitorContext<'a> {
        MonitorContext {
            turn_index: turn,
            candidate,
            persona_name: "Dana",
            next_revelation: revelation,
        }
    }

    const REPEATED: [&str; 4] = [
        "I just don't know what to do anymore, honestly.",
        "Honestly, I just don't know what to do anymore.",
        "I just don't know what to do anymore honestly",
        "honestly I just do not know what to do anymore",
    ];

    const DIVERSE: [&str; 4] = [
        "My sister called on Sunday about the garden.",
        "Work used to start at seven, trucks lined up outside.",
        "I watched an old western last night, fell asleep halfway.",
        "Rent went up again, and the landlord never fixes the heater.",
    ];

    fn feed_persona(monitor: &mut StagnationMonitor, messages: &[&str]) {
        for (i, text) in messages.iter().enumerate() {
            monitor.observe(&Message::persona(*text, i as u32));
        }
    }

    #[test]
    fn test_near_identical_window_triggers_self_repetition() {
        let mut monitor = StagnationMonitor::new(spec());
        feed_persona(&mut monitor, &REPEATED[..3]);

        let result = monitor.check(&ctx(6, REPEATED[3], Some("I lost my job.")));
        assert_eq!(result.action, MonitorAction::Inject);
        assert_eq!(result.reason, Some(TriggerReason::SelfRepetition));
        assert_eq!(result.intervention_text.as_deref(), Some("Dana: bring up I lost my job."));
    }

    #[test]
    fn test_diverse_window_never_triggers() {
        let mut monitor = StagnationMonitor::new(spec());
        feed_persona(&mut monitor, &DIVERSE[..3]);
        monitor.observe(&Message::new(SpeakerRole::Interlocutor, "That sounds hard, tell me more.", 5));

        let result = monitor.check(&ctx(6, DIVERSE[3], None));
        assert!(!result.triggered());
    }

    #[test]
    fn test_no_trigger_before_min_turn() {
        let mut monitor = StagnationMonitor::new(spec());
        feed_persona(&mut monitor, &REPEATED[..3]);
        let result = monitor.check(&ctx(4, REPEATED[3], None));
        assert!(!result.triggered());
    }

    #[test]
    fn test_convergence_with_counterpart() {
        let mut monitor = StagnationMonitor::new(spec());
        feed_persona(&mut monitor, &DIVERSE[..2]);
        monitor.observe(&Message::new(
            SpeakerRole::Interlocutor,
            "It is so important to be kind to yourself right now.",
            5,
        ));

        let result = monitor.check(&ctx(6, "It is so important to be kind to yourself right now", None));
        assert_eq!(result.reason, Some(TriggerReason::Convergence));
        assert_eq!(result.intervention_text.as_deref(), Some(GENERIC_INTERVENTION));
    }

    #[test]
    fn test_empty_history_is_degenerate_not_error() {
        let mut monitor = StagnationMonitor::new(spec());
        assert!(!monitor.check(&ctx(10, "anything at all", None)).triggered());
        assert!(!monitor.check(&ctx(10, "", None)).triggered());
    }

    #[test]
    fn test_window_is_bounded() {
        let mut monitor = StagnationMonitor::new(spec());
        feed_persona(&mut monitor, &DIVERSE);
        feed_persona(&mut monitor, &DIVERSE);
        assert_eq!(monitor.persona_window.len(), 4);
        assert_eq!(monitor.persona_messages("x").len(), 4);
    }

    #[test]
    fn test_disabled_monitor_is_silent() {
        let mut monitor = StagnationMonitor::new(StagnationDetectionSpec { enabled: false, ..spec() });
        feed_persona(&mut monitor, &REPEATED[..3]);
        assert!(!monitor.check(&ctx(9, REPEATED[3], None)).triggered());
    }
}
