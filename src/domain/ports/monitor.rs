//! Runtime monitor port.

use crate::domain::models::{Message, MonitorResult};

/// Inputs to a monitor check for one persona candidate.
#[derive(Debug, Clone, Copy)]
pub struct MonitorContext<'a> {
    pub turn_index: u32,
    /// The persona message just produced, not yet accepted.
    pub candidate: &'a str,
    pub persona_name: &'a str,
    /// Text of the next unused revelation, if one remains.
    pub next_revelation: Option<&'a str>,
}

/// A runtime check over persona output.
///
/// Implementations keep their own sliding windows, fed through
/// [`Monitor::observe`] with every message the orchestrator accepts.
/// Degenerate input (empty windows, empty text) yields
/// [`MonitorResult::none`], never a panic.
pub trait Monitor: Send {
    fn name(&self) -> &'static str;

    fn check(&mut self, ctx: &MonitorContext<'_>) -> MonitorResult;

    /// Record an accepted message.
    fn observe(&mut self, _message: &Message) {}
}
