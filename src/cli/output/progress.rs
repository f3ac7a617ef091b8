//! Progress bars using indicatif
//!
//! Bars draw to stderr and are hidden in `--json` mode so stdout stays a
//! single JSON document.

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

const ROLLOUT_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} rollouts {msg}";
const PROGRESS_CHARS: &str = "█▓▒░ ";

/// Progress bar counting finished rollouts.
pub fn create_rollout_bar(total: u64, hidden: bool) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if hidden {
        pb.set_draw_target(ProgressDrawTarget::hidden());
        return pb;
    }
    let style = ProgressStyle::default_bar()
        .template(ROLLOUT_TEMPLATE)
        .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars(PROGRESS_CHARS));
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Extension trait for ProgressBar to add common utility methods
pub trait ProgressBarExt {
    /// Finish with a success message (green checkmark)
    fn finish_success(&self, message: impl Into<String>);

    /// Finish with a warning message (yellow !)
    fn finish_warning(&self, message: impl Into<String>);

    /// Print a line above the bar
    fn note(&self, message: impl Into<String>);
}

impl ProgressBarExt for ProgressBar {
    fn finish_success(&self, message: impl Into<String>) {
        self.finish_with_message(format!("{} {}", style("✓").green(), message.into()));
    }

    fn finish_warning(&self, message: impl Into<String>) {
        self.finish_with_message(format!("{} {}", style("!").yellow(), message.into()));
    }

    fn note(&self, message: impl Into<String>) {
        if !self.is_hidden() {
            self.println(message.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_bar_tracks_position() {
        let pb = create_rollout_bar(3, true);
        pb.inc(2);
        assert_eq!(pb.position(), 2);
        pb.finish_success("done");
        assert!(pb.is_finished());
    }
}
