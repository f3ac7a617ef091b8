//! Command-line interface
//!
//! clap definitions, command implementations and terminal output. `anyhow`
//! is used from here outwards only.

pub mod commands;
pub mod output;
pub mod types;

use console::style;

pub use types::{Cli, Commands};

/// Print `err` to stderr and exit with status 1.
///
/// In JSON mode the error is a single `{"error": ..., "causes": [...]}` document.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({ "error": err.to_string(), "causes": causes });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {}", style("error:").red().bold(), err);
        for cause in err.chain().skip(1) {
            eprintln!("  {} {}", style("caused by:").dim(), cause);
        }
    }
    std::process::exit(1);
}
