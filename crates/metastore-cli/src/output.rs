//! Status lines
//!
//! Document JSON goes to stdout; status lines about it go to stderr unless the command
//! completed, so `metastore get ... | jq` stays parseable.

use colored::{ColoredString, Colorize};
use std::fmt::Display;

/// Outcome of a command step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Warning,
    Failed,
}

impl Outcome {
    fn marker(self) -> ColoredString {
        match self {
            Outcome::Done => "✓".green().bold(),
            Outcome::Warning => "⚠".yellow().bold(),
            Outcome::Failed => "✗".red().bold(),
        }
    }
}

/// Print one status line for `outcome`
pub fn report(outcome: Outcome, msg: impl Display) {
    match outcome {
        Outcome::Done => println!("{} {}", outcome.marker(), msg),
        Outcome::Warning | Outcome::Failed => eprintln!("{} {}", outcome.marker(), msg),
    }
}

/// Log directives for a `-v` count; only this workspace's crates get louder
pub fn log_directives(verbosity: u8) -> String {
    let level = match verbosity {
        0 => return "warn".to_string(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    format!("warn,metastore={}", level)
}
