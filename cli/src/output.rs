//! Status notices for CLI commands
//!
//! Reports go to stdout; notices go to stderr so they never mix into piped
//! output.

use std::fmt::Display;

use colored::Colorize;

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Ok,
    Warn,
    Fail,
}

/// Print one notice line to stderr
pub fn notice(level: Level, msg: impl Display) {
    eprintln!("{}", line(level, msg));
}

fn line(level: Level, msg: impl Display) -> String {
    let marker = match level {
        Level::Ok => "✓".green(),
        Level::Warn => "⚠".yellow(),
        Level::Fail => "✗".red(),
    };
    format!("{} {}", marker, msg)
}
