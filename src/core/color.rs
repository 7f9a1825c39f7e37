// src/core/color.rs

//! Semantic colors for everything printed to the screen.

use colored::{ColoredString, Colorize};

/// Headers and pause reasons.
pub fn tip(text: &str) -> ColoredString {
    text.cyan()
}

/// Command paths.
pub fn cmd(text: &str) -> ColoredString {
    text.bold()
}

/// Choice keys and warnings.
pub fn warn(text: &str) -> ColoredString {
    text.yellow()
}

/// Secondary detail.
pub fn explain(text: &str) -> ColoredString {
    text.dimmed()
}

/// Failures.
pub fn error(text: &str) -> ColoredString {
    text.red()
}

/// Success markers.
pub fn ok(text: &str) -> ColoredString {
    text.green()
}

/// Env keys in descriptions.
pub fn key(text: &str) -> ColoredString {
    text.blue()
}
