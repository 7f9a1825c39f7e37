//! Runs, steps through and describes flows of commands.

include!(concat!(env!("OUT_DIR"), "/translations.rs"));

pub mod builtin;
/// Command-line surface of the `flowrun` binary.
pub mod cli;
/// Env keys, file names and separators shared across modules.
pub mod constants;
/// The flow engine.
pub mod core;
/// Commands, their arguments and the on-disk file models.
pub mod models;
pub mod system;
