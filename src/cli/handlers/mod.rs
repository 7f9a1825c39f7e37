// src/cli/handlers/mod.rs

//! The two things the binary can do with a flow: run it or describe it.

pub mod commons;
/// Dry-run description of a flow.
pub mod describe;
/// Executes a flow.
pub mod run;
