// src/core/mod.rs

pub mod breakpoints;
pub mod cmd_tree;
pub mod color;
pub mod config_loader;
pub mod context;
pub mod describe;
pub mod dispatch;
pub mod env;
pub mod env_file;
/// Error types of the engine.
pub mod errors;
pub mod executor;
pub mod flow;
pub mod flow_store;
pub mod interactive;
pub mod parser;
/// Where config, flows and sessions live on disk.
pub mod paths;
/// `[[key]]` placeholder expansion.
pub mod render;

#[cfg(test)]
pub(crate) mod testing;
