// src/builtin/mod.rs

//! Commands every command tree starts with.

mod debug;
mod env;
mod flow;
mod misc;

use crate::core::cmd_tree::CmdTree;

/// Adds every builtin command to `tree`.
pub fn register_builtins(tree: &mut CmdTree) {
    misc::register(tree);
    env::register(tree);
    debug::register(tree);
    flow::register(tree);
}
