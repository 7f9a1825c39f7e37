// src/bin/flowrun.rs

//! The `flowrun` command-line entry point.

use anyhow::Result;
use clap::Parser;
use colored::*;
use flowrun::{
    cli::{Cli, handlers},
    core::errors::FlowError,
};

// --- Mode Definition and Registry ---

/// What the binary does with the flow on its command line.
struct ModeDefinition {
    name: &'static str,
    selected: fn(&Cli) -> bool,
    handler: fn(&Cli) -> Result<()>,
}

/// Checked in order; the first selected mode handles the invocation. Running
/// the flow is the fallback.
static MODE_REGISTRY: &[ModeDefinition] = &[ModeDefinition {
    name: "describe",
    selected: wants_describe,
    handler: handlers::describe::handle,
}];

fn wants_describe(cli: &Cli) -> bool {
    cli.desc
}

/// Sets up logging, parses arguments, dispatches to the selected mode and
/// handles errors in one place.
fn main() {
    env_logger::init();

    if let Err(e) = run_cli(&Cli::parse()) {
        // A user quitting from a pause menu exits like an interrupted shell command.
        if e
            .downcast_ref::<FlowError>()
            .is_some_and(FlowError::is_abort)
        {
            std::process::exit(130);
        }

        eprintln!("\n{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_cli(cli: &Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);
    match MODE_REGISTRY.iter().find(|mode| (mode.selected)(cli)) {
        Some(mode) => {
            log::debug!("Mode: {}", mode.name);
            (mode.handler)(cli)
        }
        None => handlers::run::handle(cli),
    }
}
