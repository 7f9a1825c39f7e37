// src/cli/handlers/run.rs

use crate::cli::Cli;
use crate::cli::handlers::commons;
use crate::core::executor;
use anyhow::{Result, anyhow};
use colored::*;

/// Runs the flow given on the command line, after the bootstrap flow.
pub fn handle(cli: &Cli) -> Result<()> {
    if cli.flow.is_empty() {
        println!("{}", t!("cli.run.empty").yellow());
        return Ok(());
    }

    let mut session = commons::open_session(cli)?;
    session.run_bootstrap()?;

    let run = executor::execute(&mut session.cc, &mut session.env, &cli.flow)?;
    log::debug!("Flow finished, succeeded: {}", run.succeeded);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&run.executed)?);
    }
    if !run.succeeded {
        return Err(anyhow!(t!("cli.error.flow_failed")));
    }
    Ok(())
}
