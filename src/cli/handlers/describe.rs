// src/cli/handlers/describe.rs

use crate::cli::Cli;
use crate::cli::handlers::commons;
use crate::core::describe::{self, DumpFlowArgs};
use anyhow::Result;
use colored::*;

/// Prints the plan of the flow given on the command line without running it.
/// The bootstrap flow is not run either.
pub fn handle(cli: &Cli) -> Result<()> {
    if cli.flow.is_empty() {
        println!("{}", t!("cli.run.empty").yellow());
        return Ok(());
    }

    let mut session = commons::open_session(cli)?;
    let flow = session.cc.parse(&cli.flow);
    describe::describe_flow(&mut session.cc, &session.env, &flow, &dump_args(cli))?;
    Ok(())
}

fn dump_args(cli: &Cli) -> DumpFlowArgs {
    let mut args = DumpFlowArgs::default()
        .set_max_depth(cli.max_depth)
        .set_max_trivial(cli.max_trivial);
    if cli.simple {
        args = args.set_simple();
    }
    if cli.skeleton {
        args = args.set_skeleton();
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_dump_args_from_flags() {
        let cli = Cli::try_parse_from(["flowrun", "--desc", "--skeleton", "--max-trivial", "3", "x"]).unwrap();
        let args = dump_args(&cli);
        assert!(args.skeleton);
        assert_eq!(args.max_trivial, 3);
        assert_eq!(args.max_depth, 32);
    }
}
