// src/builtin/misc.rs

use crate::core::cmd_tree::CmdTree;
use crate::core::context::Context;
use crate::core::env::Env;
use crate::core::errors::FlowResult;
use crate::core::flow::ParsedCmd;
use crate::models::{ArgVals, Command};

pub(super) fn register(tree: &mut CmdTree) {
    tree.add_cmd(
        Command::normal(&["echo"], t!("builtin.echo.help"), echo).add_arg("msg", "", &["m", "text"]),
        &[],
    );
    tree.add_cmd(
        Command::normal(&["dummy"], t!("builtin.dummy.help"), dummy),
        &["dmy".to_string()],
    );
}

/// Prints its `msg` argument.
fn echo(argv: &ArgVals, cc: &mut Context, _env: &mut Env, _cmd: &ParsedCmd) -> FlowResult<bool> {
    cc.print(&format!("{}\n", argv.get_raw("msg")));
    Ok(true)
}

fn dummy(_argv: &ArgVals, cc: &mut Context, _env: &mut Env, _cmd: &ParsedCmd) -> FlowResult<bool> {
    cc.print(&format!("{}\n", t!("builtin.dummy.output")));
    Ok(true)
}

#[cfg(test)]
mod tests {
    use crate::core::testing::TestBed;

    #[test]
    fn test_echo_by_abbreviation_and_position() {
        let mut bed = TestBed::new("");
        bed.run("echo m=one : echo two").unwrap();
        let out = bed.output();
        assert!(out.contains("one\n"));
        assert!(out.contains("two\n"));
    }

    #[test]
    fn test_dummy_succeeds() {
        let mut bed = TestBed::new("");
        assert!(bed.run("dmy").unwrap().succeeded);
    }
}
