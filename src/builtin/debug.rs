// src/builtin/debug.rs

//! Debugging commands: set breakpoints and step mode from inside a flow.

use crate::constants::{KEY_DELAY_SEC, KEY_STEP_BY_STEP, PATH_SEP};
use crate::core::cmd_tree::CmdTree;
use crate::core::context::Context;
use crate::core::env::Env;
use crate::core::errors::{FlowError, FlowResult};
use crate::core::flow::ParsedCmd;
use crate::models::{ArgVals, Command};

const LIST_SEP: char = ',';

pub(super) fn register(tree: &mut CmdTree) {
    tree.add_cmd(
        Command::normal(&["dbg", "break", "before"], t!("builtin.dbg.before.help"), break_before)
            .add_arg("cmds", "", &["cmd", "c"])
            .set_quiet(),
        &[],
    );
    tree.add_cmd(
        Command::normal(&["dbg", "break", "after"], t!("builtin.dbg.after.help"), break_after)
            .add_arg("cmds", "", &["cmd", "c"])
            .set_quiet(),
        &[],
    );
    tree.add_cmd(
        Command::normal(&["dbg", "break", "at-end"], t!("builtin.dbg.at_end.help"), break_at_end).set_quiet(),
        &["end".to_string()],
    );
    tree.add_cmd(
        Command::normal(&["dbg", "step-by-step"], t!("builtin.dbg.step.help"), step_by_step)
            .add_arg("on", "true", &[])
            .set_quiet(),
        &["step".to_string()],
    );
    tree.add_cmd(
        Command::normal(&["dbg", "delay"], t!("builtin.dbg.delay.help"), delay)
            .add_arg("sec", "1", &["s"])
            .set_quiet(),
        &[],
    );
}

/// Splits a comma list of command paths and normalizes each to its real name,
/// so abbreviations match what the run loop compares against.
fn normalize_paths(cc: &Context, list: &str) -> Vec<String> {
    list.split(LIST_SEP)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|raw| {
            let segments: Vec<&str> = raw.split(PATH_SEP).collect();
            match cc.tree.resolve(&segments).and_then(|node| node.cmd()) {
                Some(cmd) => cmd.display_path(PATH_SEP),
                None => {
                    log::warn!("Breakpoint on unknown command '{}'.", raw);
                    raw.to_string()
                }
            }
        })
        .collect()
}

fn break_before(argv: &ArgVals, cc: &mut Context, _env: &mut Env, _cmd: &ParsedCmd) -> FlowResult<bool> {
    let paths = normalize_paths(cc, argv.get_raw("cmds"));
    log::debug!("Break before: {:?}", paths);
    cc.breakpoints.set_before(paths);
    Ok(true)
}

fn break_after(argv: &ArgVals, cc: &mut Context, _env: &mut Env, _cmd: &ParsedCmd) -> FlowResult<bool> {
    let paths = normalize_paths(cc, argv.get_raw("cmds"));
    log::debug!("Break after: {:?}", paths);
    cc.breakpoints.set_after(paths);
    Ok(true)
}

fn break_at_end(_argv: &ArgVals, cc: &mut Context, _env: &mut Env, _cmd: &ParsedCmd) -> FlowResult<bool> {
    cc.breakpoints.set_at_end(true);
    Ok(true)
}

fn step_by_step(argv: &ArgVals, _cc: &mut Context, env: &mut Env, _cmd: &ParsedCmd) -> FlowResult<bool> {
    env.session_mut().set(KEY_STEP_BY_STEP, argv.get_raw("on"));
    Ok(true)
}

fn delay(argv: &ArgVals, _cc: &mut Context, env: &mut Env, _cmd: &ParsedCmd) -> FlowResult<bool> {
    let raw = argv.get_raw("sec").trim();
    let sec: u64 = raw.parse().map_err(|_| {
        FlowError::config(
            format!("dbg{}delay", PATH_SEP),
            format!(t!("builtin.dbg.error.bad_delay"), value = raw),
        )
    })?;
    env.session_mut().set(KEY_DELAY_SEC, sec.to_string());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::TestBed;

    #[test]
    fn test_break_before_set_mid_flow_pauses_later_step() {
        let mut bed = TestBed::new("c\n");
        bed.cc.tree.add_cmd(
            Command::normal(&["db", "backup"], "", |_, _, _, _| Ok(true)),
            &["bk".to_string()],
        );
        let run = bed.run("dbg.break.before cmds=db.bk : db.backup").unwrap();
        assert!(run.succeeded);
        assert!(bed.cc.breakpoints.break_before("db.backup"));
        assert!(bed.output().contains("break-point: before command [db.backup]"));
    }

    #[test]
    fn test_step_by_step_writes_session() {
        let mut bed = TestBed::new("");
        bed.run("dbg.step-by-step on=false").unwrap();
        assert_eq!(bed.env.session().get(KEY_STEP_BY_STEP), Some("false"));
    }

    #[test]
    fn test_delay_rejects_garbage() {
        let mut bed = TestBed::new("");
        let err = bed.run("dbg.delay sec=soon").unwrap_err();
        assert!(matches!(err, FlowError::Config { .. }));
        bed.run("dbg.delay 0").unwrap();
        assert_eq!(bed.env.get_raw(KEY_DELAY_SEC), "0");
    }
}
