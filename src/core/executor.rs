// src/core/executor.rs

//! The run loop: walks a parsed flow step by step, pausing where the step
//! controller says so and recursing into sub-flows.

use crate::constants::PATH_SEP;
use crate::core::breakpoints::{self, BreakPointAction, StepPause};
use crate::core::color;
use crate::core::context::Context;
use crate::core::env::Env;
use crate::core::errors::{FlowError, FlowResult};
use crate::core::flow::{ExecutedCmd, ExecutedFlow, ParsedCmd, ParsedFlow};
use crate::core::parser::tokenize_flow_strs;
use crate::core::render::render_flow;
use crate::models::{ArgVals, Command};

/// Outcome of one flow run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowRun {
    /// No step failed.
    pub succeeded: bool,
    /// Per-step record of the run.
    pub executed: ExecutedFlow,
}

/// Runs a main flow. Inline parse errors are refused up front, control state
/// is reset around the run and the end-of-run pause is evaluated.
pub fn execute(cc: &mut Context, env: &mut Env, tokens: &[String]) -> FlowResult<FlowRun> {
    let mut flow = parse_checked(cc, tokens)?;
    cc.control.clear();
    let result = execute_parsed(cc, env, &mut flow, &tokens.join(" "))
        .and_then(|run| breakpoints::at_end(cc, env).map(|()| run));
    cc.control.clear();
    result
}

/// Runs the bootstrap flow: same engine, no pauses and no delay.
pub fn execute_bootstrap(cc: &mut Context, env: &mut Env, tokens: &[String]) -> FlowResult<bool> {
    let mut flow = parse_checked(cc, tokens)?;
    cc.control.bootstrap = true;
    let result = execute_parsed(cc, env, &mut flow, &tokens.join(" "));
    cc.control.bootstrap = false;
    result.map(|run| run.succeeded)
}

/// Runs a flow typed in the interactive mode, nested in the paused run.
pub fn execute_line(cc: &mut Context, env: &mut Env, tokens: &[String]) -> FlowResult<FlowRun> {
    let mut flow = parse_checked(cc, tokens)?;
    execute_parsed(cc, env, &mut flow, &tokens.join(" "))
}

/// Renders and runs the body of a `Flow` command.
pub(crate) fn execute_sub_flow(
    cc: &mut Context,
    env: &mut Env,
    cmd: &Command,
    argv: &ArgVals,
) -> FlowResult<FlowRun> {
    let (text, mut flow) = parse_sub_flow(cc, env, cmd, argv)?;
    execute_parsed(cc, env, &mut flow, &text)
}

/// Renders `cmd`'s body and parses it. Used by execution and description alike.
pub(crate) fn parse_sub_flow(
    cc: &Context,
    env: &Env,
    cmd: &Command,
    argv: &ArgVals,
) -> FlowResult<(String, ParsedFlow)> {
    let name = cmd.display_path(PATH_SEP);
    let rendered = render_flow(cmd, argv, env)?;
    let text = rendered.join(" ");
    let tokens = tokenize_flow_strs(&rendered).ok_or_else(|| FlowError::Parse {
        cmd: name.clone(),
        msg: format!(t!("exec.error.bad_quotes"), flow = text),
    })?;
    let flow = cc.parse(&tokens);
    if let Some((raw, err)) = flow.first_err() {
        return Err(FlowError::Parse {
            cmd: name,
            msg: format!("'{}': {}", raw, err),
        });
    }
    Ok((text, flow))
}

/// Refuses inline parse errors up to the first power command. What follows a
/// power command may be consumed by it as data (e.g. `flow.save`), so errors
/// there surface only if the step is actually reached.
fn parse_checked(cc: &Context, tokens: &[String]) -> FlowResult<ParsedFlow> {
    let flow = cc.parse(tokens);
    for parsed in &flow.cmds {
        if let Some(err) = &parsed.parse_result.error {
            return Err(parse_error(parsed, err));
        }
        if parsed.last_cmd().is_some_and(|c| c.is_power()) {
            break;
        }
    }
    Ok(flow)
}

fn parse_error(parsed: &ParsedCmd, err: &str) -> FlowError {
    FlowError::Parse {
        cmd: parsed.parse_result.input.join(" "),
        msg: err.to_string(),
    }
}

fn execute_parsed(cc: &mut Context, env: &mut Env, flow: &mut ParsedFlow, text: &str) -> FlowResult<FlowRun> {
    cc.enter_flow(env, text)?;
    let result = run_cmds(cc, env, flow, text);
    cc.leave_flow(env);
    result
}

fn run_cmds(cc: &mut Context, env: &mut Env, flow: &mut ParsedFlow, text: &str) -> FlowResult<FlowRun> {
    let mut executed = ExecutedFlow::new(text);
    flow.global_env.write_not_arg_to(env.session_mut());

    let mut break_by_prev = false;
    let mut i = 0;
    while let Some(parsed) = flow.cmds.get(i).cloned() {
        if let Some(err) = &parsed.parse_result.error {
            return Err(parse_error(&parsed, err));
        }
        if parsed.is_empty() {
            if flow.global_cmd_idx != Some(i) {
                parsed.merged_env().write_not_arg_to(env.session_mut());
            }
            i += 1;
            continue;
        }
        let Some(cmd) = parsed.last_cmd().cloned() else {
            i += 1;
            continue;
        };
        let path = parsed.display_path(PATH_SEP);
        let mut record = ExecutedCmd::new(parsed.path().join(PATH_SEP));

        let pause = StepPause {
            cmd: &parsed,
            path: &path,
            last_in_flow: is_last_step(flow, i),
            break_by_prev,
        };
        let bpa = breakpoints::before_step(cc, env, &pause)?;
        break_by_prev = matches!(bpa, BreakPointAction::StepOver | BreakPointAction::Skip);
        if bpa == BreakPointAction::Skip {
            log::debug!("Skipping '{}' on user request.", path);
            record.unexecuted = true;
            executed.cmds.push(record);
            i += 1;
            continue;
        }

        if !cmd.is_quiet() && !cc.control.bootstrap {
            cc.print(&format!("{} {}\n", color::explain(">>"), color::cmd(&path)));
        }

        let dispatched = run_step(cc, env, &cmd, &parsed, flow, i)?;
        record.succeeded = dispatched.succeeded;
        record.err_msg = dispatched.err_msg;
        record.sub_flow = dispatched.sub_flow;
        executed.cmds.push(record);

        if !dispatched.succeeded {
            log::debug!("'{}' failed, the rest of the flow is not executed.", path);
            for rest in flow.cmds.iter().skip(dispatched.next + 1).filter(|c| !c.is_empty()) {
                let mut skipped = ExecutedCmd::new(rest.path().join(PATH_SEP));
                skipped.unexecuted = true;
                executed.cmds.push(skipped);
            }
            return Ok(FlowRun {
                succeeded: false,
                executed,
            });
        }

        breakpoints::after_step(cc, env, &path, cmd.is_quiet())?;
        i = dispatched.next + 1;
    }

    Ok(FlowRun {
        succeeded: true,
        executed,
    })
}

/// Pushes the step's overlay, runs env-op hooks and dispatches. The overlay is
/// popped on every exit path.
fn run_step(
    cc: &mut Context,
    env: &mut Env,
    cmd: &Command,
    parsed: &ParsedCmd,
    flow: &mut ParsedFlow,
    idx: usize,
) -> FlowResult<crate::core::dispatch::Dispatched> {
    let (overlay, argv) = parsed.apply_mapping_gen_env_and_argv(env, PATH_SEP);
    env.push_overlay(overlay);
    let mut env = scopeguard::guard(env, |env| {
        env.pop_overlay();
    });

    run_env_op_hooks(cc, &mut env, cmd, &argv, parsed)?;
    cmd.execute(&argv, cc, &mut env, flow, idx)
}

/// Runs every registered hook whose `(key, op)` is among `cmd`'s env ops.
pub(crate) fn run_env_op_hooks(
    cc: &mut Context,
    env: &mut Env,
    cmd: &Command,
    argv: &ArgVals,
    parsed: &ParsedCmd,
) -> FlowResult<()> {
    let hooks: Vec<_> = cc
        .env_op_cmds
        .iter()
        .filter(|h| cmd.env_ops().has(&h.key, h.op))
        .cloned()
        .collect();
    for hook in hooks {
        log::debug!("Env-op hook on '{}' ({}) for '{}'.", hook.key, hook.op.as_str(), cmd.display_path(PATH_SEP));
        (hook.cmd)(argv, cc, env, parsed)?;
    }
    Ok(())
}

fn is_last_step(flow: &ParsedFlow, idx: usize) -> bool {
    !flow.cmds.iter().skip(idx + 1).any(|c| !c.is_empty())
}
