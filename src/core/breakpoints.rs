// src/core/breakpoints.rs

//! Breakpoints and the step controller.
//!
//! A pause is evaluated before each step, after each step and once at the
//! end of the main flow. One-shot signals (step-in, step-out) live in
//! `ControlState` and are consumed by the check that honours them.

use crate::constants::{KEY_DELAY_SEC, KEY_DELAY_SEC_AT_END, KEY_STEP_BY_STEP};
use crate::core::color;
use crate::core::context::Context;
use crate::core::env::Env;
use crate::core::errors::{FlowError, FlowResult};
use crate::core::flow::ParsedCmd;
use crate::core::interactive;
use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

/// Where a run should pause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakPoints {
    before: BTreeSet<String>,
    after: BTreeSet<String>,
    at_begin: bool,
    at_end: bool,
}

impl BreakPoints {
    /// Pauses before each step whose command path is in `paths`.
    pub fn set_before<I: IntoIterator<Item = String>>(&mut self, paths: I) {
        self.before.extend(paths);
    }

    /// Pauses after each step whose command path is in `paths`.
    pub fn set_after<I: IntoIterator<Item = String>>(&mut self, paths: I) {
        self.after.extend(paths);
    }

    /// Pauses before the first step of the next main flow.
    pub fn set_at_begin(&mut self, on: bool) {
        self.at_begin = on;
    }

    /// Pauses after the last step of the main flow.
    pub fn set_at_end(&mut self, on: bool) {
        self.at_end = on;
    }

    /// Whether `path` has a before-breakpoint.
    pub fn break_before(&self, path: &str) -> bool {
        self.before.contains(path)
    }

    /// Whether `path` has an after-breakpoint.
    pub fn break_after(&self, path: &str) -> bool {
        self.after.contains(path)
    }

    /// Reads and clears the at-begin flag.
    pub fn take_at_begin(&mut self) -> bool {
        std::mem::take(&mut self.at_begin)
    }

    /// Whether the at-end breakpoint is set.
    pub fn at_end(&self) -> bool {
        self.at_end
    }

    /// True when no breakpoint of any kind is set.
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty() && !self.at_begin && !self.at_end
    }
}

/// Transient signals of one run. Cleared when a main flow starts and ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlState {
    /// Pause on the first step of the sub-flow about to start.
    pub step_in: bool,
    /// Pause on the next step of the enclosing flow.
    pub step_out: bool,
    /// Run freely until back at this depth, then pause.
    pub step_out_to: Option<usize>,
    /// Inside the interactive mode; pauses are suppressed.
    pub interacting: bool,
    /// The interactive mode asked to resume the paused run.
    pub leaving: bool,
    /// Running the bootstrap flow; no pauses, no delay.
    pub bootstrap: bool,
}

impl ControlState {
    /// Resets everything except the bootstrap flag.
    pub fn clear(&mut self) {
        let bootstrap = self.bootstrap;
        *self = Self {
            bootstrap,
            ..Self::default()
        };
    }
}

/// Choices offered by the pause menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakPointAction {
    /// Run on until the next breakpoint.
    Continue,
    /// Pause again on the next step at this level.
    StepOver,
    /// Pause on the first step of the upcoming sub-flow.
    StepIn,
    /// Run until back in the enclosing flow.
    StepOut,
    /// Do not run this step.
    Skip,
    /// Open the interactive mode, then ask again.
    Interact,
    /// Abort the run.
    Quit,
}

impl BreakPointAction {
    /// The letter typed to pick the action.
    pub fn key(self) -> &'static str {
        match self {
            Self::Continue => "c",
            Self::StepOver => "d",
            Self::StepIn => "t",
            Self::StepOut => "o",
            Self::Skip => "s",
            Self::Interact => "i",
            Self::Quit => "q",
        }
    }

    /// Menu label.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Continue => t!("bp.action.continue"),
            Self::StepOver => t!("bp.action.step_over"),
            Self::StepIn => t!("bp.action.step_in"),
            Self::StepOut => t!("bp.action.step_out"),
            Self::Skip => t!("bp.action.skip"),
            Self::Interact => t!("bp.action.interact"),
            Self::Quit => t!("bp.action.quit"),
        }
    }
}

/// What the before-step check needs to know about the step.
#[derive(Debug, Clone, Copy)]
pub struct StepPause<'a> {
    /// The step about to run.
    pub cmd: &'a ParsedCmd,
    /// Dotted command path, as breakpoints store it.
    pub path: &'a str,
    /// No step follows at this level.
    pub last_in_flow: bool,
    /// The previous step at this level was stepped over or skipped.
    pub break_by_prev: bool,
}

/// Before-step check, including the post-`Continue` delay and the
/// bookkeeping of step signals. Never returns `StepIn`, `StepOut` or `Interact`.
pub fn before_step(cc: &mut Context, env: &mut Env, step: &StepPause<'_>) -> FlowResult<BreakPointAction> {
    if cc.control.interacting || cc.control.bootstrap {
        return Ok(BreakPointAction::Continue);
    }

    let mut bpa = check_before(cc, env, step)?;
    match bpa {
        BreakPointAction::Continue => {
            if !step.cmd.is_quiet() {
                delay(cc, env, KEY_DELAY_SEC);
            }
        }
        BreakPointAction::StepIn => {
            cc.control.step_in = true;
            bpa = BreakPointAction::Continue;
        }
        BreakPointAction::StepOut => {
            cc.control.step_out_to = Some(cc.depth().saturating_sub(1));
            bpa = BreakPointAction::Continue;
        }
        BreakPointAction::StepOver | BreakPointAction::Skip => {
            if step.last_in_flow && !step.cmd.has_sub_flow() {
                cc.control.step_out = true;
            }
        }
        BreakPointAction::Interact | BreakPointAction::Quit => {}
    }
    Ok(bpa)
}

fn check_before(cc: &mut Context, env: &mut Env, step: &StepPause<'_>) -> FlowResult<BreakPointAction> {
    use BreakPointAction::{Continue, Skip, StepIn, StepOut, StepOver};

    let depth = cc.depth();
    let at_begin = cc.breakpoints.take_at_begin();
    let stepping_out = cc.control.step_out_to.is_some_and(|to| depth > to);
    let step_out_arrived = cc.control.step_out_to.is_some_and(|to| depth <= to);
    if step_out_arrived {
        cc.control.step_out_to = None;
    }
    // One-shot signals are consumed here whichever trigger wins.
    let step_in = std::mem::take(&mut cc.control.step_in);
    let step_out = std::mem::take(&mut cc.control.step_out) || step_out_arrived;
    let step_by_step = env.get_bool(KEY_STEP_BY_STEP) && !stepping_out;
    let break_before = cc.breakpoints.break_before(step.path);
    let by_prev = step.break_by_prev && !stepping_out;

    if !at_begin && !break_before && !step_by_step && !step_in && !step_out && !by_prev {
        return Ok(Continue);
    }

    let mut choices = Vec::new();
    if step.cmd.has_sub_flow() && !step_by_step {
        choices.push(StepIn);
    }

    let reason = if at_begin {
        t!("bp.reason.at_begin").to_string()
    } else if step_by_step {
        t!("bp.reason.step_by_step").to_string()
    } else if break_before {
        format!(t!("bp.reason.before"), path = step.path)
    } else if step_in {
        t!("bp.reason.stepped_in").to_string()
    } else if step_out {
        t!("bp.reason.stepped_out").to_string()
    } else {
        t!("bp.reason.previous_choice").to_string()
    };

    if step_by_step && !at_begin {
        choices.push(Continue);
    } else {
        choices.extend([Skip, StepOver, Continue]);
    }
    if depth > 1 && !step_by_step {
        choices.push(StepOut);
    }
    read_choice(cc, env, &reason, &choices)
}

/// After-step check: only explicit break-after registrations pause here.
pub fn after_step(cc: &mut Context, env: &mut Env, path: &str, quiet: bool) -> FlowResult<()> {
    if cc.control.interacting || cc.control.bootstrap {
        return Ok(());
    }
    if cc.breakpoints.break_after(path) {
        let reason = format!(t!("bp.reason.after"), path = path);
        read_choice(cc, env, &reason, &[BreakPointAction::Continue])?;
    }
    if !quiet {
        delay(cc, env, KEY_DELAY_SEC_AT_END);
    }
    Ok(())
}

/// End-of-run check. There is no step left, so anything but `Continue` is a defect.
pub fn at_end(cc: &mut Context, env: &mut Env) -> FlowResult<()> {
    if !cc.breakpoints.at_end() {
        return Ok(());
    }
    let bpa = read_choice(cc, env, t!("bp.reason.at_end"), &[BreakPointAction::Continue])?;
    if bpa != BreakPointAction::Continue {
        return Err(FlowError::Internal(format!(
            "end-of-run pause resolved to {:?}",
            bpa
        )));
    }
    Ok(())
}

/// Shows the menu and reads until a valid choice. `Interact` and `Quit` are
/// always offered and handled here.
fn read_choice(
    cc: &mut Context,
    env: &mut Env,
    reason: &str,
    choices: &[BreakPointAction],
) -> FlowResult<BreakPointAction> {
    let mut offered: Vec<BreakPointAction> = choices.to_vec();
    offered.extend([BreakPointAction::Interact, BreakPointAction::Quit]);

    show_menu(cc, reason, &offered);
    loop {
        let Some(line) = cc.input.read_line(t!("bp.prompt"))? else {
            return Err(FlowError::Input(t!("bp.error.input_closed").to_string()));
        };
        let line = line.trim().to_lowercase();
        if line.is_empty() {
            continue;
        }
        match offered.iter().find(|a| a.key() == line) {
            Some(BreakPointAction::Quit) => return Err(FlowError::AbortByUser),
            Some(BreakPointAction::Interact) => {
                cc.print("\n");
                interactive::interactive_mode(cc, env)?;
                if cc.control.leaving {
                    cc.control.leaving = false;
                    return Ok(BreakPointAction::Continue);
                }
                cc.print("\n");
                show_menu(cc, reason, &offered);
            }
            Some(action) => return Ok(*action),
            None => {
                let msg = format!(t!("bp.error.invalid_input"), input = line);
                cc.print(&format!("{}\n", color::explain(&msg)));
            }
        }
    }
}

fn show_menu(cc: &mut Context, reason: &str, offered: &[BreakPointAction]) {
    let title = format!(t!("bp.title"), reason = reason);
    let mut text = format!("{}\n", color::tip(&title));
    for action in offered {
        text.push_str(&format!("{}: {}\n", color::warn(action.key()), action.describe()));
    }
    cc.print(&text);
}

/// Blocks for `env[key]` seconds, one dot per second. Not interruptible.
fn delay(cc: &mut Context, env: &Env, key: &str) {
    let secs = env.get_int(key);
    if secs <= 0 {
        return;
    }
    log::debug!("Delaying {}s ({}).", secs, key);
    for _ in 0..secs {
        thread::sleep(Duration::from_secs(1));
        cc.print(".");
    }
    cc.print("\n");
}
