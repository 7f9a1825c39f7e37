// src/core/context.rs

//! Everything a run needs besides the environment: the command tree, the
//! parser, breakpoints and control state, and the three I/O seams (screen,
//! line input, process runner).

use crate::constants::{DEFAULT_STACK_DEPTH_MAX, KEY_STACK_DEPTH, KEY_STACK_DEPTH_MAX};
use crate::core::breakpoints::{BreakPoints, ControlState};
use crate::core::cmd_tree::CmdTree;
use crate::core::env::Env;
use crate::core::errors::{FlowError, FlowResult};
use crate::core::flow::ParsedFlow;
use crate::core::parser::{DefaultParser, FlowParser};
use crate::models::{EnvOp, NormalCmd};
use crate::system::executor::ProcessRunner;
use dialoguer::{Confirm, Input, theme::ColorfulTheme};
use std::cell::RefCell;
use std::fmt;
use std::io::{BufRead, Write};
use std::rc::Rc;

// --- SCREEN ---

/// Where user-facing output goes.
pub trait Screen: fmt::Debug {
    /// Writes `text` as is; callers add line breaks.
    fn print(&mut self, text: &str);
}

/// Writes to the process stdout.
#[derive(Debug, Default)]
pub struct StdoutScreen;

impl Screen for StdoutScreen {
    fn print(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            log::warn!("Writing to stdout failed: {}", e);
        }
    }
}

/// In-memory screen. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferScreen {
    buf: Rc<RefCell<String>>,
}

impl BufferScreen {
    /// Everything printed so far.
    pub fn contents(&self) -> String {
        self.buf.borrow().clone()
    }
}

impl Screen for BufferScreen {
    fn print(&mut self, text: &str) {
        self.buf.borrow_mut().push_str(text);
    }
}

// --- LINE INPUT ---

/// Where pause menus and the interactive mode read from.
pub trait LineInput: fmt::Debug {
    /// Next line without its terminator; `None` once input is exhausted.
    fn read_line(&mut self, prompt: &str) -> FlowResult<Option<String>>;
    /// Yes/no question; anything but yes is no.
    fn confirm(&mut self, prompt: &str) -> FlowResult<bool>;
}

/// Prompts on an attached terminal.
#[derive(Debug, Default)]
pub struct TerminalInput;

impl LineInput for TerminalInput {
    fn read_line(&mut self, prompt: &str) -> FlowResult<Option<String>> {
        Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map(Some)
            .map_err(|e| FlowError::Input(e.to_string()))
    }

    fn confirm(&mut self, prompt: &str) -> FlowResult<bool> {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| FlowError::Input(e.to_string()))
    }
}

/// Reads plain lines, e.g. from piped stdin or a scripted buffer.
#[derive(Debug)]
pub struct ReaderInput<R> {
    reader: R,
}

impl<R: BufRead> ReaderInput<R> {
    /// Wraps `reader`; each call consumes one line.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead + fmt::Debug> LineInput for ReaderInput<R> {
    fn read_line(&mut self, _prompt: &str) -> FlowResult<Option<String>> {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .map_err(|e| FlowError::Input(e.to_string()))?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn confirm(&mut self, prompt: &str) -> FlowResult<bool> {
        let answer = self.read_line(prompt)?.unwrap_or_default();
        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

// --- CONTEXT ---

/// A hook run before any step whose command declares `op` on `key`.
#[derive(Debug, Clone)]
pub struct EnvOpCmd {
    /// Env key the hook watches.
    pub key: String,
    /// Declared op the hook watches.
    pub op: EnvOp,
    /// Runs with the step's args and overlay env.
    pub cmd: NormalCmd,
}

/// Run state shared by every step.
#[derive(Debug)]
pub struct Context {
    /// All registered commands.
    pub tree: CmdTree,
    /// Turns token lists into flows.
    pub parser: Box<dyn FlowParser>,
    /// Pause points set by `dbg.*` commands.
    pub breakpoints: BreakPoints,
    /// Stepping signals of the current run.
    pub control: ControlState,
    /// User-facing output.
    pub screen: Box<dyn Screen>,
    /// Answers to pause menus and prompts.
    pub input: Box<dyn LineInput>,
    /// Spawns file-backed commands.
    pub runner: Box<dyn ProcessRunner>,
    /// Hooks registered with [`Context::add_env_op_cmd`].
    pub env_op_cmds: Vec<EnvOpCmd>,
    depth: usize,
}

impl Context {
    /// A context with an empty tree and the default parser.
    pub fn new(
        screen: Box<dyn Screen>,
        input: Box<dyn LineInput>,
        runner: Box<dyn ProcessRunner>,
    ) -> Self {
        Self {
            tree: CmdTree::new(),
            parser: Box::new(DefaultParser::default()),
            breakpoints: BreakPoints::default(),
            control: ControlState::default(),
            screen,
            input,
            runner,
            env_op_cmds: Vec::new(),
            depth: 0,
        }
    }

    /// Prints to the screen.
    pub fn print(&mut self, text: &str) {
        self.screen.print(text);
    }

    /// Parses `tokens` against the current tree.
    pub fn parse(&self, tokens: &[String]) -> ParsedFlow {
        self.parser.parse(&self.tree, tokens)
    }

    /// Registers `cmd` to run before any step declaring `op` on `key`.
    pub fn add_env_op_cmd(&mut self, key: &str, op: EnvOp, cmd: NormalCmd) {
        self.env_op_cmds.push(EnvOpCmd {
            key: key.to_string(),
            op,
            cmd,
        });
    }

    /// Nesting level of the flow currently executing; the main flow is 1.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Enters one flow level, refusing to go past `sys.stack-depth-max`.
    pub(crate) fn enter_flow(&mut self, env: &mut Env, flow_text: &str) -> FlowResult<()> {
        let max = env.get_int_or(KEY_STACK_DEPTH_MAX, DEFAULT_STACK_DEPTH_MAX);
        let next = self.depth + 1;
        if i64::try_from(next).unwrap_or(i64::MAX) > max {
            return Err(FlowError::config(
                flow_text,
                format!(t!("exec.error.stack_overflow"), max = max),
            ));
        }
        self.depth = next;
        env.session_mut()
            .set_int(KEY_STACK_DEPTH, i64::try_from(next).unwrap_or(i64::MAX));
        Ok(())
    }

    pub(crate) fn leave_flow(&mut self, env: &mut Env) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            env.session_mut().delete(KEY_STACK_DEPTH);
        } else {
            env.session_mut()
                .set_int(KEY_STACK_DEPTH, i64::try_from(self.depth).unwrap_or(i64::MAX));
        }
    }
}
