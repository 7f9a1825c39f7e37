// src/core/testing.rs

//! Test support: a context wired to an in-memory screen, scripted input and a
//! process runner that records instead of spawning.

use crate::builtin::register_builtins;
use crate::constants::{DEFAULT_ENV, KEY_SESSION, KEY_SESSION_ENV_FILE};
use crate::core::context::{BufferScreen, Context, ReaderInput};
use crate::core::env::Env;
use crate::core::errors::FlowResult;
use crate::core::executor::{self, FlowRun};
use crate::core::flow::ParsedCmd;
use crate::core::parser::tokenize;
use crate::system::executor::{ProcessError, ProcessOutcome, ProcessRunner, ProcessSpec};
use std::cell::RefCell;
use std::fs;
use std::io::Cursor;
use std::path::PathBuf;
use std::rc::Rc;
use tempfile::TempDir;

#[derive(Debug)]
struct RunnerState {
    calls: Vec<ProcessSpec>,
    seen_env: Vec<String>,
    env_write: Option<String>,
    env_path: Option<PathBuf>,
    success: bool,
}

/// Records every invocation. Clones share the same record.
#[derive(Debug, Clone)]
pub struct RecordingRunner {
    state: Rc<RefCell<RunnerState>>,
}

impl Default for RecordingRunner {
    fn default() -> Self {
        Self {
            state: Rc::new(RefCell::new(RunnerState {
                calls: Vec::new(),
                seen_env: Vec::new(),
                env_write: None,
                env_path: None,
                success: true,
            })),
        }
    }
}

impl RecordingRunner {
    /// Every spec run so far.
    pub fn calls(&self) -> Vec<ProcessSpec> {
        self.state.borrow().calls.clone()
    }

    /// Session env file contents at the moment of each call.
    pub fn seen_env(&self) -> Vec<String> {
        self.state.borrow().seen_env.clone()
    }

    /// Makes every call overwrite the session env file, like a script would.
    pub fn set_env_write(&self, content: &str) {
        self.state.borrow_mut().env_write = Some(content.to_string());
    }

    /// Outcome reported by every later call.
    pub fn set_success(&self, success: bool) {
        self.state.borrow_mut().success = success;
    }

    fn set_env_path(&self, path: PathBuf) {
        self.state.borrow_mut().env_path = Some(path);
    }
}

impl ProcessRunner for RecordingRunner {
    fn run(&mut self, spec: &ProcessSpec) -> Result<ProcessOutcome, ProcessError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(spec.clone());
        if let Some(path) = state.env_path.clone() {
            let seen = fs::read_to_string(&path).unwrap_or_default();
            state.seen_env.push(seen);
            if let Some(content) = state.env_write.clone() {
                fs::write(&path, content).unwrap();
            }
        }
        let success = state.success;
        Ok(ProcessOutcome {
            success,
            code: Some(if success { 0 } else { 1 }),
        })
    }
}

/// A context and env wired to in-memory I/O.
#[derive(Debug)]
pub struct TestBed {
    /// Context with builtins registered.
    pub cc: Context,
    /// Env with the built-in defaults loaded.
    pub env: Env,
    /// Shares state with the runner inside `cc`.
    pub runner: RecordingRunner,
    screen: BufferScreen,
    _session: Option<TempDir>,
}

impl TestBed {
    /// Builtins registered, default env loaded, `input` as the scripted
    /// answers to every prompt.
    pub fn new(input: &str) -> Self {
        colored::control::set_override(false);
        let screen = BufferScreen::default();
        let runner = RecordingRunner::default();
        let mut cc = Context::new(
            Box::new(screen.clone()),
            Box::new(ReaderInput::new(Cursor::new(input.to_string()))),
            Box::new(runner.clone()),
        );
        register_builtins(&mut cc.tree);

        let mut env = Env::new();
        for (k, v) in DEFAULT_ENV {
            env.default_layer_mut().set(*k, *v);
        }
        Self {
            cc,
            env,
            runner,
            screen,
            _session: None,
        }
    }

    /// Adds a temporary session directory, as the binary does per run.
    pub fn with_session(mut self) -> Self {
        let dir = tempfile::tempdir().unwrap();
        self.env
            .session_mut()
            .set(KEY_SESSION, dir.path().display().to_string());
        let env_file = self.env.get_raw(KEY_SESSION_ENV_FILE).to_string();
        self.runner.set_env_path(dir.path().join(env_file));
        self._session = Some(dir);
        self
    }

    /// The first command of `line`, parsed against the bed's tree.
    pub fn parsed_cmd(&self, line: &str) -> ParsedCmd {
        let tokens = tokenize(line).unwrap();
        self.cc.parse(&tokens).cmds.into_iter().next().unwrap()
    }

    /// Tokenizes `line` and runs it as a main flow.
    pub fn run(&mut self, line: &str) -> FlowResult<FlowRun> {
        let tokens = tokenize(line).unwrap();
        executor::execute(&mut self.cc, &mut self.env, &tokens)
    }

    /// Everything printed so far.
    pub fn output(&self) -> String {
        self.screen.contents()
    }
}
