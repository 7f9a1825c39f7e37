// src/core/errors.rs

use crate::core::env_file::EnvError;
use thiserror::Error;

/// Every way a flow run can stop early.
///
/// A failing external process is not an error here: it is reported on screen
/// and the step returns `Ok(false)`.
#[derive(Error, Debug)]
pub enum FlowError {
    /// The user picked quit in a pause menu.
    #[error("Aborted by user.")]
    AbortByUser,
    /// A command was misused or misconfigured.
    #[error("[{cmd}] {msg}")]
    Config {
        /// Path of the command at fault.
        cmd: String,
        /// What went wrong.
        msg: String,
    },
    /// A declared external program is not on `PATH`.
    #[error("[{cmd}] dependency '{dep}' not found in PATH ({reason})")]
    MissingDependency {
        /// Path of the command declaring it.
        cmd: String,
        /// The program looked up.
        dep: String,
        /// Why the command needs it.
        reason: String,
    },
    /// A flow could not be parsed.
    #[error("[{cmd}] parse error: {msg}")]
    Parse {
        /// Flow command being expanded, or raw text of the offending step.
        cmd: String,
        /// Parser message.
        msg: String,
    },
    /// A `[[key]]` placeholder had no value.
    #[error("[{cmd}] render flow failed: {msg}")]
    Render {
        /// Path of the flow command being expanded.
        cmd: String,
        /// Which placeholders were missing.
        msg: String,
    },
    /// A broken engine invariant.
    #[error("Internal error: {0}")]
    Internal(String),
    /// The line input failed.
    #[error("Reading user input failed: {0}")]
    Input(String),
    /// Session env file trouble.
    #[error(transparent)]
    Env(#[from] EnvError),
    /// Any other filesystem failure.
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowError {
    /// A [`FlowError::Config`] raised by `cmd`.
    pub fn config(cmd: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Config {
            cmd: cmd.into(),
            msg: msg.into(),
        }
    }

    /// Whether the user quit from a pause menu.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::AbortByUser)
    }
}

/// Result of engine operations.
pub type FlowResult<T> = Result<T, FlowError>;
