// src/system/executor.rs

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command as StdCommand, Stdio};
use thiserror::Error;

/// Failures of the process seam.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The spec has an empty program name.
    #[error("No program specified to run.")]
    EmptyProgram,
    /// The program could not be started.
    #[error("Program '{0}' could not be started: {1}")]
    Spawn(String, #[source] std::io::Error),
    /// The program started but could not be waited on.
    #[error("Waiting for program '{0}' failed: {1}")]
    Wait(String, #[source] std::io::Error),
}

/// A fully resolved external invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessSpec {
    /// Program name or path.
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Working directory; inherited when `None`.
    pub cwd: Option<PathBuf>,
}

impl ProcessSpec {
    /// A spec with no argument.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    pub fn current_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// The invocation as a single shell-quoted line, for error reports.
    pub fn display_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|s| shlex::try_quote(s).map_or_else(|_| s.clone(), |q| q.into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How an external invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Exit status was zero.
    pub success: bool,
    /// Exit code; `None` when killed by a signal.
    pub code: Option<i32>,
}

/// The seam between the engine and the operating system.
pub trait ProcessRunner: fmt::Debug {
    /// Runs `spec` to completion.
    fn run(&mut self, spec: &ProcessSpec) -> Result<ProcessOutcome, ProcessError>;
}

/// Runs programs for real, with stdio inherited from this process.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&mut self, spec: &ProcessSpec) -> Result<ProcessOutcome, ProcessError> {
        if spec.program.trim().is_empty() {
            return Err(ProcessError::EmptyProgram);
        }

        let mut command = StdCommand::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(cwd) = &spec.cwd {
            command.current_dir(dunce::simplified(cwd));
        }

        log::debug!("Spawning: {}", spec.display_line());
        let mut child = command
            .spawn()
            .map_err(|e| ProcessError::Spawn(spec.program.clone(), e))?;
        let status = child
            .wait()
            .map_err(|e| ProcessError::Wait(spec.program.clone(), e))?;
        log::debug!("'{}' exited with {:?}", spec.program, status.code());

        Ok(ProcessOutcome {
            success: status.success(),
            code: status.code(),
        })
    }
}

/// `true` if `executable_name` is an existing path or is found in `PATH`.
pub fn is_executable_in_path(executable_name: &str) -> bool {
    if executable_name.is_empty() {
        return false;
    }
    let direct = Path::new(executable_name);
    if direct.components().count() > 1 {
        return direct.is_file();
    }
    if let Some(path_var) = env::var_os("PATH") {
        for dir in env::split_paths(&path_var) {
            if dir.join(executable_name).is_file() {
                return true;
            }
            if cfg!(target_os = "windows") && dir.join(format!("{executable_name}.exe")).is_file()
            {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_display_line_quotes_arguments() {
        let spec = ProcessSpec::new("bash").arg("my script.sh").arg("plain");
        assert_eq!(spec.display_line(), "bash 'my script.sh' plain");
    }

    #[test]
    fn test_empty_program_is_rejected() {
        let mut runner = SystemRunner;
        let result = runner.run(&ProcessSpec::new("  "));
        assert!(matches!(result, Err(ProcessError::EmptyProgram)));
    }

    #[test]
    fn test_missing_program_fails_to_spawn() {
        let mut runner = SystemRunner;
        let result = runner.run(&ProcessSpec::new("flowrun-definitely-not-a-program"));
        assert!(matches!(result, Err(ProcessError::Spawn(..))));
    }

    #[test]
    fn test_executable_lookup() {
        assert!(!is_executable_in_path(""));
        assert!(!is_executable_in_path("flowrun-definitely-not-a-program"));

        let dir = tempdir().unwrap();
        let file = dir.path().join("tool");
        std::fs::write(&file, "").unwrap();
        assert!(is_executable_in_path(&file.display().to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_is_reported() {
        let mut runner = SystemRunner;
        let ok = runner.run(&ProcessSpec::new("sh").args(["-c", "exit 0"])).unwrap();
        assert!(ok.success);
        let failed = runner.run(&ProcessSpec::new("sh").args(["-c", "exit 3"])).unwrap();
        assert!(!failed.success);
        assert_eq!(failed.code, Some(3));
    }
}
