// src/core/dispatch.rs

//! Per-type execution of a single step.

use crate::constants::{
    KEY_ENV_KV_SEP, KEY_EXEC_DEFAULT, KEY_EXEC_PREFIX, KEY_SESSION, KEY_SESSION_ENV_FILE, PATH_SEP,
};
use crate::core::color;
use crate::core::context::Context;
use crate::core::env::Env;
use crate::core::env_file::{load_session_from_file, save_session_to_file};
use crate::core::errors::{FlowError, FlowResult};
use crate::core::executor;
use crate::core::flow::{ExecutedFlow, ParsedFlow};
use crate::models::{ArgVals, CmdKind, Command};
use crate::system::executor::{ProcessSpec, is_executable_in_path};
use std::path::{Path, PathBuf};

const DEFAULT_INTERPRETER: &str = "bash";

/// Result of one dispatched step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dispatched {
    /// Index of the last flow command this step consumed.
    pub next: usize,
    /// The step reported success.
    pub succeeded: bool,
    /// Error chain of a failed step.
    pub err_msg: Vec<String>,
    /// Record of the expanded sub-flow, for flow commands.
    pub sub_flow: Option<ExecutedFlow>,
}

impl Dispatched {
    fn done(next: usize, succeeded: bool) -> Self {
        Self {
            next,
            succeeded,
            ..Self::default()
        }
    }
}

impl Command {
    /// Executes this command as step `idx` of `flow`.
    pub fn execute(
        &self,
        argv: &ArgVals,
        cc: &mut Context,
        env: &mut Env,
        flow: &mut ParsedFlow,
        idx: usize,
    ) -> FlowResult<Dispatched> {
        match self.kind() {
            CmdKind::Normal(f) => {
                let parsed = flow.cmds.get(idx).cloned().ok_or_else(|| {
                    FlowError::Internal(format!("step {} is out of the flow's bounds", idx))
                })?;
                let ok = f(argv, cc, env, &parsed)?;
                Ok(Dispatched::done(idx, ok))
            }
            CmdKind::Power(f) => {
                let (next, ok) = f(argv, cc, env, flow, idx)?;
                Ok(Dispatched::done(next.max(idx), ok))
            }
            CmdKind::File(file) | CmdKind::DirWithCommand(file) => {
                let (ok, err_msg) = self.execute_file(file, argv, cc, env)?;
                Ok(Dispatched {
                    err_msg,
                    ..Dispatched::done(idx, ok)
                })
            }
            CmdKind::EmptyDir(_) => Ok(Dispatched::done(idx, true)),
            CmdKind::Flow(_) => {
                self.check_meta_file()?;
                let run = executor::execute_sub_flow(cc, env, self, argv)?;
                Ok(Dispatched {
                    sub_flow: Some(run.executed),
                    ..Dispatched::done(idx, run.succeeded)
                })
            }
        }
    }

    fn check_meta_file(&self) -> FlowResult<()> {
        match self.meta_file() {
            Some(meta) if !meta.exists() => Err(FlowError::config(
                self.display_path(PATH_SEP),
                format!(t!("flow.error.file_not_exist"), path = meta.display()),
            )),
            _ => Ok(()),
        }
    }

    /// Runs the backing file through its interpreter. The session layer is
    /// handed over in the session env file and read back on success.
    fn execute_file(
        &self,
        file: &Path,
        argv: &ArgVals,
        cc: &mut Context,
        env: &mut Env,
    ) -> FlowResult<(bool, Vec<String>)> {
        let name = self.display_path(PATH_SEP);

        for dep in self.depends() {
            if !is_executable_in_path(&dep.os_cmd) {
                return Err(FlowError::MissingDependency {
                    cmd: name,
                    dep: dep.os_cmd.clone(),
                    reason: dep.reason.clone(),
                });
            }
            log::debug!("Dependency '{}' of '{}' found.", dep.os_cmd, name);
        }

        let session_dir = non_empty(env, KEY_SESSION)
            .ok_or_else(|| FlowError::config(&name, format!(t!("exec.error.missing_key"), key = KEY_SESSION)))?
            .to_string();
        let env_file_name = non_empty(env, KEY_SESSION_ENV_FILE)
            .ok_or_else(|| {
                FlowError::config(&name, format!(t!("exec.error.missing_key"), key = KEY_SESSION_ENV_FILE))
            })?
            .to_string();
        let sep = non_empty(env, KEY_ENV_KV_SEP).unwrap_or("=").to_string();
        let env_path = PathBuf::from(&session_dir).join(env_file_name);

        save_session_to_file(env, &env_path, &sep)?;

        let spec = self.build_process_spec(file, &session_dir, argv, env);
        log::debug!("Running '{}' as: {}", name, spec.display_line());

        let failure = match cc.runner.run(&spec) {
            Ok(outcome) if outcome.success => {
                load_session_from_file(env, &env_path, &sep)?;
                return Ok((true, Vec::new()));
            }
            Ok(outcome) => match outcome.code {
                Some(code) => format!(t!("exec.error.exit_code"), code = code),
                None => t!("exec.error.killed").to_string(),
            },
            Err(e) => e.to_string(),
        };

        let lines = vec![
            format!("{} {}", t!("exec.report.args"), argv_summary(argv)),
            format!("{} {}", t!("exec.report.bin"), spec.program),
            format!("{} {}", t!("exec.report.file"), file.display()),
            format!("{} {}", t!("exec.report.env"), env_path.display()),
            format!("{} {}", t!("exec.report.err"), failure),
        ];
        let title = format!(t!("exec.report.title"), cmd = name);
        let mut text = format!("{}\n", color::error(&title));
        for line in &lines {
            text.push_str(&format!("    {}\n", color::explain(line)));
        }
        cc.print(&text);
        Ok((false, lines))
    }

    fn build_process_spec(&self, file: &Path, session_dir: &str, argv: &ArgVals, env: &Env) -> ProcessSpec {
        let by_ext = file
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| non_empty(env, &format!("{}.{}", KEY_EXEC_PREFIX, ext)));
        let runner_line = by_ext
            .or_else(|| non_empty(env, KEY_EXEC_DEFAULT))
            .unwrap_or(DEFAULT_INTERPRETER);
        let mut runner = shlex::split(runner_line)
            .unwrap_or_else(|| runner_line.split_whitespace().map(str::to_string).collect())
            .into_iter();
        let program = runner.next().unwrap_or_else(|| DEFAULT_INTERPRETER.to_string());

        ProcessSpec::new(program)
            .args(runner)
            .arg(file.display().to_string())
            .arg(session_dir)
            .args(self.args().names().map(|n| argv.get_raw(n).to_string()))
    }
}

fn non_empty<'a>(env: &'a Env, key: &str) -> Option<&'a str> {
    env.get_ex(key).filter(|v| !v.trim().is_empty())
}

fn argv_summary(argv: &ArgVals) -> String {
    argv.iter()
        .map(|(k, v)| format!("{}={}", k, v.raw))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::TestBed;
    use std::fs;

    fn script_cmd(path: &str) -> Command {
        Command::file(&["deploy"], "deploy it", path)
            .add_arg("target", "staging", &["t"])
            .add_arg("force", "false", &[])
    }

    #[test]
    fn test_file_command_argv_and_env_round_trip() {
        let mut bed = TestBed::new("").with_session();
        bed.env.set("before", "1");
        bed.cc.tree.add_cmd(script_cmd("/opt/deploy.sh"), &[]);
        // The fake process rewrites the env file like a script would.
        bed.runner.set_env_write("after=2\n");

        let run = bed.run("deploy t=prod").unwrap();
        assert!(run.succeeded);

        let calls = bed.runner.calls();
        assert_eq!(calls.len(), 1);
        let spec = &calls[0];
        assert_eq!(spec.program, "bash");
        let session = bed.env.get_raw(KEY_SESSION).to_string();
        assert_eq!(spec.args, vec!["/opt/deploy.sh", session.as_str(), "prod", "false"]);
        assert_eq!(bed.env.get_raw("after"), "2");
        assert_eq!(bed.runner.seen_env()[0], "before=1\n");
    }

    #[test]
    fn test_interpreter_by_extension_with_extra_args() {
        let mut bed = TestBed::new("").with_session();
        bed.env.default_layer_mut().set("sys.ext.exec.py", "python3 -u");
        bed.cc.tree.add_cmd(script_cmd("/opt/deploy.py"), &[]);
        bed.run("deploy").unwrap();
        let calls = bed.runner.calls();
        assert_eq!(calls[0].program, "python3");
        assert_eq!(calls[0].args[0], "-u");
        assert_eq!(calls[0].args[1], "/opt/deploy.py");
    }

    #[test]
    fn test_missing_dependency_aborts_before_spawn() {
        let mut bed = TestBed::new("").with_session();
        bed.cc.tree.add_cmd(
            script_cmd("/opt/deploy.sh").add_depend("flowrun-no-such-tool", "uploads artifacts"),
            &[],
        );
        let err = bed.run("deploy").unwrap_err();
        match err {
            FlowError::MissingDependency { cmd, dep, .. } => {
                assert_eq!(cmd, "deploy");
                assert_eq!(dep, "flowrun-no-such-tool");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(bed.runner.calls().is_empty());
    }

    #[test]
    fn test_missing_session_is_a_config_error() {
        let mut bed = TestBed::new("");
        bed.cc.tree.add_cmd(script_cmd("/opt/deploy.sh"), &[]);
        let err = bed.run("deploy").unwrap_err();
        assert!(matches!(err, FlowError::Config { .. }));
        assert!(bed.runner.calls().is_empty());
    }

    #[test]
    fn test_process_failure_is_a_step_failure() {
        let mut bed = TestBed::new("").with_session();
        bed.cc.tree.add_cmd(script_cmd("/opt/deploy.sh"), &[]);
        bed.runner.set_success(false);
        let run = bed.run("deploy : echo msg=unreached").unwrap();
        assert!(!run.succeeded);

        let first = &run.executed.cmds[0];
        assert!(!first.succeeded);
        assert!(first.err_msg.iter().any(|l| l.contains("/opt/deploy.sh")));
        assert!(run.executed.cmds[1].unexecuted);
        assert!(!bed.output().contains("unreached"));
        assert!(bed.output().contains("deploy"));
    }

    #[test]
    fn test_flow_with_vanished_meta_file() {
        let mut bed = TestBed::new("").with_session();
        let dir = tempfile::tempdir().unwrap();
        let meta = dir.path().join("gone.flow.toml");
        fs::write(&meta, "flow = [\"echo\"]\n").unwrap();
        bed.cc.tree.add_cmd(
            Command::flow(&["gone"], "", vec!["echo".to_string()]).set_meta_file(&meta),
            &[],
        );
        assert!(bed.run("gone").unwrap().succeeded);

        fs::remove_file(&meta).unwrap();
        let err = bed.run("gone").unwrap_err();
        assert!(matches!(err, FlowError::Config { .. }));
        assert!(err.to_string().contains("does not exist"));
    }
}
