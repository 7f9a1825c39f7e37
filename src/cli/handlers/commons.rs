// src/cli/handlers/commons.rs

//! Start-up shared by every handler: config, env layers, session directory,
//! saved flows and the debugging flags given on the command line.

use crate::builtin::register_builtins;
use crate::cli::Cli;
use crate::constants::{KEY_DELAY_SEC, KEY_SESSION, KEY_STEP_BY_STEP, PATH_SEP};
use crate::core::config_loader;
use crate::core::context::{Context, StdoutScreen, TerminalInput};
use crate::core::env::Env;
use crate::core::executor;
use crate::core::flow_store;
use crate::core::parser::tokenize;
use crate::core::paths;
use crate::models::AppConfig;
use crate::system::executor::SystemRunner;
use anyhow::{Context as _, Result, anyhow};
use std::fs;
use std::path::PathBuf;

/// Everything a handler needs to run or describe a flow.
#[derive(Debug)]
pub struct Session {
    /// Context with builtins, saved flows and breakpoints.
    pub cc: Context,
    /// Env with config and session loaded.
    pub env: Env,
    /// The parsed user config.
    pub config: AppConfig,
    dir: Option<PathBuf>,
}

impl Session {
    /// Runs the configured bootstrap flow, if any. A failing bootstrap stops
    /// the main flow from running.
    pub fn run_bootstrap(&mut self) -> Result<()> {
        let Some(line) = self.config.bootstrap.clone() else {
            return Ok(());
        };
        let tokens = tokenize(&line)
            .ok_or_else(|| anyhow!(t!("cli.error.bootstrap_quotes"), flow = line))?;
        log::debug!("Running bootstrap flow: {}", line);
        if !executor::execute_bootstrap(&mut self.cc, &mut self.env, &tokens)? {
            return Err(anyhow!(t!("cli.error.bootstrap_failed")));
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take()
            && let Err(e) = fs::remove_dir_all(&dir)
        {
            log::warn!("Could not remove session dir '{}': {}", dir.display(), e);
        }
    }
}

/// Builds a terminal-backed session: builtins, the user config, saved flows
/// and a fresh session directory.
pub fn open_session(cli: &Cli) -> Result<Session> {
    let mut cc = Context::new(
        Box::new(StdoutScreen),
        Box::new(TerminalInput),
        Box::new(SystemRunner),
    );
    register_builtins(&mut cc.tree);

    let config_path = paths::get_config_file_path()?;
    let config = config_loader::load_app_config(&config_path)?;
    let mut env = config_loader::build_env(&config, &paths::default_flows_dir()?)?;

    let flows_dir = flow_store::flows_dir(&env, "flowrun")?;
    let ext = flow_store::flow_ext(&env);
    flow_store::load_flows(&mut cc.tree, &flows_dir, &ext)
        .with_context(|| format!("Failed to load saved flows from '{}'", flows_dir.display()))?;

    let dir = paths::new_session_dir()?;
    env.session_mut()
        .set(KEY_SESSION, dir.display().to_string());

    apply_debug_flags(cli, &mut cc, &mut env);

    Ok(Session {
        cc,
        env,
        config,
        dir: Some(dir),
    })
}

/// Command-line debugging flags, applied like their `dbg.*` counterparts.
pub fn apply_debug_flags(cli: &Cli, cc: &mut Context, env: &mut Env) {
    if cli.step {
        env.session_mut().set_bool(KEY_STEP_BY_STEP, true);
    }
    if let Some(sec) = cli.delay {
        env.session_mut().set(KEY_DELAY_SEC, sec.to_string());
    }
    let before = normalize_paths(cc, &cli.break_before);
    let after = normalize_paths(cc, &cli.break_after);
    cc.breakpoints.set_before(before);
    cc.breakpoints.set_after(after);
    cc.breakpoints.set_at_begin(cli.break_at_begin);
    cc.breakpoints.set_at_end(cli.break_at_end);
}

/// Resolves abbreviated command paths to their real names.
fn normalize_paths(cc: &Context, raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            let segments: Vec<&str> = s.split(PATH_SEP).collect();
            cc.tree
                .resolve(&segments)
                .and_then(|node| node.cmd())
                .map_or_else(|| s.to_string(), |cmd| cmd.display_path(PATH_SEP))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::{BufferScreen, ReaderInput};
    use crate::core::testing::RecordingRunner;
    use clap::Parser;
    use std::io::Cursor;

    // --- Setup ---

    fn test_context() -> Context {
        let mut cc = Context::new(
            Box::new(BufferScreen::default()),
            Box::new(ReaderInput::new(Cursor::new(String::new()))),
            Box::new(RecordingRunner::default()),
        );
        register_builtins(&mut cc.tree);
        cc
    }

    // --- Tests ---

    #[test]
    fn test_flags_and_flow_tokens_are_split() {
        let cli = Cli::try_parse_from([
            "flowrun",
            "--step",
            "--break-before",
            "m,dmy",
            "echo",
            "msg=hi",
            ":",
            "dummy",
        ])
        .unwrap();
        assert!(cli.step);
        assert_eq!(cli.break_before, vec!["m", "dmy"]);
        assert_eq!(cli.flow, vec!["echo", "msg=hi", ":", "dummy"]);
        assert_eq!(cli.max_depth, 32);
        assert_eq!(cli.max_trivial, 1);
    }

    #[test]
    fn test_flags_after_flow_belong_to_flow() {
        let cli = Cli::try_parse_from(["flowrun", "echo", "--step"]).unwrap();
        assert!(!cli.step);
        assert_eq!(cli.flow, vec!["echo", "--step"]);
    }

    #[test]
    fn test_apply_debug_flags() {
        let cli = Cli::try_parse_from([
            "flowrun",
            "--delay",
            "3",
            "--break-after",
            "dmy,nope.cmd",
            "--break-at-end",
            "dummy",
        ])
        .unwrap();
        let mut cc = test_context();
        let mut env = Env::new();
        apply_debug_flags(&cli, &mut cc, &mut env);

        assert_eq!(env.session().get(KEY_DELAY_SEC), Some("3"));
        assert!(!env.get_bool(KEY_STEP_BY_STEP));
        assert!(cc.breakpoints.break_after("dummy"));
        assert!(cc.breakpoints.break_after("nope.cmd"));
        assert!(!cc.breakpoints.break_before("dummy"));
        assert!(cc.breakpoints.at_end());
    }
}
