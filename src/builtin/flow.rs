// src/builtin/flow.rs

//! Saved-flow management. `flow.save`, `flow.rm`, `flow.rm.all` and
//! `flow.list` are power commands: they see the whole flow and may consume
//! what follows them.

use crate::constants::{PATH_SEP, SEQ_SEP};
use crate::core::cmd_tree::CmdTree;
use crate::core::color;
use crate::core::context::Context;
use crate::core::env::Env;
use crate::core::errors::{FlowError, FlowResult};
use crate::core::flow::{ParsedCmd, ParsedFlow};
use crate::core::flow_store::{
    flow_command, flow_ext, flow_file_path, flows_dir, list_flow_files, load_flows, read_flow_file,
    write_flow_file,
};
use crate::models::{ArgVals, Command, FlowFile};
use std::fs;
use std::path::Path;

const CMD_SAVE: &str = "flow.save";
const CMD_RM: &str = "flow.rm";
const CMD_RM_ALL: &str = "flow.rm.all";
const CMD_HELP: &str = "flow.help";

pub(super) fn register(tree: &mut CmdTree) {
    tree.add_cmd(
        Command::power(&["flow", "save"], t!("builtin.flow.save.help"), save)
            .add_arg("to", "", &["name", "path"])
            .add_arg("help", "", &["h"])
            .add_arg("abbrs", "", &["abbr"])
            .set_quiet(),
        &["s".to_string()],
    );
    tree.add_cmd(
        Command::power(&["flow", "rm"], t!("builtin.flow.rm.help"), remove)
            .add_arg("cmd", "", &["name", "path"])
            .set_quiet(),
        &["remove".to_string(), "delete".to_string()],
    );
    tree.add_cmd(
        Command::power(&["flow", "rm", "all"], t!("builtin.flow.rm_all.help"), remove_all).set_quiet(),
        &[],
    );
    tree.add_cmd(
        Command::normal(&["flow", "help"], t!("builtin.flow.help.help"), set_help)
            .add_arg("cmd", "", &["name", "path"])
            .add_arg("help", "", &["h", "text"])
            .set_quiet(),
        &[],
    );
    tree.add_cmd(
        Command::power(&["flow", "list"], t!("builtin.flow.list.help"), list)
            .add_arg("find", "", &["f"])
            .set_quiet(),
        &["ls".to_string()],
    );
    tree.add_cmd(
        Command::normal(&["flow", "load"], t!("builtin.flow.load.help"), load)
            .add_arg("dir", "", &["d"])
            .set_quiet(),
        &[],
    );
}

// --- SAVE ---

/// Saves every command after this one as a new flow command and consumes them.
fn save(
    argv: &ArgVals,
    cc: &mut Context,
    env: &mut Env,
    flow: &mut ParsedFlow,
    idx: usize,
) -> FlowResult<(usize, bool)> {
    let to = argv.get_raw("to").trim().to_string();
    if to.is_empty() {
        return Err(FlowError::config(CMD_SAVE, t!("builtin.flow.error.no_name")));
    }
    let dir = flows_dir(env, CMD_SAVE)?;
    let path = flow_file_path(&dir, &to, &flow_ext(env));

    flow.remove_leading_cmds(idx + 1);
    if flow.cmds.is_empty() {
        return Err(FlowError::config(CMD_SAVE, t!("builtin.flow.error.empty_body")));
    }

    if let Some((raw, err)) = flow.first_err() {
        let msg = format!(t!("builtin.flow.parse_error"), cmd = raw, err = err);
        cc.print(&format!("{}\n", color::warn(&msg)));
        if !cc.input.confirm(t!("builtin.flow.confirm_force"))? {
            return Ok(cancel(cc, flow, idx));
        }
    }
    if path.exists() {
        let prompt = format!(t!("builtin.flow.confirm_overwrite"), path = path.display());
        if !cc.input.confirm(&prompt)? {
            return Ok(cancel(cc, flow, idx));
        }
    }

    let file = FlowFile {
        help: Some(argv.get_raw("help").trim().to_string()).filter(|h| !h.is_empty()),
        abbrs: split_list(argv.get_raw("abbrs")),
        args: Default::default(),
        flow: vec![serialize_flow(flow)],
    };
    write_flow_file(&path, &file)?;
    log::debug!("Flow '{}' saved to '{}'.", to, path.display());

    let segments: Vec<String> = to.split(PATH_SEP).map(str::to_string).collect();
    let source = dir.display().to_string();
    cc.tree
        .add_cmd(flow_command(&segments, &file, &path, &source), &file.abbrs);

    let mut text = describe_saved(&to, &file, &path);
    text.push_str(&format!(
        "{}\n",
        color::tip(&format!(t!("builtin.flow.saved"), cmd = to))
    ));
    cc.print(&text);

    flow.clear();
    Ok((idx, true))
}

fn cancel(cc: &mut Context, flow: &mut ParsedFlow, idx: usize) -> (usize, bool) {
    cc.print(&format!("{}\n", color::warn(t!("builtin.flow.cancelled"))));
    flow.clear();
    (idx, false)
}

/// Reproduces the commands literally from their raw tokens, so abbreviations,
/// trivial marks, env groups and even erroneous commands survive the save.
fn serialize_flow(flow: &ParsedFlow) -> String {
    flow.cmds
        .iter()
        .map(|cmd| {
            cmd.parse_result
                .input
                .iter()
                .map(|t| quote_token(t))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(&format!(" {} ", SEQ_SEP))
}

fn quote_token(token: &str) -> String {
    let needs_quotes = token.is_empty()
        || token
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | '#'));
    if !needs_quotes {
        return token.to_string();
    }
    shlex::try_quote(token)
        .map(|q| q.into_owned())
        .unwrap_or_else(|_| token.to_string())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn describe_saved(cmd: &str, file: &FlowFile, path: &Path) -> String {
    let mut text = format!("[{}]\n", color::cmd(cmd));
    if let Some(help) = &file.help {
        text.push_str(&format!("     '{}'\n", help));
    }
    text.push_str(&format!("    - {}:\n", t!("builtin.flow.label.flow")));
    for line in &file.flow {
        text.push_str(&format!("        {}\n", line));
    }
    text.push_str(&format!("    - {}:\n", t!("builtin.flow.label.file")));
    text.push_str(&format!("        {}\n", color::explain(&path.display().to_string())));
    text
}

// --- REMOVE ---

fn remove(
    argv: &ArgVals,
    cc: &mut Context,
    env: &mut Env,
    _flow: &mut ParsedFlow,
    idx: usize,
) -> FlowResult<(usize, bool)> {
    let name = argv.get_raw("cmd").trim().to_string();
    if name.is_empty() {
        return Err(FlowError::config(CMD_RM, t!("builtin.flow.error.no_name")));
    }
    let dir = flows_dir(env, CMD_RM)?;
    let path = flow_file_path(&dir, &name, &flow_ext(env));
    if !path.exists() {
        return Err(FlowError::config(
            CMD_RM,
            format!(t!("builtin.flow.error.path_not_exist"), path = name),
        ));
    }
    fs::remove_file(&path)?;
    let segments: Vec<&str> = name.split(PATH_SEP).collect();
    if cc.tree.remove(&segments).is_none() {
        log::debug!("Removed flow '{}' was not registered.", name);
    }
    cc.print(&format!("[{}] {}\n", color::cmd(&name), color::explain(t!("builtin.flow.removed"))));
    Ok((idx, true))
}

/// Removes every saved flow after a confirmation.
fn remove_all(
    _argv: &ArgVals,
    cc: &mut Context,
    env: &mut Env,
    _flow: &mut ParsedFlow,
    idx: usize,
) -> FlowResult<(usize, bool)> {
    let dir = flows_dir(env, CMD_RM_ALL)?;
    let files = list_flow_files(&dir, &flow_ext(env))?;
    if files.is_empty() {
        cc.print(&format!("{}\n", color::tip(t!("builtin.flow.list_empty"))));
        return Ok((idx, true));
    }
    let prompt = format!(t!("builtin.flow.confirm_rm_all"), count = files.len());
    if !cc.input.confirm(&prompt)? {
        cc.print(&format!("{}\n", color::warn(t!("builtin.flow.cancelled"))));
        return Ok((idx, false));
    }

    let mut text = String::new();
    for (segments, path) in files {
        fs::remove_file(&path)?;
        let name = segments.join(PATH_SEP);
        if cc.tree.remove(&segments).is_none() {
            log::debug!("Removed flow '{}' was not registered.", name);
        }
        text.push_str(&format!("[{}] {}\n", color::cmd(&name), color::explain(t!("builtin.flow.removed"))));
        text.push_str(&format!("    {}\n", color::explain(&path.display().to_string())));
    }
    cc.print(&text);
    Ok((idx, true))
}

// --- HELP ---

/// Rewrites the help string of a saved flow, on disk and in the tree.
fn set_help(argv: &ArgVals, cc: &mut Context, env: &mut Env, _cmd: &ParsedCmd) -> FlowResult<bool> {
    let name = argv.get_raw("cmd").trim().to_string();
    if name.is_empty() {
        return Err(FlowError::config(CMD_HELP, t!("builtin.flow.error.no_name")));
    }
    let dir = flows_dir(env, CMD_HELP)?;
    let path = flow_file_path(&dir, &name, &flow_ext(env));
    if !path.exists() {
        return Err(FlowError::config(
            CMD_HELP,
            format!(t!("builtin.flow.error.path_not_exist"), path = name),
        ));
    }

    let mut file = read_flow_file(&path)?;
    let help = argv.get_raw("help").trim().to_string();
    let old_help = std::mem::replace(&mut file.help, Some(help).filter(|h| !h.is_empty()));
    write_flow_file(&path, &file)?;

    let segments: Vec<String> = name.split(PATH_SEP).map(str::to_string).collect();
    let source = dir.display().to_string();
    cc.tree
        .add_cmd(flow_command(&segments, &file, &path, &source), &file.abbrs);

    let mut text = describe_saved(&name, &file, &path);
    if let Some(old) = old_help {
        text.push_str(&format!("    - {}:\n", t!("builtin.flow.label.old_help")));
        text.push_str(&format!("        {}\n", color::explain(&format!("'{}'", old))));
    }
    text.push_str(&format!(
        "{}\n",
        color::tip(&format!(t!("builtin.flow.help_saved"), cmd = name))
    ));
    cc.print(&text);
    Ok(true)
}

// --- LIST ---

/// Lists saved flows. Find strings come from the `find` argument and from the
/// raw tokens of every command after this one, which are consumed.
fn list(
    argv: &ArgVals,
    cc: &mut Context,
    env: &mut Env,
    flow: &mut ParsedFlow,
    idx: usize,
) -> FlowResult<(usize, bool)> {
    let mut finds: Vec<String> = argv.get_raw("find").split_whitespace().map(str::to_string).collect();
    for cmd in flow.cmds.iter().skip(idx + 1) {
        finds.extend(cmd.parse_result.input.iter().cloned());
    }
    let last = flow.cmds.len().saturating_sub(1).max(idx);

    let dir = flows_dir(env, "flow.list")?;
    let mut text = String::new();
    for (segments, path) in list_flow_files(&dir, &flow_ext(env))? {
        let file = match read_flow_file(&path) {
            Ok(f) => f,
            Err(e) => {
                log::warn!("Skipping flow file '{}': {}", path.display(), e);
                continue;
            }
        };
        let cmd = segments.join(PATH_SEP);
        if !finds.iter().all(|f| flow_matches(&cmd, &file, f)) {
            continue;
        }
        text.push_str(&describe_saved(&cmd, &file, &path));
    }
    if text.is_empty() {
        let hint = if finds.is_empty() {
            t!("builtin.flow.list_empty")
        } else {
            t!("builtin.flow.list_no_match")
        };
        text = format!("{}\n", color::tip(hint));
    }
    cc.print(&text);
    Ok((last, true))
}

fn flow_matches(cmd: &str, file: &FlowFile, find: &str) -> bool {
    cmd.contains(find)
        || file.help.as_deref().is_some_and(|h| h.contains(find))
        || file.abbrs.iter().any(|a| a.contains(find))
        || file.flow.iter().any(|l| l.contains(find))
}

// --- LOAD ---

fn load(argv: &ArgVals, cc: &mut Context, env: &mut Env, _cmd: &ParsedCmd) -> FlowResult<bool> {
    let dir = match argv.get_raw("dir").trim() {
        "" => flows_dir(env, "flow.load")?,
        d => d.into(),
    };
    let count = load_flows(&mut cc.tree, &dir, &flow_ext(env))?;
    let msg = format!(t!("builtin.flow.loaded"), count = count, dir = dir.display());
    cc.print(&format!("{}\n", color::explain(&msg)));
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::KEY_FLOWS_DIR;
    use crate::core::testing::TestBed;
    use tempfile::TempDir;

    // --- Setup ---

    fn greet(argv: &ArgVals, cc: &mut Context, _env: &mut Env, _cmd: &ParsedCmd) -> FlowResult<bool> {
        cc.print(&format!("greeting {}\n", argv.get_raw("name")));
        Ok(true)
    }

    fn flows_bed(input: &str) -> (TestBed, TempDir) {
        let mut bed = TestBed::new(input);
        let dir = tempfile::tempdir().unwrap();
        bed.env
            .default_layer_mut()
            .set(KEY_FLOWS_DIR, dir.path().display().to_string());
        bed.cc.tree.add_cmd(
            Command::normal(&["greet"], "prints a greeting", greet).add_arg("name", "world", &["n"]),
            &[],
        );
        (bed, dir)
    }

    // --- Tests ---

    #[test]
    fn test_save_consumes_rest_and_registers() {
        let (mut bed, dir) = flows_bed("");
        let run = bed.run("flow.save to=hello help=hi : greet name=Bob : echo msg='a b'").unwrap();
        assert!(run.succeeded);
        // Nothing after flow.save ran.
        assert!(!bed.output().contains("greeting"));
        assert_eq!(run.executed.cmds.len(), 1);

        let path = dir.path().join("hello.flow.toml");
        let file = read_flow_file(&path).unwrap();
        assert_eq!(file.flow, vec!["greet name=Bob : echo 'msg=a b'".to_string()]);
        assert_eq!(file.help.as_deref(), Some("hi"));

        let cmd = bed.cc.tree.resolve(&["hello"]).unwrap().cmd().unwrap().clone();
        assert_eq!(cmd.meta_file(), Some(path.as_path()));
    }

    #[test]
    fn test_saved_flow_runs_then_fails_once_file_is_gone() {
        let (mut bed, dir) = flows_bed("");
        bed.run("flow.save hello : greet name=Bob").unwrap();

        let run = bed.run("hello").unwrap();
        assert!(run.succeeded);
        assert_eq!(bed.output().matches("greeting Bob").count(), 1);

        fs::remove_file(dir.path().join("hello.flow.toml")).unwrap();
        let err = bed.run("hello").unwrap_err();
        assert!(matches!(err, FlowError::Config { .. }));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_save_with_parse_error_needs_confirmation() {
        let (mut bed, dir) = flows_bed("n\n");
        let run = bed.run("flow.save broken : greet : no.such.cmd").unwrap();
        assert!(!run.succeeded);
        assert!(!dir.path().join("broken.flow.toml").exists());

        let (mut bed, dir) = flows_bed("y\n");
        assert!(bed.run("flow.save broken : no.such.cmd").unwrap().succeeded);
        let file = read_flow_file(&dir.path().join("broken.flow.toml")).unwrap();
        assert_eq!(file.flow, vec!["no.such.cmd".to_string()]);
    }

    #[test]
    fn test_save_refuses_overwrite_without_confirmation() {
        let (mut bed, dir) = flows_bed("");
        bed.run("flow.save hello : greet name=Bob").unwrap();
        let run = bed.run("flow.save hello : greet name=Eve").unwrap();
        assert!(!run.succeeded);
        let file = read_flow_file(&dir.path().join("hello.flow.toml")).unwrap();
        assert_eq!(file.flow, vec!["greet name=Bob".to_string()]);
    }

    #[test]
    fn test_remove_missing_and_existing() {
        let (mut bed, dir) = flows_bed("");
        let err = bed.run("flow.rm nothing").unwrap_err();
        assert!(err.to_string().contains("does not exist"));

        bed.run("flow.save team.hello : greet").unwrap();
        bed.run("flow.rm team.hello").unwrap();
        assert!(!dir.path().join("team.hello.flow.toml").exists());
        assert!(bed.cc.tree.resolve(&["team", "hello"]).is_none());
        assert!(bed.output().contains("(removed)"));
    }

    #[test]
    fn test_remove_all_asks_first() {
        let (mut bed, dir) = flows_bed("n\n");
        bed.run("flow.save hello : greet name=Bob").unwrap();
        bed.run("flow.save ops.bye : echo msg=bye").unwrap();
        let run = bed.run("flow.rm.all").unwrap();
        assert!(!run.succeeded);
        assert!(dir.path().join("hello.flow.toml").exists());

        let (mut bed, dir) = flows_bed("y\n");
        bed.run("flow.save hello : greet name=Bob").unwrap();
        bed.run("flow.save ops.bye : echo msg=bye").unwrap();
        assert!(bed.run("flow.rm.all").unwrap().succeeded);
        assert!(list_flow_files(dir.path(), ".flow.toml").unwrap().is_empty());
        assert!(bed.cc.tree.resolve(&["hello"]).is_none());
        assert!(bed.cc.tree.resolve(&["ops", "bye"]).is_none());
        assert_eq!(bed.output().matches("(removed)").count(), 2);
    }

    #[test]
    fn test_remove_all_without_flows_is_a_no_op() {
        let (mut bed, _dir) = flows_bed("");
        assert!(bed.run("flow.rm.all").unwrap().succeeded);
        assert!(bed.output().contains("(no saved flows)"));
    }

    #[test]
    fn test_set_help_rewrites_file_and_tree() {
        let (mut bed, dir) = flows_bed("");
        bed.run("flow.save hello help=old : greet name=Bob").unwrap();
        bed.run("flow.help hello 'greets Bob'").unwrap();

        let file = read_flow_file(&dir.path().join("hello.flow.toml")).unwrap();
        assert_eq!(file.help.as_deref(), Some("greets Bob"));
        assert_eq!(file.flow, vec!["greet name=Bob".to_string()]);
        let cmd = bed.cc.tree.resolve(&["hello"]).unwrap().cmd().unwrap().clone();
        assert_eq!(cmd.help(), "greets Bob");
        assert!(bed.output().contains("'old'"));

        let err = bed.run("flow.help nothing text=x").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_list_with_trailing_find_strings() {
        let (mut bed, _dir) = flows_bed("");
        bed.run("flow.save hello : greet name=Bob").unwrap();
        bed.run("flow.save bye : echo msg=bye").unwrap();
        let before = bed.output().len();

        bed.run("flow.list : greet").unwrap();
        let out = bed.output().split_off(before);
        assert!(out.contains("[hello]"));
        assert!(!out.contains("[bye]"));
        // The trailing command was data, not a step.
        assert!(!out.contains("greeting"));
    }

    #[test]
    fn test_load_registers_files_written_elsewhere() {
        let (mut bed, dir) = flows_bed("");
        write_flow_file(
            &dir.path().join("ops.ping.flow.toml"),
            &FlowFile {
                flow: vec!["echo msg=pong".to_string()],
                ..FlowFile::default()
            },
        )
        .unwrap();
        bed.run("flow.load").unwrap();
        bed.run("ops.ping").unwrap();
        assert!(bed.output().contains("pong"));
    }
}
