// src/core/flow_store.rs

//! Saved flows on disk. A flow saved as command `a.b` lives in
//! `<flows dir>/a.b<ext>` and is registered back as a `Flow` command that
//! remembers its file.

use crate::constants::{KEY_FLOW_EXT, KEY_FLOWS_DIR, PATH_SEP};
use crate::core::cmd_tree::CmdTree;
use crate::core::env::Env;
use crate::core::env_file::atomic_write;
use crate::core::errors::{FlowError, FlowResult};
use crate::models::{Command, FlowFile};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const DEFAULT_FLOW_EXT: &str = ".flow.toml";

/// The saved-flow directory, or a `Config` error tagged with `cmd` if unset.
pub fn flows_dir(env: &Env, cmd: &str) -> FlowResult<PathBuf> {
    match env.get_ex(KEY_FLOWS_DIR).filter(|v| !v.trim().is_empty()) {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => Err(FlowError::config(
            cmd,
            format!(t!("flow.error.no_flows_dir"), key = KEY_FLOWS_DIR),
        )),
    }
}

/// Extension of saved flow files, honoring the env override.
pub fn flow_ext(env: &Env) -> String {
    env.get_ex(KEY_FLOW_EXT)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_FLOW_EXT)
        .to_string()
}

/// File that stores the flow registered at `cmd_path`.
pub fn flow_file_path(dir: &Path, cmd_path: &str, ext: &str) -> PathBuf {
    dir.join(format!("{}{}", cmd_path, ext))
}

/// Command path encoded in a flow file name, `None` if the name does not
/// carry the extension.
pub fn cmd_path_of(file: &Path, ext: &str) -> Option<Vec<String>> {
    let name = file.file_name()?.to_str()?;
    let stem = name.strip_suffix(ext)?;
    let segments: Vec<String> = stem.split(PATH_SEP).map(str::to_string).collect();
    if segments.iter().any(String::is_empty) {
        return None;
    }
    Some(segments)
}

/// Reads and parses a saved flow.
pub fn read_flow_file(path: &Path) -> FlowResult<FlowFile> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| FlowError::config(path.display().to_string(), e.to_string()))
}

/// Writes a flow file atomically.
pub fn write_flow_file(path: &Path, file: &FlowFile) -> FlowResult<()> {
    let content =
        toml::to_string(file).map_err(|e| FlowError::config(path.display().to_string(), e.to_string()))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    atomic_write(path, |tmp| tmp.write_all(content.as_bytes()))?;
    Ok(())
}

/// All flow files under `dir`, sorted by path. A missing directory has none.
pub fn list_flow_files(dir: &Path, ext: &str) -> FlowResult<Vec<(Vec<String>, PathBuf)>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    if !dir.is_dir() {
        return Err(FlowError::config(
            dir.display().to_string(),
            t!("flow.error.not_a_dir"),
        ));
    }
    let mut found: Vec<(Vec<String>, PathBuf)> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let path = entry.into_path();
            cmd_path_of(&path, ext).map(|segments| (segments, path))
        })
        .collect();
    found.sort();
    Ok(found)
}

/// Builds the `Flow` command a saved file stands for.
pub fn flow_command(path: &[String], file: &FlowFile, meta: &Path, source: &str) -> Command {
    let segments: Vec<&str> = path.iter().map(String::as_str).collect();
    let mut cmd = Command::flow(&segments, file.help.as_deref().unwrap_or(""), file.flow.clone())
        .set_meta_file(meta)
        .set_source(source);
    for (name, default) in &file.args {
        cmd = cmd.add_arg(name, default, &[]);
    }
    cmd
}

/// Registers every flow file under `dir` in `tree`. Unreadable files are
/// skipped with a warning; returns how many were registered.
pub fn load_flows(tree: &mut CmdTree, dir: &Path, ext: &str) -> FlowResult<usize> {
    let source = dir.display().to_string();
    let mut loaded = 0;
    for (path, file_path) in list_flow_files(dir, ext)? {
        let file = match read_flow_file(&file_path) {
            Ok(f) => f,
            Err(e) => {
                log::warn!("Skipping flow file '{}': {}", file_path.display(), e);
                continue;
            }
        };
        tree.add_cmd(flow_command(&path, &file, &file_path, &source), &file.abbrs);
        loaded += 1;
    }
    log::debug!("Loaded {} flow(s) from '{}'.", loaded, source);
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CmdType;

    #[test]
    fn test_cmd_path_of() {
        let ext = ".flow.toml";
        assert_eq!(
            cmd_path_of(Path::new("/x/db.backup.flow.toml"), ext),
            Some(vec!["db".to_string(), "backup".to_string()])
        );
        assert_eq!(cmd_path_of(Path::new("/x/notes.txt"), ext), None);
        assert_eq!(cmd_path_of(Path::new("/x/.flow.toml"), ext), None);
    }

    #[test]
    fn test_write_then_load_registers_flow() {
        let tmp = tempfile::tempdir().unwrap();
        let file = FlowFile {
            help: Some("say hello".to_string()),
            abbrs: vec!["hi".to_string()],
            args: [("who".to_string(), "world".to_string())].into_iter().collect(),
            flow: vec!["echo msg=[[who]]".to_string()],
        };
        let path = flow_file_path(tmp.path(), "hello", ".flow.toml");
        write_flow_file(&path, &file).unwrap();
        assert_eq!(read_flow_file(&path).unwrap(), file);

        let mut tree = CmdTree::new();
        assert_eq!(load_flows(&mut tree, tmp.path(), ".flow.toml").unwrap(), 1);
        let node = tree.resolve(&["hi"]).unwrap();
        let cmd = node.cmd().unwrap();
        assert_eq!(cmd.ty(), CmdType::Flow);
        assert_eq!(cmd.meta_file(), Some(path.as_path()));
        assert_eq!(cmd.args().def_val("who"), Some("world"));
    }

    #[test]
    fn test_bad_files_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("broken.flow.toml"), "flow = 3\n").unwrap();
        fs::write(tmp.path().join("ok.flow.toml"), "flow = [\"dummy\"]\n").unwrap();
        let mut tree = CmdTree::new();
        assert_eq!(load_flows(&mut tree, tmp.path(), ".flow.toml").unwrap(), 1);
        assert!(tree.resolve(&["broken"]).is_none());
    }

    #[test]
    fn test_missing_dir_is_empty_but_file_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(list_flow_files(&tmp.path().join("nope"), ".flow.toml").unwrap().is_empty());
        let file = tmp.path().join("plain");
        fs::write(&file, "").unwrap();
        assert!(list_flow_files(&file, ".flow.toml").is_err());
    }

    #[test]
    fn test_flows_dir_requires_key() {
        let env = Env::new();
        let err = flows_dir(&env, "flow.save").unwrap_err();
        assert!(matches!(err, FlowError::Config { .. }));
    }
}
