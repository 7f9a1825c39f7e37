// src/models.rs

use crate::core::{
    context::Context,
    env::Env,
    errors::FlowResult,
    flow::{ParsedCmd, ParsedFlow},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

// --- EXECUTION CONTRACTS ---

/// Callback of a `Normal` command: sees only its own invocation.
pub type NormalCmd = fn(&ArgVals, &mut Context, &mut Env, &ParsedCmd) -> FlowResult<bool>;

/// Callback of a `Power` command: sees the whole flow and may move or rewrite
/// the cursor. Returns the index of the last command it consumed.
pub type PowerCmd =
    fn(&ArgVals, &mut Context, &mut Env, &mut ParsedFlow, usize) -> FlowResult<(usize, bool)>;

/// The six execution contracts a command can have.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CmdType {
    /// Native callback seeing one invocation.
    Normal,
    /// Native callback seeing the whole flow.
    Power,
    /// An executable script file.
    File,
    /// A directory that only groups sub-commands.
    EmptyDir,
    /// A directory whose entry script runs as the command.
    DirWithCommand,
    /// A saved flow that expands into a sub-flow.
    Flow,
}

impl CmdType {
    /// Lowercase name, as shown in listings.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Power => "power",
            Self::File => "file",
            Self::EmptyDir => "empty",
            Self::DirWithCommand => "dir",
            Self::Flow => "flow",
        }
    }
}

impl fmt::Display for CmdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific payload. Holding it in the variant makes "exactly one payload,
/// matching the type" a property of the type system.
#[derive(Debug, Clone)]
pub enum CmdKind {
    /// See [`NormalCmd`].
    Normal(NormalCmd),
    /// See [`PowerCmd`].
    Power(PowerCmd),
    /// Path of the script.
    File(PathBuf),
    /// Path of the directory.
    EmptyDir(PathBuf),
    /// Path of the entry script.
    DirWithCommand(PathBuf),
    /// Raw flow strings, joined on execution.
    Flow(Vec<String>),
}

impl CmdKind {
    /// The contract this payload implements.
    pub fn ty(&self) -> CmdType {
        match self {
            Self::Normal(_) => CmdType::Normal,
            Self::Power(_) => CmdType::Power,
            Self::File(_) => CmdType::File,
            Self::EmptyDir(_) => CmdType::EmptyDir,
            Self::DirWithCommand(_) => CmdType::DirWithCommand,
            Self::Flow(_) => CmdType::Flow,
        }
    }
}

// --- ARGUMENTS ---

/// One declared argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgDef {
    /// Full name, usable as `name=value`.
    pub name: String,
    /// Used when the invocation does not provide the argument.
    pub default: String,
    /// Short names accepted in place of `name`.
    pub abbrs: Vec<String>,
}

/// Declared arguments, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    defs: Vec<ArgDef>,
}

impl Args {
    /// Declares an argument; declaration order is positional order.
    pub fn add(&mut self, name: &str, default: &str, abbrs: &[&str]) {
        self.defs.push(ArgDef {
            name: name.to_string(),
            default: default.to_string(),
            abbrs: abbrs.iter().map(|a| a.to_string()).collect(),
        });
    }

    /// Declared names, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.defs.iter().map(|d| d.name.as_str())
    }

    /// Iterates in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ArgDef> {
        self.defs.iter()
    }

    /// True when no argument is declared.
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Default of a declared argument.
    pub fn def_val(&self, name: &str) -> Option<&str> {
        self.defs
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.default.as_str())
    }

    /// Name followed by its abbreviations.
    pub fn abbrs(&self, name: &str) -> Vec<&str> {
        self.defs
            .iter()
            .find(|d| d.name == name)
            .map(|d| {
                std::iter::once(d.name.as_str())
                    .chain(d.abbrs.iter().map(String::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Maps a name or abbreviation to the declared name.
    pub fn realname(&self, name_or_abbr: &str) -> Option<&str> {
        self.defs
            .iter()
            .find(|d| d.name == name_or_abbr || d.abbrs.iter().any(|a| a == name_or_abbr))
            .map(|d| d.name.as_str())
    }

    fn matches_find(&self, find: &str) -> bool {
        self.defs.iter().any(|d| {
            d.name.contains(find) || d.default.contains(find) || d.abbrs.iter().any(|a| a.contains(find))
        })
    }
}

/// One resolved argument value.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ArgVal {
    /// The value as typed, after placeholder expansion.
    pub raw: String,
    /// `false` when the value is the declared default.
    pub provided: bool,
}

/// Resolved argument values of one invocation.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgVals(BTreeMap<String, ArgVal>);

impl ArgVals {
    /// Records the value of `name`, replacing any earlier one.
    pub fn insert(&mut self, name: impl Into<String>, raw: impl Into<String>, provided: bool) {
        self.0.insert(
            name.into(),
            ArgVal {
                raw: raw.into(),
                provided,
            },
        );
    }

    /// Value of `name`, if resolved.
    pub fn get(&self, name: &str) -> Option<&ArgVal> {
        self.0.get(name)
    }

    /// Raw value, or empty when the argument is unknown.
    pub fn get_raw(&self, name: &str) -> &str {
        self.0.get(name).map(|v| v.raw.as_str()).unwrap_or("")
    }

    /// Iterates by argument name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgVal)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// True when no value was resolved.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// --- ENV OPERATIONS ---

/// How a command declares it touches an env key.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum EnvOp {
    /// Always reads the key.
    Read,
    /// Reads the key on some paths.
    MayRead,
    /// Always writes the key.
    Write,
    /// Writes the key on some paths.
    MayWrite,
    /// Removes the key.
    Delete,
}

impl EnvOp {
    /// Kebab-case name, as written in meta files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::MayRead => "may-read",
            Self::Write => "write",
            Self::MayWrite => "may-write",
            Self::Delete => "delete",
        }
    }
}

/// Declared env effects of a command, keyed by env key in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOps {
    entries: Vec<(String, Vec<EnvOp>)>,
}

impl EnvOps {
    /// Records `op` on `key`; duplicates are ignored.
    pub fn add(&mut self, key: &str, op: EnvOp) {
        if let Some((_, ops)) = self.entries.iter_mut().find(|(k, _)| k == key) {
            if !ops.contains(&op) {
                ops.push(op);
            }
            return;
        }
        self.entries.push((key.to_string(), vec![op]));
    }

    /// Keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Ops declared on `key`, empty when none.
    pub fn ops(&self, key: &str) -> &[EnvOp] {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, ops)| ops.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `op` is declared on `key`.
    pub fn has(&self, key: &str, op: EnvOp) -> bool {
        self.ops(key).contains(&op)
    }

    /// True when no env effect is declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn matches_find(&self, find: &str) -> bool {
        self.entries
            .iter()
            .any(|(k, ops)| k.contains(find) || ops.iter().any(|op| op.as_str().contains(find)))
    }
}

/// An external program a command needs on `PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Depend {
    /// Program name, looked up on `PATH`.
    pub os_cmd: String,
    /// Why the command needs it.
    pub reason: String,
}

// --- COMMAND ---

/// A node's executable part, with everything a description needs to know about it.
#[derive(Debug, Clone)]
pub struct Command {
    path: Vec<String>,
    help: String,
    kind: CmdKind,
    quiet: bool,
    priority: bool,
    trivial: i64,
    args: Args,
    arg2env: BTreeMap<String, String>,
    env_ops: EnvOps,
    depends: Vec<Depend>,
    source: String,
    meta_file: Option<PathBuf>,
}

impl Command {
    fn with_kind(path: &[&str], help: &str, kind: CmdKind) -> Self {
        Self {
            path: path.iter().map(|s| s.to_string()).collect(),
            help: help.to_string(),
            kind,
            quiet: false,
            priority: false,
            trivial: 0,
            args: Args::default(),
            arg2env: BTreeMap::new(),
            env_ops: EnvOps::default(),
            depends: Vec::new(),
            source: String::new(),
            meta_file: None,
        }
    }

    /// A native command that runs once per invocation.
    pub fn normal(path: &[&str], help: &str, cmd: NormalCmd) -> Self {
        Self::with_kind(path, help, CmdKind::Normal(cmd))
    }

    /// A native command that can take over the rest of the flow.
    pub fn power(path: &[&str], help: &str, cmd: PowerCmd) -> Self {
        Self::with_kind(path, help, CmdKind::Power(cmd))
    }

    /// A command backed by an executable script.
    pub fn file(path: &[&str], help: &str, file: impl Into<PathBuf>) -> Self {
        Self::with_kind(path, help, CmdKind::File(file.into()))
    }

    /// A directory node without an entry script.
    pub fn empty_dir(path: &[&str], help: &str, dir: impl Into<PathBuf>) -> Self {
        Self::with_kind(path, help, CmdKind::EmptyDir(dir.into()))
    }

    /// A directory node whose entry script is `file`.
    pub fn dir_with_cmd(path: &[&str], help: &str, file: impl Into<PathBuf>) -> Self {
        Self::with_kind(path, help, CmdKind::DirWithCommand(file.into()))
    }

    /// A command that expands into the given flow.
    pub fn flow(path: &[&str], help: &str, flow: Vec<String>) -> Self {
        Self::with_kind(path, help, CmdKind::Flow(flow))
    }

    // --- Builders ---

    /// Declares an argument; see [`Args::add`].
    pub fn add_arg(mut self, name: &str, default: &str, abbrs: &[&str]) -> Self {
        self.args.add(name, default, abbrs);
        self
    }

    /// Provided (or defaulted) values of `arg` are written to `env_key` for the step.
    pub fn add_arg2env(mut self, env_key: &str, arg: &str) -> Self {
        self.arg2env.insert(arg.to_string(), env_key.to_string());
        self
    }

    /// Declares an env effect; see [`EnvOps::add`].
    pub fn add_env_op(mut self, key: &str, op: EnvOp) -> Self {
        self.env_ops.add(key, op);
        self
    }

    /// Declares an external program the command needs.
    pub fn add_depend(mut self, os_cmd: &str, reason: &str) -> Self {
        self.depends.push(Depend {
            os_cmd: os_cmd.to_string(),
            reason: reason.to_string(),
        });
        self
    }

    /// Quiet commands do not print a step banner.
    pub fn set_quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Priority commands run before the rest of the flow.
    pub fn set_priority(mut self) -> Self {
        self.priority = true;
        self
    }

    /// Higher levels fold sooner in descriptions.
    pub fn set_trivial(mut self, level: i64) -> Self {
        self.trivial = level;
        self
    }

    /// Where the command was loaded from; empty for builtins.
    pub fn set_source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    /// The meta file the command's declarations came from.
    pub fn set_meta_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.meta_file = Some(path.into());
        self
    }

    // --- Accessors ---

    /// Path segments from the tree root.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Path segments joined by `sep`.
    pub fn display_path(&self, sep: &str) -> String {
        self.path.join(sep)
    }

    /// Help text as declared, possibly empty.
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Help text, falling back to the flow body for undocumented flows.
    pub fn display_help(&self) -> String {
        if self.help.is_empty() && self.ty() == CmdType::Flow {
            return self.cmd_line();
        }
        self.help.clone()
    }

    /// Type-specific payload.
    pub fn kind(&self) -> &CmdKind {
        &self.kind
    }

    /// The command's execution contract.
    pub fn ty(&self) -> CmdType {
        self.kind.ty()
    }

    /// See [`Command::set_quiet`].
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// See [`Command::set_priority`].
    pub fn is_priority(&self) -> bool {
        self.priority
    }

    /// Whether the command takes over the flow cursor.
    pub fn is_power(&self) -> bool {
        self.ty() == CmdType::Power
    }

    /// Trivial level; see [`Command::set_trivial`].
    pub fn trivial(&self) -> i64 {
        self.trivial
    }

    /// Declared arguments.
    pub fn args(&self) -> &Args {
        &self.args
    }

    /// Argument name to env key.
    pub fn arg2env(&self) -> &BTreeMap<String, String> {
        &self.arg2env
    }

    /// Declared env effects.
    pub fn env_ops(&self) -> &EnvOps {
        &self.env_ops
    }

    /// Declared external programs.
    pub fn depends(&self) -> &[Depend] {
        &self.depends
    }

    /// Where the command came from; empty for builtins.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Meta file the declarations came from, if any.
    pub fn meta_file(&self) -> Option<&Path> {
        self.meta_file.as_deref()
    }

    /// Whether running the command expands a sub-flow.
    pub fn has_sub_flow(&self) -> bool {
        self.ty() == CmdType::Flow
    }

    /// Raw flow strings of a `Flow` command; empty for the other types.
    pub fn flow_strs(&self) -> &[String] {
        match &self.kind {
            CmdKind::Flow(strs) => strs,
            _ => &[],
        }
    }

    /// The file behind a file-backed command, or the flow text of a flow.
    pub fn cmd_line(&self) -> String {
        match &self.kind {
            CmdKind::File(p) | CmdKind::EmptyDir(p) | CmdKind::DirWithCommand(p) => {
                p.display().to_string()
            }
            CmdKind::Flow(strs) => strs.join(" "),
            CmdKind::Normal(_) | CmdKind::Power(_) => String::new(),
        }
    }

    /// Full-text search over everything a user might remember about a command.
    pub fn matches_find(&self, find: &str) -> bool {
        if self.path.join(".").contains(find)
            || self.help.contains(find)
            || self.cmd_line().contains(find)
            || self.args.matches_find(find)
            || self.env_ops.matches_find(find)
            || self.ty().as_str().contains(find)
        {
            return true;
        }
        if self
            .depends
            .iter()
            .any(|d| d.os_cmd.contains(find) || d.reason.contains(find))
        {
            return true;
        }
        let source = if self.source.is_empty() {
            "builtin"
        } else {
            self.source.as_str()
        };
        source.contains(find)
            || (self.quiet && "quiet".contains(find))
            || (self.priority && "priority".contains(find))
    }
}

// --- FILE MODELS (TOML) ---

/// A saved flow on disk.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FlowFile {
    /// Help shown in listings; the body stands in when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    /// Extra names the flow is reachable under.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub abbrs: Vec<String>,
    /// Declared arguments and their defaults, usable as `[[name]]` in the body.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
    /// The flow body, one string per line.
    pub flow: Vec<String>,
}

/// The user config file (`config.toml`).
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Overrides for the default env layer.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// A flow run before every main flow, without per-step delay.
    #[serde(default)]
    pub bootstrap: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(
        _: &ArgVals,
        _: &mut Context,
        _: &mut Env,
        _: &ParsedCmd,
    ) -> FlowResult<bool> {
        Ok(true)
    }

    #[test]
    fn test_payload_fixes_type() {
        assert_eq!(Command::normal(&["a"], "", noop).ty(), CmdType::Normal);
        assert_eq!(Command::file(&["a"], "", "x.sh").ty(), CmdType::File);
        assert_eq!(Command::empty_dir(&["a"], "", "/d").ty(), CmdType::EmptyDir);
        assert_eq!(Command::dir_with_cmd(&["a"], "", "/d/x").ty(), CmdType::DirWithCommand);
        let flow = Command::flow(&["a"], "", vec!["b".into(), ":".into(), "c".into()]);
        assert_eq!(flow.ty(), CmdType::Flow);
        assert!(flow.has_sub_flow());
        assert_eq!(flow.cmd_line(), "b : c");
        assert_eq!(flow.display_help(), "b : c");
    }

    #[test]
    fn test_args_resolve_abbreviations() {
        let cmd = Command::normal(&["greet"], "say hi", noop)
            .add_arg("name", "world", &["n", "who"])
            .add_arg("times", "1", &[]);
        let args = cmd.args();
        assert_eq!(args.realname("who"), Some("name"));
        assert_eq!(args.realname("times"), Some("times"));
        assert_eq!(args.realname("x"), None);
        assert_eq!(args.abbrs("name"), vec!["name", "n", "who"]);
        assert_eq!(args.def_val("times"), Some("1"));
        assert_eq!(args.names().collect::<Vec<_>>(), vec!["name", "times"]);
    }

    #[test]
    fn test_env_ops_deduplicate() {
        let cmd = Command::normal(&["a"], "", noop)
            .add_env_op("k", EnvOp::Read)
            .add_env_op("k", EnvOp::Read)
            .add_env_op("k", EnvOp::Write);
        assert_eq!(cmd.env_ops().ops("k"), &[EnvOp::Read, EnvOp::Write]);
        assert!(cmd.env_ops().has("k", EnvOp::Write));
        assert!(cmd.env_ops().ops("other").is_empty());
    }

    #[test]
    fn test_matches_find_covers_metadata() {
        let cmd = Command::file(&["db", "backup"], "dump the db", "backup.sh")
            .add_depend("pg_dump", "export tables")
            .set_quiet();
        assert!(cmd.matches_find("db.back"));
        assert!(cmd.matches_find("dump"));
        assert!(cmd.matches_find("pg_"));
        assert!(cmd.matches_find("builtin"));
        assert!(cmd.matches_find("quiet"));
        assert!(cmd.matches_find("file"));
        assert!(!cmd.matches_find("priority"));
    }

    #[test]
    fn test_flow_file_rejects_unknown_fields() {
        let parsed: Result<FlowFile, _> = toml::from_str("flows = [\"a\"]\n");
        assert!(parsed.is_err());
        let ok: FlowFile = toml::from_str("help = \"h\"\nflow = [\"a : b\"]\n").unwrap();
        assert_eq!(ok.help.as_deref(), Some("h"));
        assert!(ok.abbrs.is_empty());
    }
}
