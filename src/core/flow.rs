// src/core/flow.rs

//! Parsed and executed flow structures.

use crate::core::env::{DEL_MARK, Env, EnvLayer, EnvLayerKind};
use crate::models::{ArgVals, Command};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

// --- PARSED ENV ---

/// One `key=value` binding found while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEnvVal {
    /// Value as written; `--` marks a deletion.
    pub val: String,
    /// Written by an argument binding (`k=v` after a command) rather than `{k=v}`.
    pub is_arg: bool,
    /// Path of the command an argument binding belongs to.
    pub matched_path: Vec<String>,
}

impl ParsedEnvVal {
    /// A `{key=value}` binding.
    pub fn env(val: impl Into<String>) -> Self {
        Self {
            val: val.into(),
            is_arg: false,
            matched_path: Vec::new(),
        }
    }

    /// An argument binding of the command at `path`.
    pub fn arg(val: impl Into<String>, path: &[String]) -> Self {
        Self {
            val: val.into(),
            is_arg: true,
            matched_path: path.to_vec(),
        }
    }
}

/// Bindings by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedEnv(BTreeMap<String, ParsedEnvVal>);

impl ParsedEnv {
    /// Adds or replaces the binding of `key`.
    pub fn insert(&mut self, key: impl Into<String>, val: ParsedEnvVal) {
        self.0.insert(key.into(), val);
    }

    /// Binding of `key`, if any.
    pub fn get(&self, key: &str) -> Option<&ParsedEnvVal> {
        self.0.get(key)
    }

    /// Bindings in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParsedEnvVal)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// True when nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Writes every non-argument binding to `layer`; `--` deletes the key instead.
    pub fn write_not_arg_to(&self, layer: &mut EnvLayer) {
        for (k, v) in self.iter().filter(|(_, v)| !v.is_arg) {
            if v.val == DEL_MARK {
                layer.delete(k);
            } else {
                layer.set(k, v.val.as_str());
            }
        }
    }
}

// --- PARSED COMMAND ---

/// One `.`-separated segment of a command path.
#[derive(Debug, Clone)]
pub struct ParsedCmdSeg {
    /// Segment as typed.
    pub name: String,
    /// `None` for a segment that did not resolve.
    pub cmd: Option<Arc<Command>>,
    /// Bindings attached to this segment.
    pub env: ParsedEnv,
}

/// What the parser saw, and whether it failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseResult {
    /// Raw tokens, kept for literal reproduction.
    pub input: Vec<String>,
    /// Set when the command could not be parsed.
    pub error: Option<String>,
}

/// One step of a flow.
#[derive(Debug, Clone, Default)]
pub struct ParsedCmd {
    /// Path segments, outermost first.
    pub segments: Vec<ParsedCmdSeg>,
    /// Number of leading `^` marks.
    pub trivial_lvl: i64,
    /// Raw tokens and parse error.
    pub parse_result: ParseResult,
}

impl ParsedCmd {
    /// `true` if no segment resolved to a command (e.g. a global-env holder).
    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|s| s.cmd.is_none())
    }

    /// Non-empty segment names as typed.
    pub fn path(&self) -> Vec<String> {
        self.segments
            .iter()
            .filter(|s| !s.name.is_empty())
            .map(|s| s.name.clone())
            .collect()
    }

    /// The command of the deepest resolved segment.
    pub fn last_cmd(&self) -> Option<&Arc<Command>> {
        self.segments.iter().rev().find_map(|s| s.cmd.as_ref())
    }

    /// Path as registered in the tree (abbreviations expanded) or as typed if unresolved.
    pub fn display_path(&self, sep: &str) -> String {
        match self.last_cmd() {
            Some(cmd) if !self.segments.iter().any(|s| s.cmd.is_none() && !s.name.is_empty()) => {
                cmd.display_path(sep)
            }
            _ => self.path().join(sep),
        }
    }

    /// Whether the step expands a saved flow.
    pub fn has_sub_flow(&self) -> bool {
        self.last_cmd().is_some_and(|c| c.has_sub_flow())
    }

    /// Whether the step's command is quiet.
    pub fn is_quiet(&self) -> bool {
        self.last_cmd().is_some_and(|c| c.is_quiet())
    }

    /// All bindings of every segment, innermost segment last.
    pub fn merged_env(&self) -> ParsedEnv {
        let mut out = ParsedEnv::default();
        for seg in &self.segments {
            for (k, v) in seg.env.iter() {
                out.insert(k, v.clone());
            }
        }
        out
    }

    /// Builds this step's ephemeral overlay and its argument values.
    ///
    /// `env_in` is the environment the step runs in; an `arg2env` default never
    /// shadows a value it already holds.
    pub fn apply_mapping_gen_env_and_argv(&self, env_in: &Env, sep: &str) -> (EnvLayer, ArgVals) {
        let mut overlay = EnvLayer::new(EnvLayerKind::Command);
        let mut argv = ArgVals::default();
        let env = self.merged_env();

        for (k, v) in env.iter().filter(|(_, v)| !v.is_arg) {
            if v.val != DEL_MARK {
                overlay.set(k, v.val.as_str());
            }
        }

        let Some(cmd) = self.last_cmd() else {
            return (overlay, argv);
        };
        let prefix = cmd.display_path(sep);
        for def in cmd.args().iter() {
            let key = format!("{}{}{}", prefix, sep, def.name);
            match env.get(&key).filter(|v| v.is_arg) {
                Some(v) => argv.insert(def.name.as_str(), v.val.as_str(), true),
                None => argv.insert(def.name.as_str(), def.default.as_str(), false),
            }
        }
        for (arg, env_key) in cmd.arg2env() {
            let Some(val) = argv.get(arg) else {
                log::warn!("'{}' maps unknown arg '{}' to env.", prefix, arg);
                continue;
            };
            if val.provided || (env_in.get_ex(env_key).is_none() && !val.raw.is_empty()) {
                overlay.set(env_key.as_str(), val.raw.as_str());
            }
        }
        log::trace!("Step '{}' overlay: {:?}", prefix, overlay);
        (overlay, argv)
    }
}

// --- PARSED FLOW ---

/// A flow as parsed from its tokens.
#[derive(Debug, Clone, Default)]
pub struct ParsedFlow {
    /// Steps, in order.
    pub cmds: Vec<ParsedCmd>,
    /// Index of the command holding the flow's global env, if any.
    pub global_cmd_idx: Option<usize>,
    /// Bindings applied to the whole flow.
    pub global_env: ParsedEnv,
}

impl ParsedFlow {
    /// True when no step resolved to a command.
    pub fn is_empty(&self) -> bool {
        self.cmds.iter().all(ParsedCmd::is_empty)
    }

    /// First inline parse error, with the offending command's raw text.
    pub fn first_err(&self) -> Option<(String, &str)> {
        self.cmds.iter().find_map(|c| {
            c.parse_result
                .error
                .as_deref()
                .map(|e| (c.parse_result.input.join(" "), e))
        })
    }

    /// Drops the first `n` commands, keeping the global-env index consistent.
    pub fn remove_leading_cmds(&mut self, n: usize) {
        let n = n.min(self.cmds.len());
        self.cmds.drain(..n);
        self.global_cmd_idx = match self.global_cmd_idx {
            Some(idx) if idx >= n => Some(idx - n),
            _ => None,
        };
    }

    /// Drops every step and the global env.
    pub fn clear(&mut self) {
        self.cmds.clear();
        self.global_cmd_idx = None;
        self.global_env = ParsedEnv::default();
    }
}

// --- EXECUTED RECORDS ---

/// What happened to one step.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutedCmd {
    /// Path as typed in the flow.
    pub cmd: String,
    /// The step ran and reported success.
    pub succeeded: bool,
    /// Short-circuited after a prior failure.
    pub unexecuted: bool,
    /// Error chain, outermost first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub err_msg: Vec<String>,
    /// Record of the sub-flow the step expanded into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_flow: Option<ExecutedFlow>,
}

impl ExecutedCmd {
    /// A record that has neither succeeded nor been skipped yet.
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            ..Self::default()
        }
    }
}

/// What happened to a whole flow.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutedFlow {
    /// Rendered flow text this record belongs to.
    pub flow: String,
    /// One record per step that was reached.
    pub cmds: Vec<ExecutedCmd>,
}

impl ExecutedFlow {
    /// A record with no step yet.
    pub fn new(flow: impl Into<String>) -> Self {
        Self {
            flow: flow.into(),
            cmds: Vec::new(),
        }
    }

    /// True when no reached step failed.
    pub fn succeeded(&self) -> bool {
        self.cmds.iter().all(|c| c.succeeded || c.unexecuted)
    }

    /// The record of step `idx`, if it ran or was skipped.
    pub fn get(&self, idx: usize) -> Option<&ExecutedCmd> {
        self.cmds.get(idx)
    }
}
