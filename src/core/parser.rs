// src/core/parser.rs

//! Turns flow tokens into a `ParsedFlow`.
//!
//! Grammar, after `shlex` splitting:
//!
//! ```text
//! flow    := cmd (':' cmd)*
//! cmd     := '^'* path ('{' k=v ... '}' | arg=value | value)*
//!          | '{' k=v ... '}'            (env-only; global when first)
//! path    := name ('.' name)*
//! ```
//!
//! Malformed input never fails the parse: the offending command keeps its raw
//! tokens and an inline error.

use crate::constants::{PATH_SEP, SEQ_SEP, TRIVIAL_MARK};
use crate::core::cmd_tree::CmdTree;
use crate::core::flow::{ParseResult, ParsedCmd, ParsedCmdSeg, ParsedEnv, ParsedEnvVal, ParsedFlow};
use std::collections::VecDeque;
use std::fmt;

/// Turns a token list into a flow against a command tree.
pub trait FlowParser: fmt::Debug {
    /// Never fails; unresolved commands carry their error inline.
    fn parse(&self, tree: &CmdTree, tokens: &[String]) -> ParsedFlow;
}

/// Parser for `:`-separated flows with `.` paths and `^` trivial marks.
#[derive(Debug, Clone)]
pub struct DefaultParser {
    path_sep: String,
    seq_sep: String,
    trivial_mark: char,
}

impl Default for DefaultParser {
    fn default() -> Self {
        Self {
            path_sep: PATH_SEP.to_string(),
            seq_sep: SEQ_SEP.to_string(),
            trivial_mark: TRIVIAL_MARK,
        }
    }
}

impl FlowParser for DefaultParser {
    fn parse(&self, tree: &CmdTree, tokens: &[String]) -> ParsedFlow {
        let mut flow = ParsedFlow::default();
        for (idx, group) in self.split_seq(tokens).into_iter().enumerate() {
            let cmd = self.parse_cmd(tree, &group);
            if idx == 0 && is_env_only(&cmd) {
                flow.global_cmd_idx = Some(0);
                flow.global_env = cmd.merged_env();
            }
            flow.cmds.push(cmd);
        }
        flow
    }
}

/// Splits a flow line the way a shell would. `None` on unbalanced quotes.
pub fn tokenize(line: &str) -> Option<Vec<String>> {
    shlex::split(line)
}

/// Tokenizes the entries of a saved flow; entries are joined with a space.
pub fn tokenize_flow_strs(strs: &[String]) -> Option<Vec<String>> {
    tokenize(&strs.join(" "))
}

fn is_env_only(cmd: &ParsedCmd) -> bool {
    cmd.parse_result.error.is_none()
        && !cmd.segments.is_empty()
        && cmd.segments.iter().all(|s| s.name.is_empty() && s.cmd.is_none())
}

fn is_binding(token: &str) -> bool {
    token.contains('=') || token.contains('{') || token.contains('}')
}

impl DefaultParser {
    fn split_seq(&self, tokens: &[String]) -> Vec<Vec<String>> {
        let mut groups: Vec<Vec<String>> = vec![Vec::new()];
        for tok in tokens {
            if *tok == self.seq_sep {
                groups.push(Vec::new());
                continue;
            }
            // Values may legitimately carry the separator; only bare paths are split.
            if !is_binding(tok) && tok.contains(self.seq_sep.as_str()) {
                for (i, part) in tok.split(self.seq_sep.as_str()).enumerate() {
                    if i > 0 {
                        groups.push(Vec::new());
                    }
                    if let (false, Some(last)) = (part.is_empty(), groups.last_mut()) {
                        last.push(part.to_string());
                    }
                }
                continue;
            }
            if let Some(last) = groups.last_mut() {
                last.push(tok.clone());
            }
        }
        groups.retain(|g| !g.is_empty());
        groups
    }

    fn parse_cmd(&self, tree: &CmdTree, tokens: &[String]) -> ParsedCmd {
        let mut parsed = ParsedCmd {
            parse_result: ParseResult {
                input: tokens.to_vec(),
                error: None,
            },
            ..ParsedCmd::default()
        };
        if let Err(msg) = self.fill_cmd(tree, tokens, &mut parsed) {
            log::debug!("Parse error in '{}': {}", tokens.join(" "), msg);
            parsed.parse_result.error = Some(msg);
        }
        parsed
    }

    fn fill_cmd(&self, tree: &CmdTree, tokens: &[String], parsed: &mut ParsedCmd) -> Result<(), String> {
        let mut queue: VecDeque<String> = tokens.iter().cloned().collect();

        // Env bound before any path.
        let mut leading = ParsedEnv::default();
        while queue.front().is_some_and(|t| t.starts_with('{')) {
            self.take_env_group(&mut queue, &mut leading)?;
        }

        let Some(path_tok) = queue.pop_front() else {
            parsed.segments.push(ParsedCmdSeg {
                name: String::new(),
                cmd: None,
                env: leading,
            });
            return Ok(());
        };

        let trimmed = path_tok.trim_start_matches(self.trivial_mark);
        let marks = path_tok.len() - trimmed.len();
        parsed.trivial_lvl = i64::try_from(marks / self.trivial_mark.len_utf8()).unwrap_or(i64::MAX);

        // `path{k=v}` glued together.
        let (path_str, glued_env) = match trimmed.find('{') {
            Some(pos) => (trimmed.get(..pos).unwrap_or(""), trimmed.get(pos..)),
            None => (trimmed, None),
        };
        if let Some(env) = glued_env {
            queue.push_front(env.to_string());
        }
        if path_str.is_empty() {
            return Err(format!("missing command path in '{}'", path_tok));
        }

        self.resolve_path(tree, path_str, parsed)?;
        if let Some(first) = parsed.segments.first_mut() {
            first.env = leading;
        }

        let Some(cmd) = parsed.last_cmd().cloned() else {
            return Err(format!("'{}' is not a command", path_str));
        };
        let cmd_path = cmd.display_path(&self.path_sep);
        let mut bound: Vec<String> = Vec::new();
        let mut seg_env = ParsedEnv::default();

        while let Some(tok) = queue.front().cloned() {
            if tok.starts_with('{') {
                self.take_env_group(&mut queue, &mut seg_env)?;
                continue;
            }
            queue.pop_front();

            let (arg_name, value) = match tok.split_once('=') {
                Some((k, v)) if !k.is_empty() => {
                    let real = cmd
                        .args()
                        .realname(k)
                        .ok_or_else(|| format!("unknown arg '{}' for '{}'", k, cmd_path))?;
                    (real.to_string(), v.to_string())
                }
                _ => {
                    // Positional: the next declared argument not yet bound.
                    let next = cmd
                        .args()
                        .names()
                        .find(|n| !bound.iter().any(|b| b == n))
                        .ok_or_else(|| format!("unexpected token '{}' after '{}'", tok, cmd_path))?;
                    (next.to_string(), tok.clone())
                }
            };
            seg_env.insert(
                format!("{}{}{}", cmd_path, self.path_sep, arg_name),
                ParsedEnvVal::arg(value, cmd.path()),
            );
            bound.push(arg_name);
        }

        if let Some(last) = parsed.segments.last_mut() {
            for (k, v) in seg_env.iter() {
                last.env.insert(k, v.clone());
            }
        }
        Ok(())
    }

    fn resolve_path(&self, tree: &CmdTree, path_str: &str, parsed: &mut ParsedCmd) -> Result<(), String> {
        let names: Vec<&str> = path_str.split(self.path_sep.as_str()).collect();
        if names.iter().any(|n| n.is_empty()) {
            return Err(format!("bad command path '{}'", path_str));
        }
        let mut node = Some(tree);
        let mut unmatched = false;
        for name in &names {
            match node.and_then(|n| n.child(name)) {
                Some(child) if !unmatched => {
                    parsed.segments.push(ParsedCmdSeg {
                        name: child.name().to_string(),
                        cmd: child.cmd().cloned(),
                        env: ParsedEnv::default(),
                    });
                    node = Some(child);
                }
                _ => {
                    unmatched = true;
                    node = None;
                    parsed.segments.push(ParsedCmdSeg {
                        name: (*name).to_string(),
                        cmd: None,
                        env: ParsedEnv::default(),
                    });
                }
            }
        }
        if unmatched {
            return Err(format!("unknown command '{}'", path_str));
        }
        Ok(())
    }

    /// Consumes one `{...}` group, which may span several tokens.
    fn take_env_group(&self, queue: &mut VecDeque<String>, out: &mut ParsedEnv) -> Result<(), String> {
        let mut body = String::new();
        let mut closed = false;
        while let Some(tok) = queue.pop_front() {
            if !body.is_empty() {
                body.push(' ');
            }
            // A closing brace may be followed by another group: `{a=1}{b=2}`.
            if let Some(pos) = tok.find('}') {
                body.push_str(tok.get(..pos).unwrap_or(""));
                let rest = tok.get(pos + 1..).unwrap_or("");
                if !rest.is_empty() {
                    queue.push_front(rest.to_string());
                }
                closed = true;
                break;
            }
            body.push_str(&tok);
        }
        if !closed {
            return Err(format!("unclosed env group '{}'", body));
        }
        let body = body.strip_prefix('{').unwrap_or(&body);
        for pair in body.split_whitespace() {
            match pair.split_once('=') {
                Some((k, v)) if !k.is_empty() => out.insert(k, ParsedEnvVal::env(v)),
                _ => return Err(format!("bad env binding '{}'", pair)),
            }
        }
        Ok(())
    }
}
