// src/core/cmd_tree.rs

//! Hierarchical command registry. Every node below the root owns a `Command`;
//! nodes created only to host children are `EmptyDir` namespaces.

use crate::models::{CmdType, Command};
use std::sync::Arc;

/// A node of the command namespace; the root has an empty name.
#[derive(Debug, Clone)]
pub struct CmdTree {
    name: String,
    abbrs: Vec<String>,
    cmd: Option<Arc<Command>>,
    children: Vec<CmdTree>,
}

impl Default for CmdTree {
    fn default() -> Self {
        Self::new()
    }
}

impl CmdTree {
    /// An empty root.
    pub fn new() -> Self {
        Self {
            name: String::new(),
            abbrs: Vec::new(),
            cmd: None,
            children: Vec::new(),
        }
    }

    /// Segment name of this node.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alternative names of this node.
    pub fn abbrs(&self) -> &[String] {
        &self.abbrs
    }

    /// The command registered at this node, if any.
    pub fn cmd(&self) -> Option<&Arc<Command>> {
        self.cmd.as_ref()
    }

    /// Sub-nodes, in registration order.
    pub fn children(&self) -> &[CmdTree] {
        &self.children
    }

    fn matches(&self, name_or_abbr: &str) -> bool {
        self.name == name_or_abbr || self.abbrs.iter().any(|a| a == name_or_abbr)
    }

    /// Direct child by name or abbreviation.
    pub fn child(&self, name_or_abbr: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.matches(name_or_abbr))
    }

    fn child_mut(&mut self, name_or_abbr: &str) -> Option<&mut Self> {
        self.children.iter_mut().find(|c| c.matches(name_or_abbr))
    }

    /// Walks `segments` from this node. `None` as soon as one segment is unmatched.
    pub fn resolve<S: AsRef<str>>(&self, segments: &[S]) -> Option<&Self> {
        let mut node = self;
        for seg in segments {
            node = node.child(seg.as_ref())?;
        }
        Some(node)
    }

    /// Registers `cmd` at its own path, creating namespace nodes on the way.
    /// An existing command at the same path is replaced.
    pub fn add_cmd(&mut self, cmd: Command, abbrs: &[String]) -> Arc<Command> {
        let path: Vec<String> = cmd.path().to_vec();
        self.insert_at(&path, 0, cmd, abbrs)
    }

    fn insert_at(&mut self, path: &[String], depth: usize, cmd: Command, abbrs: &[String]) -> Arc<Command> {
        let Some(seg) = path.get(depth) else {
            if let Some(old) = &self.cmd {
                if old.ty() != CmdType::EmptyDir {
                    log::debug!("Replacing command '{}'.", path.join("."));
                }
            }
            for a in abbrs {
                if !self.abbrs.contains(a) && *a != self.name {
                    self.abbrs.push(a.clone());
                }
            }
            let cmd = Arc::new(cmd);
            self.cmd = Some(Arc::clone(&cmd));
            return cmd;
        };

        let idx = match self.children.iter().position(|c| c.matches(seg)) {
            Some(idx) => idx,
            None => {
                let ns_path: Vec<&str> = path.iter().take(depth + 1).map(String::as_str).collect();
                self.children.push(Self {
                    name: seg.clone(),
                    abbrs: Vec::new(),
                    cmd: Some(Arc::new(Command::empty_dir(&ns_path, "", ""))),
                    children: Vec::new(),
                });
                self.children.len() - 1
            }
        };
        match self.children.get_mut(idx) {
            Some(child) => child.insert_at(path, depth + 1, cmd, abbrs),
            None => Arc::new(cmd),
        }
    }

    /// Unregisters the command at `path`. A node that still hosts children
    /// is demoted to an empty namespace instead of being removed.
    pub fn remove<S: AsRef<str>>(&mut self, path: &[S]) -> Option<Arc<Command>> {
        let (last, parents) = path.split_last()?;
        let mut node = self;
        for seg in parents {
            node = node.child_mut(seg.as_ref())?;
        }
        let pos = node.children.iter().position(|c| c.matches(last.as_ref()))?;
        let target = node.children.get_mut(pos)?;
        let removed = target.cmd.take();
        if target.children.is_empty() {
            node.children.remove(pos);
        } else {
            let refs: Vec<String> = removed
                .as_ref()
                .map(|c| c.path().to_vec())
                .unwrap_or_default();
            let refs: Vec<&str> = refs.iter().map(String::as_str).collect();
            target.cmd = Some(Arc::new(Command::empty_dir(&refs, "", "")));
            target.abbrs.clear();
        }
        removed
    }

    /// Every registered command below this node, depth first in registration order.
    pub fn all_cmds(&self) -> Vec<Arc<Command>> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect(&self, out: &mut Vec<Arc<Command>>) {
        if let Some(cmd) = &self.cmd {
            out.push(Arc::clone(cmd));
        }
        for child in &self.children {
            child.collect(out);
        }
    }
}
