// src/core/describe.rs

//! Dry-run description of a flow.
//!
//! Walks the flow the way the executor would, on a clone of the environment,
//! expanding sub-flows under two budgets: `max_depth` and `max_trivial`. A
//! sub-flow past either budget is folded: it is still walked, so template
//! errors at any depth surface and global env is written back, but its steps
//! are not listed. Recursion stops at `sys.stack-depth-max` levels, which turns
//! a self-referential flow into a fold instead of an endless walk.

use crate::constants::{DEFAULT_STACK_DEPTH_MAX, KEY_STACK_DEPTH_MAX, PATH_SEP, TRIVIAL_MARK};
use crate::core::color;
use crate::core::context::Context;
use crate::core::env::Env;
use crate::core::errors::FlowResult;
use crate::core::executor::{parse_sub_flow, run_env_op_hooks};
use crate::core::flow::{ExecutedCmd, ExecutedFlow, ParsedCmd, ParsedFlow};
use crate::models::{ArgVals, CmdKind, Command};
use std::collections::{BTreeMap, BTreeSet};

const FLOW_BEGIN: &str = "--->>>";
const FLOW_END: &str = "<<<---";

/// How much of a flow a description shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpFlowArgs {
    /// Leave out command types, sources and executables.
    pub simple: bool,
    /// Only paths, provided args and sub-flow structure.
    pub skeleton: bool,
    /// Spaces per nesting level.
    pub indent_size: usize,
    /// Levels of sub-flows to expand; deeper ones are folded.
    pub max_depth: i64,
    /// Trivial budget; steps whose marks use it up are folded.
    pub max_trivial: i64,
}

impl Default for DumpFlowArgs {
    fn default() -> Self {
        Self {
            simple: false,
            skeleton: false,
            indent_size: 4,
            max_depth: 32,
            max_trivial: 1,
        }
    }
}

impl DumpFlowArgs {
    /// Leaves out command types, sources and executables.
    pub fn set_simple(mut self) -> Self {
        self.simple = true;
        self
    }

    /// Implies [`DumpFlowArgs::set_simple`].
    pub fn set_skeleton(mut self) -> Self {
        self.simple = true;
        self.skeleton = true;
        self
    }

    /// Sets [`DumpFlowArgs::max_depth`].
    pub fn set_max_depth(mut self, max_depth: i64) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets [`DumpFlowArgs::max_trivial`].
    pub fn set_max_trivial(mut self, max_trivial: i64) -> Self {
        self.max_trivial = max_trivial;
        self
    }
}

/// Describes what running `flow` would do. `env` is not modified.
pub fn describe_flow(cc: &mut Context, env: &Env, flow: &ParsedFlow, args: &DumpFlowArgs) -> FlowResult<()> {
    dump(cc, env, flow, args, None, false)
}

/// Describes a finished (or, with `running`, in-progress) run, marking each
/// step `OK`, `ERR`, `un-run` or `not-done`. Failed steps are always shown
/// and expanded, whatever the budgets.
pub fn describe_executed(
    cc: &mut Context,
    env: &Env,
    flow: &ParsedFlow,
    args: &DumpFlowArgs,
    executed: &ExecutedFlow,
    running: bool,
) -> FlowResult<()> {
    dump(cc, env, flow, args, Some(executed), running)
}

fn dump(
    cc: &mut Context,
    env: &Env,
    flow: &ParsedFlow,
    args: &DumpFlowArgs,
    executed: Option<&ExecutedFlow>,
    running: bool,
) -> FlowResult<()> {
    if flow.is_empty() {
        return Ok(());
    }
    // Rendering writes to the env so later steps show real values.
    let mut env = env.clone();
    flow.global_env.write_not_arg_to(env.session_mut());

    let title = match executed {
        Some(_) => t!("desc.title.executed"),
        None => t!("desc.title.plan"),
    };
    cc.print(&format!("{}\n{}\n", color::tip(title), color::explain(FLOW_BEGIN)));

    let max_nesting = usize::try_from(env.get_int_or(KEY_STACK_DEPTH_MAX, DEFAULT_STACK_DEPTH_MAX)).unwrap_or(0);
    let mut dumper = Dumper {
        cc,
        args,
        running,
        written: BTreeSet::new(),
        nesting: 0,
        max_nesting,
    };
    let complete = dumper.dump_flow(&mut env, flow, executed, args.max_depth, args.max_trivial, 0)?;
    if complete {
        dumper.cc.print(&format!("{}\n", color::explain(FLOW_END)));
    }
    Ok(())
}

struct Dumper<'a> {
    cc: &'a mut Context,
    args: &'a DumpFlowArgs,
    running: bool,
    /// Env keys declared by the env ops of steps already described.
    written: BTreeSet<String>,
    nesting: usize,
    max_nesting: usize,
}

impl Dumper<'_> {
    fn prt(&mut self, lvl: usize, indent: usize, msg: &str) {
        let padding = " ".repeat(self.args.indent_size * (lvl + indent));
        let mut text = String::new();
        for line in msg.lines() {
            text.push_str(&padding);
            text.push_str(line);
            text.push('\n');
        }
        self.cc.print(&text);
    }

    /// Walks a sub-flow one level deeper, or leaves it folded once the
    /// nesting guard is reached.
    fn descend(
        &mut self,
        env: &mut Env,
        sub: &ParsedFlow,
        executed: Option<&ExecutedFlow>,
        max_depth: i64,
        max_trivial: i64,
        indent: usize,
    ) -> FlowResult<bool> {
        if self.nesting >= self.max_nesting {
            log::debug!("Description stops descending at {} nested levels.", self.nesting);
            return Ok(true);
        }
        self.nesting += 1;
        let complete = self.dump_flow(env, sub, executed, max_depth, max_trivial, indent);
        self.nesting -= 1;
        complete
    }

    /// Returns `false` once the executed record stops matching the flow.
    fn dump_flow(
        &mut self,
        env: &mut Env,
        flow: &ParsedFlow,
        executed: Option<&ExecutedFlow>,
        max_depth: i64,
        max_trivial: i64,
        indent: usize,
    ) -> FlowResult<bool> {
        let mut met_flows = BTreeSet::new();
        let mut step = 0;
        for (i, parsed) in flow.cmds.iter().enumerate() {
            if parsed.is_empty() {
                if flow.global_cmd_idx != Some(i) {
                    parsed.merged_env().write_not_arg_to(env.session_mut());
                }
                continue;
            }
            let record = match executed {
                Some(ex) => match ex.get(step) {
                    Some(r) => Some(r),
                    None => return Ok(false),
                },
                None => None,
            };
            step += 1;
            let level = Level {
                max_depth,
                max_trivial,
                indent,
            };
            if !self.dump_cmd(env, flow, parsed, record, level, &mut met_flows)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn dump_cmd(
        &mut self,
        env: &mut Env,
        flow: &ParsedFlow,
        parsed: &ParsedCmd,
        record: Option<&ExecutedCmd>,
        lv: Level,
        met_flows: &mut BTreeSet<String>,
    ) -> FlowResult<bool> {
        let Some(cmd) = parsed.last_cmd().cloned() else {
            return Ok(true);
        };
        let skeleton = self.args.skeleton;
        let simple = self.args.simple;
        let failed = record.is_some_and(|r| !r.succeeded);
        let trivial_delta = cmd.trivial() + parsed.trivial_lvl;
        let typed_path = parsed.path().join(PATH_SEP);
        let (overlay, argv) = parsed.apply_mapping_gen_env_and_argv(env, PATH_SEP);

        if failed || (lv.max_trivial > 0 && lv.max_depth > 0) {
            let shown = if skeleton {
                typed_path.clone()
            } else {
                parsed.display_path(PATH_SEP)
            };
            let mut name = color::cmd(&format!("[{}]", shown)).to_string();
            if !failed && lv.max_trivial == 1 && trivial_delta > 0 && cmd.has_sub_flow() {
                name.push_str(&color::explain(&TRIVIAL_MARK.to_string()).to_string());
            }
            if let Some(r) = record {
                if r.cmd != typed_path {
                    let msg = format!(t!("desc.not_matched"), cmd = r.cmd);
                    name.push_str(&format!(" - {}", color::error(&msg)));
                    self.prt(0, lv.indent, &name);
                    return Ok(false);
                }
                let mark = if r.unexecuted {
                    color::explain(t!("desc.mark.unrun"))
                } else if r.succeeded {
                    color::ok(t!("desc.mark.ok"))
                } else if self.running {
                    color::error(t!("desc.mark.not_done"))
                } else {
                    color::error(t!("desc.mark.err"))
                };
                name.push_str(&format!(" - {}", mark));
            }
            self.prt(0, lv.indent, &name);

            if !cmd.help().is_empty() {
                let pad = if skeleton { "" } else { " " };
                let help = format!("{}{}", pad, color::explain(&format!("'{}'", cmd.help())));
                self.prt(1, lv.indent, &help);
            }
            if let Some(r) = record {
                if r.unexecuted {
                    return Ok(true);
                }
                if !r.err_msg.is_empty() {
                    self.prt(1, lv.indent, &color::error(t!("desc.label.error")).to_string());
                    for line in &r.err_msg {
                        self.prt(2, lv.indent, &color::error(line).to_string());
                    }
                }
            }

            if skeleton {
                for (name, val) in argv.iter().filter(|(_, v)| v.provided) {
                    self.prt(1, lv.indent, &format!(" {} = {}", color::key(name), val.raw));
                }
            } else {
                let lines = arg_lines(&cmd, &argv, env);
                if !lines.is_empty() {
                    self.prt(1, lv.indent, &color::tip(t!("desc.label.args")).to_string());
                }
                for line in &lines {
                    self.prt(2, lv.indent, line);
                }
            }
        }

        // Computed against the env as it was before this step's overlay.
        let env_values = self.env_lines(flow, parsed, &cmd, &argv, env);
        let sub_trivial = lv.max_trivial - trivial_delta;

        env.push_overlay(overlay);
        let mut env = scopeguard::guard(env, |env| {
            env.pop_overlay();
        });
        run_env_op_hooks(self.cc, &mut env, &cmd, &argv, parsed)?;

        if !failed && (sub_trivial <= 0 || lv.max_depth <= 0) {
            if !cmd.has_sub_flow() {
                return Ok(true);
            }
            let (_, sub) = parse_sub_flow(&*self.cc, &env, &cmd, &argv)?;
            sub.global_env.write_not_arg_to(env.session_mut());
            log::debug!("Folded '{}' (depth budget {}, trivial budget {}).", typed_path, lv.max_depth, sub_trivial);
            // Nothing below a fold is listed, since both budgets only shrink.
            let sub_record = record.and_then(|r| r.sub_flow.as_ref());
            return self.descend(&mut env, &sub, sub_record, lv.max_depth - 1, sub_trivial, lv.indent + 2);
        }

        if !skeleton {
            if !env_values.is_empty() {
                self.prt(1, lv.indent, &color::tip(t!("desc.label.env_values")).to_string());
            }
            for line in &env_values {
                self.prt(2, lv.indent, line);
            }
        }
        self.written.extend(cmd.env_ops().keys().map(str::to_string));

        if !skeleton && !cmd.env_ops().is_empty() {
            self.prt(1, lv.indent, &color::tip(t!("desc.label.env_ops")).to_string());
            for key in cmd.env_ops().keys() {
                let ops: Vec<&str> = cmd.env_ops().ops(key).iter().map(|op| op.as_str()).collect();
                self.prt(2, lv.indent, &format!("{} = {}", color::key(key), ops.join(" : ")));
            }
        }

        if !simple {
            let mut line = cmd.ty().as_str().to_string();
            if cmd.is_quiet() {
                line.push_str(" quiet");
            }
            if cmd.is_priority() {
                line.push_str(" priority");
            }
            self.prt(1, lv.indent, &color::tip(t!("desc.label.cmd_type")).to_string());
            self.prt(2, lv.indent, &line);
            if !cmd.source().is_empty() && !cmd.cmd_line().starts_with(cmd.source()) {
                self.prt(1, lv.indent, &color::tip(t!("desc.label.from")).to_string());
                self.prt(2, lv.indent, cmd.source());
            }
        }

        match cmd.kind() {
            CmdKind::Flow(_) => {
                let (text, sub) = parse_sub_flow(&*self.cc, &env, &cmd, &argv)?;
                let duplicated = !failed && met_flows.contains(&text);
                let label = match (duplicated, !failed && lv.max_depth <= 1, skeleton) {
                    (true, _, true) => Some(t!("desc.label.dup_skeleton")),
                    (true, _, false) => Some(t!("desc.label.flow_dup")),
                    (false, true, true) => Some(t!("desc.label.folded_skeleton")),
                    (false, true, false) => Some(t!("desc.label.flow_folded")),
                    (false, false, true) => None,
                    (false, false, false) => Some(t!("desc.label.flow")),
                };
                met_flows.insert(text.clone());
                if let Some(label) = label {
                    self.prt(1, lv.indent, &color::tip(label).to_string());
                }
                if !skeleton {
                    self.prt(2, lv.indent, &color::cmd(&text).to_string());
                }
                sub.global_env.write_not_arg_to(env.session_mut());

                if !duplicated && !sub.is_empty() {
                    let expanded = failed || lv.max_depth > 1;
                    if expanded {
                        self.prt(2, lv.indent, &color::explain(FLOW_BEGIN).to_string());
                    }
                    let next_depth = if failed { lv.max_depth } else { lv.max_depth - 1 };
                    let sub_record = record.and_then(|r| r.sub_flow.as_ref());
                    if !self.descend(&mut env, &sub, sub_record, next_depth, sub_trivial, lv.indent + 2)? {
                        return Ok(false);
                    }
                    if !failed && lv.max_depth > 1 {
                        self.prt(2, lv.indent, &color::explain(FLOW_END).to_string());
                    }
                }
            }
            CmdKind::EmptyDir(dir) if !simple => {
                self.prt(1, lv.indent, &color::tip(t!("desc.label.dir")).to_string());
                self.prt(2, lv.indent, &dir.display().to_string());
            }
            CmdKind::File(file) | CmdKind::DirWithCommand(file) if !simple => {
                self.prt(1, lv.indent, &color::tip(t!("desc.label.executable")).to_string());
                self.prt(2, lv.indent, &file.display().to_string());
            }
            _ => {}
        }
        if !simple {
            if let Some(meta) = cmd.meta_file() {
                self.prt(1, lv.indent, &color::tip(t!("desc.label.meta")).to_string());
                self.prt(2, lv.indent, &meta.display().to_string());
            }
        }
        Ok(!failed)
    }

    /// Env values this step contributes, with where each comes from.
    fn env_lines(
        &self,
        flow: &ParsedFlow,
        parsed: &ParsedCmd,
        cmd: &Command,
        argv: &ArgVals,
        env: &Env,
    ) -> Vec<String> {
        let mut kvs: BTreeMap<String, (String, String)> = BTreeMap::new();
        let own = parsed.merged_env();
        for (k, v) in flow.global_env.iter().chain(own.iter()).filter(|(_, v)| !v.is_arg) {
            kvs.insert(k.to_string(), (v.val.clone(), t!("desc.source.flow").to_string()));
        }
        for (arg, key) in cmd.arg2env() {
            let Some(val) = argv.get(arg) else {
                continue;
            };
            if !val.provided && (val.raw.is_empty() || env.get_ex(key).is_some()) {
                continue;
            }
            if self.written.contains(key) {
                continue;
            }
            let source = format!(t!("desc.source.arg"), arg = arg);
            kvs.insert(key.clone(), (val.raw.clone(), source));
        }
        kvs.into_iter()
            .map(|(k, (v, source))| {
                format!("{} = {} {}", color::key(&k), may_quote(&v), color::explain(&source))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct Level {
    max_depth: i64,
    max_trivial: i64,
    indent: usize,
}

/// Provided args, plus defaults that are not already shadowed by the env key
/// they map to.
fn arg_lines(cmd: &Command, argv: &ArgVals, env: &Env) -> Vec<String> {
    let mut lines = Vec::new();
    for def in cmd.args().iter() {
        let value = match argv.get(&def.name) {
            Some(v) if v.provided => v.raw.clone(),
            _ => {
                if def.default.is_empty() {
                    continue;
                }
                let shadowed = cmd
                    .arg2env()
                    .get(&def.name)
                    .is_some_and(|key| env.get_ex(key).is_some());
                if shadowed {
                    continue;
                }
                def.default.clone()
            }
        };
        lines.push(format!("{} = {}", color::key(&def.name), may_quote(&value)));
    }
    lines
}

fn may_quote(v: &str) -> String {
    if v.is_empty() || v.chars().any(char::is_whitespace) {
        format!("'{}'", v)
    } else {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::FlowError;
    use crate::core::parser::tokenize;
    use crate::core::testing::TestBed;
    use crate::models::EnvOp;

    // --- Setup ---

    fn describe(bed: &mut TestBed, line: &str, args: DumpFlowArgs) -> FlowResult<String> {
        let flow = bed.cc.parse(&tokenize(line).unwrap());
        let before = bed.output().len();
        describe_flow(&mut bed.cc, &bed.env, &flow, &args)?;
        Ok(bed.output().split_off(before))
    }

    fn three_levels(bed: &mut TestBed, deepest_body: &str) {
        bed.cc.tree.add_cmd(Command::flow(&["l3"], "", vec![deepest_body.to_string()]), &[]);
        bed.cc.tree.add_cmd(Command::flow(&["l2"], "", vec!["l3".to_string()]), &[]);
        bed.cc.tree.add_cmd(Command::flow(&["l1"], "", vec!["l2".to_string()]), &[]);
    }

    // --- Tests ---

    #[test]
    fn test_fold_by_depth() {
        let mut bed = TestBed::new("");
        three_levels(&mut bed, "echo msg=deep");

        let out = describe(&mut bed, "l1", DumpFlowArgs::default().set_max_depth(2)).unwrap();
        assert!(out.contains("[l1]"));
        assert!(out.contains("[l2]"));
        assert!(out.contains("- flow (folded):"));
        assert!(!out.contains("[l3]"));
        assert!(!out.contains("[echo]"));

        let out = describe(&mut bed, "l1", DumpFlowArgs::default().set_max_depth(0)).unwrap();
        assert!(!out.contains("[l1]"));
    }

    #[test]
    fn test_folding_never_hides_render_errors() {
        let mut bed = TestBed::new("");
        three_levels(&mut bed, "echo msg=[[nowhere]]");
        let err = describe(&mut bed, "l1", DumpFlowArgs::default().set_max_depth(2)).unwrap_err();
        assert!(matches!(err, FlowError::Render { .. }));

        let mut bed = TestBed::new("");
        bed.cc.tree.add_cmd(
            Command::flow(&["top"], "", vec!["echo msg=[[nowhere]]".to_string()]),
            &[],
        );
        let err = describe(&mut bed, "top", DumpFlowArgs::default().set_max_depth(0)).unwrap_err();
        assert!(matches!(err, FlowError::Render { .. }));
    }

    #[test]
    fn test_fully_folded_flow_still_renders_every_level() {
        let mut bed = TestBed::new("");
        three_levels(&mut bed, "echo msg=[[nowhere]]");
        let err = describe(&mut bed, "l1", DumpFlowArgs::default().set_max_depth(0)).unwrap_err();
        assert!(matches!(err, FlowError::Render { .. }));
    }

    #[test]
    fn test_folded_levels_write_back_to_siblings() {
        let mut bed = TestBed::new("");
        bed.cc.tree.add_cmd(
            Command::flow(&["setter"], "", vec!["{mode=fast} : dummy".to_string()]),
            &[],
        );
        bed.cc.tree.add_cmd(Command::flow(&["wrap"], "", vec!["setter".to_string()]), &[]);
        bed.cc.tree.add_cmd(
            Command::flow(&["show"], "", vec!["echo msg=[[mode]]".to_string()]),
            &[],
        );
        // `show` is folded too, yet its body renders with the value set two
        // levels down inside `wrap`.
        let out = describe(&mut bed, "wrap : show", DumpFlowArgs::default().set_max_depth(0)).unwrap();
        assert!(!out.contains("[wrap]"));
        assert_eq!(bed.env.get_ex("mode"), None);

        let out = describe(&mut bed, "wrap : show", DumpFlowArgs::default().set_max_depth(1)).unwrap();
        assert!(out.contains("[wrap]"));
        assert!(!out.contains("[setter]"));
        assert!(out.contains("echo msg=fast"));
    }

    #[test]
    fn test_env_op_hooks_feed_later_renders() {
        fn hook(_: &ArgVals, _: &mut Context, env: &mut Env, _: &ParsedCmd) -> FlowResult<bool> {
            env.set("db.url", "pg://local");
            Ok(true)
        }
        let mut bed = TestBed::new("");
        bed.cc.add_env_op_cmd("db.url", EnvOp::Write, hook);
        bed.cc.tree.add_cmd(
            Command::flow(&["connect"], "", vec!["dummy".to_string()]).add_env_op("db.url", EnvOp::Write),
            &[],
        );
        bed.cc.tree.add_cmd(
            Command::flow(&["query"], "", vec!["echo msg=[[db.url]]".to_string()]),
            &[],
        );
        let out = describe(&mut bed, "connect : query", DumpFlowArgs::default()).unwrap();
        assert!(out.contains("echo msg=pg://local"));
        assert_eq!(bed.env.get_ex("db.url"), None);
    }

    #[test]
    fn test_self_referential_flow_stops_at_nesting_guard() {
        let mut bed = TestBed::new("");
        bed.env.set(KEY_STACK_DEPTH_MAX, "8");
        bed.cc.tree.add_cmd(Command::flow(&["loop"], "", vec!["loop".to_string()]), &[]);
        let out = describe(&mut bed, "loop", DumpFlowArgs::default().set_max_depth(2)).unwrap();
        assert!(out.contains("[loop]"));
    }

    #[test]
    fn test_trivial_budget_folds() {
        let mut bed = TestBed::new("");
        three_levels(&mut bed, "echo msg=deep");
        let out = describe(&mut bed, "^l1", DumpFlowArgs::default()).unwrap();
        // Trivial at the top with a budget of 1: shown with the mark, not expanded.
        assert!(out.contains("[l1]^"));
        assert!(!out.contains("[l2]"));

        let out = describe(&mut bed, "^l1", DumpFlowArgs::default().set_max_trivial(2)).unwrap();
        assert!(out.contains("[l2]"));
    }

    #[test]
    fn test_duplicated_sub_flow_expands_once_per_pass() {
        let mut bed = TestBed::new("");
        bed.cc.tree.add_cmd(
            Command::flow(&["greet"], "", vec!["echo msg=[[name]]".to_string()]).add_arg("name", "", &[]),
            &[],
        );
        let line = "greet name=a : greet name=a : greet name=b";
        let out = describe(&mut bed, line, DumpFlowArgs::default()).unwrap();
        assert_eq!(out.matches("(duplicated)").count(), 1);
        assert_eq!(out.matches("[echo]").count(), 2);

        let again = describe(&mut bed, line, DumpFlowArgs::default()).unwrap();
        assert_eq!(again.matches("(duplicated)").count(), 1);
    }

    #[test]
    fn test_write_back_reaches_siblings_but_args_do_not() {
        let mut bed = TestBed::new("");
        bed.cc.tree.add_cmd(
            Command::flow(&["setter"], "", vec!["{mode=fast} : dummy".to_string()]),
            &[],
        );
        bed.cc.tree.add_cmd(
            Command::flow(&["show"], "", vec!["echo msg=[[mode]]".to_string()]),
            &[],
        );
        bed.cc.tree.add_cmd(
            Command::flow(&["greet"], "", vec!["echo msg=[[name]]".to_string()]).add_arg("name", "", &[]),
            &[],
        );
        bed.cc.tree.add_cmd(
            Command::flow(&["needs-name"], "", vec!["echo msg=[[name]]".to_string()]),
            &[],
        );

        let out = describe(&mut bed, "setter : show", DumpFlowArgs::default()).unwrap();
        assert!(out.contains("echo msg=fast"));
        // Description works on a clone.
        assert_eq!(bed.env.get_ex("mode"), None);

        let err = describe(&mut bed, "greet name=Bob : needs-name", DumpFlowArgs::default()).unwrap_err();
        assert!(matches!(err, FlowError::Render { .. }));
    }

    #[test]
    fn test_env_values_and_args_are_listed() {
        let mut bed = TestBed::new("");
        bed.cc.tree.add_cmd(
            Command::flow(&["deploy"], "ship it", vec!["dummy".to_string()])
                .add_arg("target", "staging", &["t"])
                .add_arg2env("app.target", "target"),
            &[],
        );
        let out = describe(&mut bed, "deploy t=prod {region=eu}", DumpFlowArgs::default()).unwrap();
        assert!(out.contains("'ship it'"));
        assert!(out.contains("target = prod"));
        assert!(out.contains("region = eu <- flow"));
        assert!(out.contains("app.target = prod <- arg 'target'"));

        let out = describe(&mut bed, "deploy", DumpFlowArgs::default().set_skeleton()).unwrap();
        assert!(!out.contains("- cmd-type:"));
        assert!(!out.contains("target ="));
    }

    #[test]
    fn test_executed_overlay_marks() {
        let mut bed = TestBed::new("s\n");
        bed.cc.breakpoints.set_before(["echo".to_string()]);
        let line = "dummy : echo msg=x";
        let run = bed.run(line).unwrap();
        let flow = bed.cc.parse(&tokenize(line).unwrap());
        let before = bed.output().len();
        describe_executed(&mut bed.cc, &bed.env, &flow, &DumpFlowArgs::default(), &run.executed, false)
            .unwrap();
        let out = bed.output().split_off(before);
        assert!(out.contains("[dummy] - OK"));
        assert!(out.contains("[echo] - un-run"));
    }

    #[test]
    fn test_executed_overlay_failure_and_mismatch() {
        let mut bed = TestBed::new("").with_session();
        bed.cc.tree.add_cmd(Command::file(&["deploy"], "", "/opt/deploy.sh"), &[]);
        bed.runner.set_success(false);
        let run = bed.run("deploy").unwrap();
        assert!(!run.succeeded);

        let flow = bed.cc.parse(&tokenize("deploy").unwrap());
        let before = bed.output().len();
        describe_executed(&mut bed.cc, &bed.env, &flow, &DumpFlowArgs::default(), &run.executed, false)
            .unwrap();
        let out = bed.output().split_off(before);
        assert!(out.contains("[deploy] - ERR"));
        assert!(out.contains("- error:"));

        let other = bed.cc.parse(&tokenize("dummy").unwrap());
        let before = bed.output().len();
        describe_executed(&mut bed.cc, &bed.env, &other, &DumpFlowArgs::default(), &run.executed, true)
            .unwrap();
        assert!(bed.output().split_off(before).contains("flow not matched"));
    }
}
