// src/builtin/env.rs

use crate::core::cmd_tree::CmdTree;
use crate::core::color;
use crate::core::context::Context;
use crate::core::env::Env;
use crate::core::errors::FlowResult;
use crate::core::flow::ParsedCmd;
use crate::models::{ArgVals, Command};

pub(super) fn register(tree: &mut CmdTree) {
    tree.add_cmd(
        Command::normal(&["env", "list"], t!("builtin.env_list.help"), list)
            .add_arg("find", "", &["f"])
            .set_quiet(),
        &["ls".to_string()],
    );
}

/// Prints the merged environment as seen by this step, filtered by
/// whitespace-separated find strings (all must match key or value).
fn list(argv: &ArgVals, cc: &mut Context, env: &mut Env, _cmd: &ParsedCmd) -> FlowResult<bool> {
    let finds: Vec<&str> = argv.get_raw("find").split_whitespace().collect();
    let flat = env.flatten(true, &[], false);
    let mut text = String::new();
    for (k, v) in &flat {
        if !finds.iter().all(|f| k.contains(f) || v.contains(f)) {
            continue;
        }
        text.push_str(&format!("{} = {}\n", color::key(k), v));
    }
    if text.is_empty() {
        text = format!("{}\n", color::explain(t!("builtin.env_list.empty")));
    }
    cc.print(&text);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use crate::core::testing::TestBed;

    #[test]
    fn test_list_filters_by_find() {
        let mut bed = TestBed::new("");
        bed.env.set("db.host", "localhost");
        bed.env.set("db.port", "5432");
        bed.run("env.ls db.host").unwrap();
        let out = bed.output();
        assert!(out.contains("db.host = localhost"));
        assert!(!out.contains("db.port"));
    }

    #[test]
    fn test_list_sees_inline_env() {
        let mut bed = TestBed::new("");
        bed.run("env.list {color=red} find=color").unwrap();
        assert!(bed.output().contains("color = red"));
    }

    #[test]
    fn test_list_reports_nothing_found() {
        let mut bed = TestBed::new("");
        bed.run("env.list find=no-such-key-anywhere").unwrap();
        assert!(bed.output().contains("no matching"));
    }
}
