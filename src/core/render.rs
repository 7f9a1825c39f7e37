// src/core/render.rs

use crate::constants::PATH_SEP;
use crate::core::env::Env;
use crate::core::errors::{FlowError, FlowResult};
use crate::models::{ArgVals, Command};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // `[[name]]`; names may not contain brackets.
    static ref PLACEHOLDER_RE: Option<Regex> = Regex::new(r"\[\[\s*([^\[\]\s]+)\s*\]\]").ok();
}

/// Expands every `[[name]]` in `template`: the invocation's argument values
/// first, then the merged environment. Returns the names nothing could satisfy.
pub fn render_template(template: &str, argv: &ArgVals, env: &Env) -> Result<String, Vec<String>> {
    let Some(re) = PLACEHOLDER_RE.as_ref() else {
        return Ok(template.to_string());
    };
    let mut missing = Vec::new();
    let rendered = re.replace_all(template, |caps: &regex::Captures<'_>| {
        let name = caps.get(1).map_or("", |m| m.as_str());
        let from_arg = argv
            .get(name)
            .filter(|v| v.provided || !v.raw.is_empty())
            .map(|v| v.raw.clone());
        match from_arg.or_else(|| env.get_ex(name).map(str::to_string)) {
            Some(val) => val,
            None => {
                missing.push(name.to_string());
                String::new()
            }
        }
    });
    if missing.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(missing)
    }
}

/// Renders the flow body of `cmd`. Any unresolved placeholder is fatal.
pub fn render_flow(cmd: &Command, argv: &ArgVals, env: &Env) -> FlowResult<Vec<String>> {
    let mut out = Vec::with_capacity(cmd.flow_strs().len());
    for line in cmd.flow_strs() {
        let rendered = render_template(line, argv, env).map_err(|missing| FlowError::Render {
            cmd: cmd.display_path(PATH_SEP),
            msg: format!("no value for [[{}]] in '{}'", missing.join("]], [["), line),
        })?;
        out.push(rendered);
    }
    Ok(out)
}
