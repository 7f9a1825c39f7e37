// src/core/interactive.rs

//! The nested read-eval loop reachable from a pause menu. Each line is a flow
//! executed against the live environment, so whatever it changes is what the
//! paused run sees when it resumes.

use crate::core::color;
use crate::core::context::Context;
use crate::core::env::Env;
use crate::core::errors::FlowResult;
use crate::core::executor;
use crate::core::parser::tokenize;

const BACK_TO_MENU: &str = "e";
const LEAVE_AND_CONTINUE: &str = "c";

/// Runs until the user types `e` (back to the menu) or `c` (leave and continue).
/// End of input behaves like `e`.
pub fn interactive_mode(cc: &mut Context, env: &mut Env) -> FlowResult<()> {
    let was_interacting = cc.control.interacting;
    cc.control.interacting = true;
    let result = read_eval_loop(cc, env);
    cc.control.interacting = was_interacting;
    result
}

fn read_eval_loop(cc: &mut Context, env: &mut Env) -> FlowResult<()> {
    let banner = format!(
        t!("interact.banner"),
        back = BACK_TO_MENU,
        leave = LEAVE_AND_CONTINUE
    );
    cc.print(&format!("{}\n", color::tip(&banner)));

    loop {
        let Some(line) = cc.input.read_line(t!("interact.prompt"))? else {
            log::debug!("Input closed inside interactive mode.");
            return Ok(());
        };
        let line = line.trim();
        match line {
            "" => continue,
            BACK_TO_MENU => return Ok(()),
            LEAVE_AND_CONTINUE => {
                cc.control.leaving = true;
                return Ok(());
            }
            _ => {}
        }

        let Some(tokens) = tokenize(line) else {
            let msg = format!(t!("interact.error.bad_quotes"), line = line);
            cc.print(&format!("{}\n", color::error(&msg)));
            continue;
        };
        match executor::execute_line(cc, env, &tokens) {
            Ok(run) if !run.succeeded => {
                cc.print(&format!("{}\n", color::error(t!("interact.error.flow_failed"))));
            }
            Ok(_) => {}
            Err(e) if e.is_abort() => return Err(e),
            Err(e) => cc.print(&format!("{}\n", color::error(&e.to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::TestBed;

    #[test]
    fn test_lines_mutate_live_env() {
        let mut bed = TestBed::new("{color=red}\ne\n");
        interactive_mode(&mut bed.cc, &mut bed.env).unwrap();
        assert_eq!(bed.env.get_raw("color"), "red");
        assert!(!bed.cc.control.leaving);
        assert!(!bed.cc.control.interacting);
    }

    #[test]
    fn test_leave_sets_flag() {
        let mut bed = TestBed::new("c\n");
        interactive_mode(&mut bed.cc, &mut bed.env).unwrap();
        assert!(bed.cc.control.leaving);
    }

    #[test]
    fn test_errors_do_not_end_the_loop() {
        let mut bed = TestBed::new("no.such.cmd\necho msg=still-here\ne\n");
        interactive_mode(&mut bed.cc, &mut bed.env).unwrap();
        let out = bed.output();
        assert!(out.contains("unknown command"));
        assert!(out.contains("still-here"));
    }
}
