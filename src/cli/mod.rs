// src/cli/mod.rs

use clap::Parser;

pub mod handlers;

/// Builds the color-aware help string at runtime.
fn build_help_string() -> &'static str {
    // Replaces semantic tags like `<title>` in the catalog template with ANSI styles.
    let use_colors = colored::control::SHOULD_COLORIZE.should_colorize();

    let template = t!("cli.help.template");

    let title = if use_colors { "\x1b[1;33m" } else { "" }; // Bold Yellow
    let hl = if use_colors { "\x1b[1;36m" } else { "" }; // Bold Cyan
    let cmd = if use_colors { "\x1b[36m" } else { "" }; // Cyan
    let group = if use_colors { "\x1b[1;32m" } else { "" }; // Bold Green
    let dim = if use_colors { "\x1b[2m" } else { "" };
    let reset = if use_colors { "\x1b[0m" } else { "" };

    let formatted_string = template
        .replace("<title>", title)
        .replace("</title>", reset)
        .replace("<hl>", hl)
        .replace("</hl>", reset)
        .replace("<cmd>", cmd)
        .replace("</cmd>", reset)
        .replace("<group>", group)
        .replace("</group>", reset)
        .replace("<dim>", dim)
        .replace("</dim>", reset);

    Box::leak(formatted_string.into_boxed_str())
}

/// flowrun: compose commands into flows, describe them, debug them step by step.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    help_template = { build_help_string() },
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
#[command(disable_help_subcommand = true)]
#[command(trailing_var_arg = true)]
pub struct Cli {
    /// Pause before every step.
    #[arg(long)]
    pub step: bool,

    /// Seconds to wait after each step.
    #[arg(long, value_name = "SEC")]
    pub delay: Option<u64>,

    /// Pause before these commands (comma separated paths).
    #[arg(long, value_name = "CMDS", value_delimiter = ',')]
    pub break_before: Vec<String>,

    /// Pause after these commands (comma separated paths).
    #[arg(long, value_name = "CMDS", value_delimiter = ',')]
    pub break_after: Vec<String>,

    /// Pause before the first step.
    #[arg(long)]
    pub break_at_begin: bool,

    /// Pause once the flow has finished.
    #[arg(long)]
    pub break_at_end: bool,

    /// Describe the plan instead of running it.
    #[arg(long, short = 'd')]
    pub desc: bool,

    /// Sub-flow levels expanded by `--desc`.
    #[arg(long, value_name = "N", default_value_t = 32)]
    pub max_depth: i64,

    /// Triviality budget of `--desc`; trivial sub-flows past it are folded.
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub max_trivial: i64,

    /// With `--desc`, only show paths, provided args and sub-flow structure.
    #[arg(long)]
    pub skeleton: bool,

    /// With `--desc`, leave out command types, sources and executables.
    #[arg(long)]
    pub simple: bool,

    /// Print the execution record as JSON when the run ends.
    #[arg(long)]
    pub json: bool,

    /// The flow: commands separated by `:`.
    #[arg(allow_hyphen_values = true)]
    pub flow: Vec<String>,
}
