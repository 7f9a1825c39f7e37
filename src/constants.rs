// src/constants.rs

/// Name of the application directory under the user config and cache dirs.
pub const APP_DIR: &str = "flowrun";

/// The user config file (inside the app config dir).
pub const CONFIG_FILENAME: &str = "config.toml";

/// Directory (inside the app cache dir) holding one subdirectory per run.
pub const SESSIONS_DIR: &str = "sessions";

// --- Flow syntax ---

/// Separates the segments of a command path.
pub const PATH_SEP: &str = ".";

/// Separates commands inside a flow.
pub const SEQ_SEP: &str = ":";

/// Prefix marking a command invocation as trivial; repeat for higher levels.
pub const TRIVIAL_MARK: char = '^';

// --- Env keys ---

/// Directory of the current run's session.
pub const KEY_SESSION: &str = "session";

/// File name of the session env file inside the session directory.
pub const KEY_SESSION_ENV_FILE: &str = "strs.session-env-file";

/// Separator between key and value in the session env file.
pub const KEY_ENV_KV_SEP: &str = "strs.env-kv-sep";

/// Extension of saved flow files.
pub const KEY_FLOW_EXT: &str = "strs.flow-ext";

/// Interpreter lookup: `sys.ext.exec.<ext>` for a file with extension `ext`.
pub const KEY_EXEC_PREFIX: &str = "sys.ext.exec";

/// Interpreter for files without a mapped extension.
pub const KEY_EXEC_DEFAULT: &str = "sys.ext.exec.default";

/// Pause before every step.
pub const KEY_STEP_BY_STEP: &str = "sys.step-by-step";
/// Seconds to sleep before each step.
pub const KEY_DELAY_SEC: &str = "sys.execute-delay-sec";
/// Seconds to sleep after the last step.
pub const KEY_DELAY_SEC_AT_END: &str = "sys.execute-delay-sec.at-end";

/// Directory where saved flows live.
pub const KEY_FLOWS_DIR: &str = "sys.paths.flows";

/// Nesting level of the running flow, maintained by the executor.
pub const KEY_STACK_DEPTH: &str = "sys.stack-depth";
/// Deepest allowed sub-flow nesting.
pub const KEY_STACK_DEPTH_MAX: &str = "sys.stack-depth-max";

/// Used when `sys.stack-depth-max` is unset or malformed.
pub const DEFAULT_STACK_DEPTH_MAX: i64 = 64;

/// Built-in defaults of the default env layer. The user config file overrides them.
pub const DEFAULT_ENV: &[(&str, &str)] = &[
    (KEY_SESSION_ENV_FILE, "env"),
    (KEY_ENV_KV_SEP, "="),
    (KEY_FLOW_EXT, ".flow.toml"),
    (KEY_EXEC_DEFAULT, "bash"),
    ("sys.ext.exec.sh", "bash"),
    ("sys.ext.exec.bash", "bash"),
    ("sys.ext.exec.py", "python3"),
    (KEY_STEP_BY_STEP, "false"),
    (KEY_DELAY_SEC, "0"),
    (KEY_DELAY_SEC_AT_END, "0"),
    (KEY_STACK_DEPTH_MAX, "64"),
];
