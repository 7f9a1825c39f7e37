// src/core/config_loader.rs

//! # Config Loader
//!
//! Builds the start-up environment: built-in defaults first, then the user's
//! `config.toml` on top. Path-valued keys (`sys.paths.*`) go through
//! `shellexpand` so `~` and `$VAR` work in the config file.

use crate::constants::{DEFAULT_ENV, KEY_FLOWS_DIR};
use crate::core::env::Env;
use crate::core::paths::{self, PathError};
use crate::models::AppConfig;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

const PATH_KEY_PREFIX: &str = "sys.paths.";

/// Errors loading the user config.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("Could not read config file '{path}': {source}")]
    Io {
        /// Config file path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The file is not valid TOML for [`AppConfig`].
    #[error("Invalid config file '{path}': {source}")]
    Parse {
        /// Config file path.
        path: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
    /// A `sys.paths.*` value could not be expanded.
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Reads the user config. A missing file is an empty config.
pub fn load_app_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("No config file at '{}', using defaults.", path.display());
            return Ok(AppConfig::default());
        }
        Err(e) => {
            return Err(ConfigError::Io {
                path: path.display().to_string(),
                source: e,
            });
        }
    };
    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        source: e,
    })
}

/// Builds an environment whose default layer holds the built-in defaults,
/// `flows_dir` as the saved-flow location and the config's `[env]` overrides.
pub fn build_env(config: &AppConfig, flows_dir: &Path) -> Result<Env, ConfigError> {
    let mut env = Env::new();
    let defaults = env.default_layer_mut();
    for (k, v) in DEFAULT_ENV {
        defaults.set(*k, *v);
    }
    defaults.set(KEY_FLOWS_DIR, flows_dir.display().to_string());

    for (k, v) in &config.env {
        if k.starts_with(PATH_KEY_PREFIX) {
            let expanded = paths::expand_path(v)?;
            defaults.set(k.as_str(), expanded.display().to_string());
        } else {
            defaults.set(k.as_str(), v.as_str());
        }
    }
    log::debug!("Default env layer has {} entries.", env.default_layer().len());
    Ok(env)
}
