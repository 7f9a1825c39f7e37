// src/core/paths.rs

use crate::constants::{APP_DIR, CONFIG_FILENAME, SESSIONS_DIR};
use lazy_static::lazy_static;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

lazy_static! {
    static ref CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

/// Errors locating or creating app directories.
#[derive(Error, Debug)]
pub enum PathError {
    /// The platform reports no config directory.
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    /// The platform reports no cache directory.
    #[error("Could not find system cache directory.")]
    CacheDirNotFound,
    /// Creating a directory failed.
    #[error("Could not create directory at '{path}': {source}")]
    DirCreation {
        /// Directory that could not be created.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// `~` or `$VAR` expansion failed.
    #[error("Failed to expand path '{path}': {msg}")]
    Expansion {
        /// Path as written.
        path: String,
        /// Expansion failure.
        msg: String,
    },
}

/// Returns the flowrun configuration directory (`~/.config/flowrun`), creating
/// it if needed. Memoized after the first call.
pub fn get_config_dir() -> Result<PathBuf, PathError> {
    if let Ok(guard) = CONFIG_DIR.lock() {
        if let Some(path) = &*guard {
            return Ok(path.clone());
        }
    }

    let config_path = dirs::config_dir()
        .ok_or(PathError::ConfigDirNotFound)?
        .join(APP_DIR);
    ensure_dir(&config_path)?;

    if let Ok(mut guard) = CONFIG_DIR.lock() {
        *guard = Some(config_path.clone());
    }
    Ok(config_path)
}

/// Path of the optional user config file.
pub fn get_config_file_path() -> Result<PathBuf, PathError> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILENAME))
}

/// Where saved flows live unless `sys.paths.flows` says otherwise.
pub fn default_flows_dir() -> Result<PathBuf, PathError> {
    get_config_dir().map(|dir| dir.join("flows"))
}

/// Creates a fresh per-run session directory:
/// `<cache_dir>/flowrun/sessions/<uuid>`.
pub fn new_session_dir() -> Result<PathBuf, PathError> {
    let base = dirs::cache_dir()
        .ok_or(PathError::CacheDirNotFound)?
        .join(APP_DIR)
        .join(SESSIONS_DIR);
    let dir = base.join(Uuid::new_v4().to_string());
    ensure_dir(&dir)?;
    log::debug!("Session directory: {}", dir.display());
    Ok(dir)
}

/// Expands `~` and environment variables (`$VAR`, `${VAR}`) in a path.
pub fn expand_path(template: &str) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full(template).map_err(|e| PathError::Expansion {
        path: template.to_string(),
        msg: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Creates `path` and its parents unless it already is a directory.
pub fn ensure_dir(path: &Path) -> Result<(), PathError> {
    if path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|e| PathError::DirCreation {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_path_home() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_path("~/flows").unwrap(), home.join("flows"));
        assert_eq!(expand_path("/abs/path").unwrap(), PathBuf::from("/abs/path"));
    }

    #[test]
    fn test_expand_path_unknown_var_fails() {
        let err = expand_path("$FLOWRUN_SURELY_UNSET_VAR_123/x").unwrap_err();
        assert!(matches!(err, PathError::Expansion { .. }));
    }

    #[test]
    fn test_ensure_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        // Idempotent.
        ensure_dir(&nested).unwrap();
    }
}
