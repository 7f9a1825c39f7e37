// src/core/env_file.rs

//! The session env file: the only place the environment crosses a process
//! boundary. One `key<sep>value` entry per line, rewritten atomically.

use crate::core::env::{Env, EnvLayer};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Keys never written to the session file.
const FILTERED_PREFIXES: &[&str] = &["session", "strs.", "display.height", "sys.stack"];

/// Errors reading or writing a session env file.
#[derive(Error, Debug)]
pub enum EnvError {
    /// Reading or writing the file failed.
    #[error("Filesystem error on env file '{path}': {source}")]
    Io {
        /// Env file path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The atomic rename of a rewritten file failed.
    #[error("Error with temporary env file: {0}")]
    TempFile(#[from] tempfile::PersistError),
    /// A line without the key/value separator.
    #[error("Bad env line '{line}' in '{path}': missing separator '{sep}'")]
    BadLine {
        /// Env file path.
        path: String,
        /// The offending line.
        line: String,
        /// Separator that was expected.
        sep: String,
    },
    /// A value holding a line break, which the line format cannot carry.
    #[error("Value of '{key}' spans several lines and cannot be stored in env file '{path}'")]
    MultiLine {
        /// Env file path.
        path: String,
        /// Key of the offending value.
        key: String,
    },
}

/// Session entries that go to the file: filtered keys and values equal to
/// the default layer are left out.
fn session_entries(env: &Env) -> impl Iterator<Item = (&str, &str)> {
    let defaults = env.default_layer();
    env.session()
        .iter()
        .filter(|(k, _)| !FILTERED_PREFIXES.iter().any(|p| k.starts_with(p)))
        .filter(move |(k, v)| defaults.get(k) != Some(*v))
}

/// Writes the session layer, one entry per line. Callers make sure no value
/// holds a line break; see [`save_session_to_file`].
pub fn write_session<W: Write>(env: &Env, writer: &mut W, sep: &str) -> std::io::Result<()> {
    for (k, v) in session_entries(env) {
        writeln!(writer, "{}{}{}", k, sep, v)?;
    }
    Ok(())
}

/// Reads `key<sep>value` lines into a layer. Blank lines are skipped.
pub fn read_into_layer<R: BufRead>(
    layer: &mut EnvLayer,
    reader: R,
    sep: &str,
    origin: &str,
) -> Result<(), EnvError> {
    for line in reader.lines() {
        let line = line.map_err(|e| EnvError::Io {
            path: origin.to_string(),
            source: e,
        })?;
        let text = line.trim_end_matches(['\r', '\n']);
        if text.is_empty() {
            continue;
        }
        let (key, val) = text.split_once(sep).ok_or_else(|| EnvError::BadLine {
            path: origin.to_string(),
            line: text.to_string(),
            sep: sep.to_string(),
        })?;
        layer.set(key, val);
    }
    Ok(())
}

/// Saves the session layer to `path` through a temp file in the same directory
/// followed by a rename, so readers never observe a half-written file.
///
/// A value with a line break would not read back as one entry, so it is
/// refused before anything is written.
pub fn save_session_to_file(env: &Env, path: &Path, sep: &str) -> Result<(), EnvError> {
    if let Some((key, _)) = session_entries(env).find(|(_, v)| v.contains(['\n', '\r'])) {
        return Err(EnvError::MultiLine {
            path: path.display().to_string(),
            key: key.to_string(),
        });
    }
    atomic_write(path, |file| write_session(env, file, sep))
}

/// Loads `path` into the session layer. A missing file is not an error.
pub fn load_session_from_file(env: &mut Env, path: &Path, sep: &str) -> Result<(), EnvError> {
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("No env file at '{}', nothing to load.", path.display());
            return Ok(());
        }
        Err(e) => {
            return Err(EnvError::Io {
                path: path.display().to_string(),
                source: e,
            });
        }
    };
    read_into_layer(
        env.session_mut(),
        BufReader::new(file),
        sep,
        &path.display().to_string(),
    )
}

/// Temp-file + rename discipline shared by every atomic save in the crate.
pub fn atomic_write<F>(path: &Path, fill: F) -> Result<(), EnvError>
where
    F: FnOnce(&mut NamedTempFile) -> std::io::Result<()>,
{
    let io_err = |e: std::io::Error| EnvError::Io {
        path: path.display().to_string(),
        source: e,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    fill(&mut tmp).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path)?;
    log::debug!("Env file saved at '{}'.", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("env");

        let mut env = Env::new();
        env.set("a.b", "1");
        env.set("c", "x y");
        save_session_to_file(&env, &path, "=").unwrap();

        let mut fresh = Env::new();
        load_session_from_file(&mut fresh, &path, "=").unwrap();
        assert_eq!(
            fresh.flatten(true, &[], false),
            env.flatten(true, &[], false)
        );
    }

    #[test]
    fn test_failed_save_leaves_original_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("env");
        fs::write(&path, "keep=me\n").unwrap();

        let result = atomic_write(&path, |file| {
            file.write_all(b"half")?;
            Err(std::io::Error::other("simulated crash"))
        });
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep=me\n");

        // Only the original file remains; the temp file was cleaned up.
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_filtered_and_default_equal_keys_are_not_written() {
        let mut env = Env::new();
        env.default_layer_mut().set("same", "v");
        env.set("same", "v");
        env.set("session", "/tmp/s");
        env.set("strs.sep", ":");
        env.set("kept", "yes");

        let mut out = Vec::new();
        write_session(&env, &mut out, "=").unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "kept=yes\n");
    }

    #[test]
    fn test_multi_line_value_is_refused_before_writing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("env");
        fs::write(&path, "keep=me\n").unwrap();

        let mut env = Env::new();
        env.set("ok", "1");
        env.set("notes", "line one\nline two");
        let err = save_session_to_file(&env, &path, "=").unwrap_err();
        assert!(matches!(err, EnvError::MultiLine { ref key, .. } if key == "notes"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep=me\n");

        // A filtered key never reaches the file, so its value does not matter.
        let mut env = Env::new();
        env.set("strs.banner", "a\nb");
        env.set("ok", "1");
        save_session_to_file(&env, &path, "=").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "ok=1\n");
    }

    #[test]
    fn test_bad_line_is_reported() {
        let mut env = Env::new();
        let result = read_into_layer(env.session_mut(), Cursor::new("no-separator\n"), "=", "mem");
        assert!(matches!(result, Err(EnvError::BadLine { .. })));
    }

    #[test]
    fn test_value_may_contain_separator() {
        let mut env = Env::new();
        read_into_layer(env.session_mut(), Cursor::new("k=a=b\n\n"), "=", "mem").unwrap();
        assert_eq!(env.get_raw("k"), "a=b");
    }

    #[test]
    fn test_missing_file_loads_nothing() {
        let dir = tempdir().unwrap();
        let mut env = Env::new();
        load_session_from_file(&mut env, &dir.path().join("nope"), "=").unwrap();
        assert!(env.session().is_empty());
    }
}
