//! Filesystem discipline shared by the setup phase, the weaver and the import tracker.
//!
//! Every write the weaver performs goes through [`write_atomic`]: write to a sibling temp
//! file, then rename. On Windows the temp file must not already exist at the rename target,
//! so [`write_atomic`] removes it first; on Unix the rename is already atomic-replace.

use crate::error::{Result, WeaveError};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Writes `contents` to `path` via write-temp-then-rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let tmp = tmp_path_for(path);
    fs::write(&tmp, contents)?;
    if cfg!(windows) && path.exists() {
        fs::remove_file(path)?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("tmp");
    path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()))
}

/// Reads and deserializes a JSON file.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(Into::into)
}

/// Serializes `value` as JSON and writes it atomically.
pub fn write_json_file<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes)
}

/// Copies `src` to `dst`, creating `dst`'s parent directories first.
pub fn copy_into(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst)?;
    Ok(())
}

/// Backs up `path` to `path.with_extension(<ext>.orig)` the first time it is seen, returning
/// the backup location. Idempotent: a second call for the same `path` is a no-op and returns
/// the existing backup.
pub fn backup_once(path: &Path, scratch: &Path) -> Result<PathBuf> {
    let backup_dir = scratch.join("backup");
    fs::create_dir_all(&backup_dir)?;
    let backup = backup_dir.join(backup_name(path));
    if !backup.exists() && path.exists() {
        fs::copy(path, &backup)?;
    }
    Ok(backup)
}

/// Restores every file under `scratch/backup` to its original location, named by
/// [`backup_name`]. Used unconditionally on the way out of a build, successful or not.
pub fn restore_backups(scratch: &Path, originals: &[PathBuf]) -> Result<()> {
    let backup_dir = scratch.join("backup");
    for original in originals {
        let backup = backup_dir.join(backup_name(original));
        if backup.exists() {
            fs::copy(&backup, original)?;
        }
    }
    Ok(())
}

fn backup_name(path: &Path) -> String {
    let digest = {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        path.hash(&mut hasher);
        hasher.finish()
    };
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("file");
    format!("{digest:016x}-{file_name}")
}

/// Globs `pattern` under `dir`, returning matches in deterministic (lexicographic) order.
/// Defensive: a glob syntax error becomes an empty result rather than a panic, since the
/// pattern is always constructed internally.
pub fn glob_sorted(dir: &Path, pattern: &str) -> Vec<PathBuf> {
    let full = dir.join(pattern);
    let Some(full) = full.to_str() else { return Vec::new() };
    let Ok(paths) = glob::glob(full) else { return Vec::new() };
    let mut out: Vec<PathBuf> = paths.filter_map(std::result::Result::ok).collect();
    out.sort();
    out
}

/// Creates `dir` if absent, failing with [`WeaveError::SetupAbort`] on error so callers at
/// the setup boundary get a properly classified error rather than a bare IO error.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .map_err(|e| WeaveError::SetupAbort(format!("cannot create {}: {e}", dir.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matched.json");
        write_atomic(&path, b"{}").unwrap();
        write_atomic(&path, b"{\"a\":1}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let value = vec!["a".to_string(), "b".to_string()];
        write_json_file(&value, &path).unwrap();
        let read: Vec<String> = read_json_file(&path).unwrap();
        assert_eq!(read, value);
    }

    #[test]
    fn backup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join(".build");
        let original = dir.path().join("go.mod");
        fs::write(&original, "module example\n").unwrap();
        let b1 = backup_once(&original, &scratch).unwrap();
        fs::write(&original, "module example\n\nrequire foo v1\n").unwrap();
        let b2 = backup_once(&original, &scratch).unwrap();
        assert_eq!(b1, b2);
        assert_eq!(fs::read_to_string(&b1).unwrap(), "module example\n");
    }
}
