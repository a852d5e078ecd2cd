//! Filesystem primitives shared by file-producing steps.
//!
//! - [`backup_file`]: copy an existing file to `<backup_dir>/<name>.<YYYYMMDD_HHMMSS>`
//! - [`write_atomic`]: write through a sibling temp file and rename
//! - [`copy_with_backup`]: back up the destination, then copy over it

use crate::error::{InstallerError, IoResultExt, Result};
use chrono::{Local, NaiveDateTime};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::info;

/// Backup suffix format. Lexical order equals chronological order.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Mode given to files that did not exist before they were written.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// `<file name>.<timestamp>`
pub fn backup_name(path: &Path, at: NaiveDateTime) -> Result<OsString> {
    let file_name = path.file_name().ok_or_else(|| {
        InstallerError::fs(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        )
    })?;
    let mut name = file_name.to_os_string();
    name.push(".");
    name.push(at.format(BACKUP_TIMESTAMP_FORMAT).to_string());
    Ok(name)
}

/// Copy `path` into `backup_dir` with a timestamp suffix.
///
/// Returns `Ok(None)` when `path` does not exist. The backup directory is
/// created when missing. Permission bits are preserved by the copy.
pub fn backup_file(path: &Path, backup_dir: &Path, at: NaiveDateTime) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }

    fs::create_dir_all(backup_dir).at_path(backup_dir)?;
    let backup_path = backup_dir.join(backup_name(path, at)?);
    fs::copy(path, &backup_path).at_path(&backup_path)?;

    info!("Backed up: {} -> {}", path.display(), backup_path.display());
    Ok(Some(backup_path))
}

/// [`backup_file`] stamped with the current local time.
pub fn backup_now(path: &Path, backup_dir: &Path) -> Result<Option<PathBuf>> {
    backup_file(path, backup_dir, Local::now().naive_local())
}

/// Write `contents` to `path` atomically, creating parent directories.
///
/// A failure leaves any existing file at `path` untouched. A new file gets
/// [`DEFAULT_FILE_MODE`].
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    write_atomic_with_mode(path, contents, DEFAULT_FILE_MODE)
}

/// [`write_atomic`], giving a newly created file `new_file_mode`.
///
/// A file being replaced keeps its own mode.
pub fn write_atomic_with_mode(path: &Path, contents: &[u8], new_file_mode: u32) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).at_path(&parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).at_path(&parent)?;
    tmp.write_all(contents).at_path(tmp.path())?;
    tmp.as_file().sync_all().at_path(tmp.path())?;

    // temp files start out 0600
    let permissions = match fs::metadata(path) {
        Ok(existing) => existing.permissions(),
        Err(_) => fs::Permissions::from_mode(new_file_mode),
    };
    fs::set_permissions(tmp.path(), permissions).at_path(tmp.path())?;

    tmp.persist(path).map_err(|e| InstallerError::fs(path, e.error))?;
    Ok(())
}

/// Permission bits of an existing file.
pub fn file_mode(path: &Path) -> Result<u32> {
    Ok(fs::metadata(path).at_path(path)?.permissions().mode() & 0o7777)
}

/// True when both files exist and hold identical bytes.
pub fn same_contents(a: &Path, b: &Path) -> bool {
    match (fs::read(a), fs::read(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}

/// Back up `dest` if it exists, then copy `source` over it.
///
/// Skips the copy (and the backup) when `dest` already matches `source`.
/// Returns `true` if a copy happened.
pub fn copy_with_backup(source: &Path, dest: &Path, backup_dir: Option<&Path>) -> Result<bool> {
    if same_contents(source, dest) {
        return Ok(false);
    }
    if let Some(dir) = backup_dir {
        backup_now(dest, dir)?;
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).at_path(parent)?;
    }
    fs::copy(source, dest).at_path(dest)?;
    Ok(true)
}

/// Back up `dest` if it exists, then atomically write `contents` to it.
///
/// Skips both when `dest` already holds `contents`. A newly created `dest`
/// gets `new_file_mode`. Returns `true` if written.
pub fn write_with_backup(
    dest: &Path,
    contents: &[u8],
    backup_dir: Option<&Path>,
    new_file_mode: u32,
) -> Result<bool> {
    if fs::read(dest).map(|existing| existing == contents).unwrap_or(false) {
        return Ok(false);
    }
    if let Some(dir) = backup_dir {
        backup_now(dest, dir)?;
    }
    write_atomic_with_mode(dest, contents, new_file_mode)?;
    Ok(true)
}
