// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem primitives shared by every subsystem that touches disk.
//!
//! Every write goes through [`atomic_write`]: write to a sibling temp file,
//! then rename into place, so concurrent readers never observe a partial
//! write (spec invariant: atomic writes).

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path, source: std::io::Error) -> FsError {
    FsError::Io { path: path.to_path_buf(), source }
}

/// Create `path` and all missing parent directories.
pub fn make_dirs(path: &Path) -> Result<(), FsError> {
    std::fs::create_dir_all(path).map_err(|e| io_err(path, e))
}

/// Recursively delete `path` if it exists. Not an error if it's already gone.
pub fn remove_tree(path: &Path) -> Result<(), FsError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path).map_err(|e| io_err(path, e)),
        Ok(_) => std::fs::remove_file(path).map_err(|e| io_err(path, e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(path, e)),
    }
}

/// Write `data` to `target` atomically: write to `target.tmp-<pid>`, fsync,
/// then rename over `target`. The rename is atomic on POSIX filesystems.
pub fn atomic_write(target: &Path, data: &[u8]) -> Result<(), FsError> {
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            make_dirs(parent)?;
        }
    }
    let tmp_name = format!(
        ".{}.tmp-{}",
        target.file_name().and_then(|n| n.to_str()).unwrap_or("odb"),
        std::process::id()
    );
    let tmp_path = target.with_file_name(tmp_name);

    {
        let mut f = std::fs::File::create(&tmp_path).map_err(|e| io_err(&tmp_path, e))?;
        f.write_all(data).map_err(|e| io_err(&tmp_path, e))?;
        f.sync_all().map_err(|e| io_err(&tmp_path, e))?;
    }

    rename_retrying(&tmp_path, target)
}

/// Rename `from` to `to`. On Unix this is a single atomic syscall; no retry
/// loop is needed (see DESIGN.md open question on the rename-retry clock).
#[cfg(not(windows))]
fn rename_retrying(from: &Path, to: &Path) -> Result<(), FsError> {
    std::fs::rename(from, to).map_err(|e| io_err(to, e))
}

/// On Windows, antivirus software can transiently hold a handle open on the
/// destination path immediately after it's removed/replaced. Retry renames
/// for up to one second before giving up.
#[cfg(windows)]
fn rename_retrying(from: &Path, to: &Path) -> Result<(), FsError> {
    let start = std::time::Instant::now();
    loop {
        match std::fs::rename(from, to) {
            Ok(()) => return Ok(()),
            Err(e) if start.elapsed() < std::time::Duration::from_secs(1) => {
                std::thread::sleep(std::time::Duration::from_millis(20));
                let _ = e;
            }
            Err(e) => return Err(io_err(to, e)),
        }
    }
}

/// Copy `source` to `target`, creating `target`'s parent directories first.
pub fn copy_file(source: &Path, target: &Path) -> Result<(), FsError> {
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            make_dirs(parent)?;
        }
    }
    std::fs::copy(source, target).map_err(|e| io_err(source, e))?;
    Ok(())
}

/// Last-modified time of `path` as milliseconds since the Unix epoch, or
/// `None` if the path doesn't exist.
pub fn mtime_ms(path: &Path) -> Option<u64> {
    let meta = std::fs::metadata(path).ok()?;
    let modified = meta.modified().ok()?;
    let dur = modified.duration_since(std::time::UNIX_EPOCH).ok()?;
    Some(dur.as_millis() as u64)
}

pub fn is_file(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
