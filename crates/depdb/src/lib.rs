// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Per-target dependency database: one `<target>.dep` file per built
//! target, recording what produced it and what it depends on.

use std::path::{Path, PathBuf};

use odb_core::{ArgsFingerprint, DependencyInfo, FileInfo};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed writing dependency record for {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: odb_core::FsError,
    },
}

/// Record of why a target needs rebuilding. `None` means up-to-date.
pub type Reason = Option<String>;

fn dep_file_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".dep");
    PathBuf::from(name)
}

/// Per-target dependency record store.
///
/// No cross-target locking: each target's `.dep` file is written only by
/// the task that builds that target, so there is no contention to guard
/// against.
#[derive(Default)]
pub struct DependencyDb;

impl DependencyDb {
    pub fn new() -> Self {
        Self
    }

    /// Read the prior record for `target_path`, if any and if parseable.
    pub fn get_dependency_info(&self, target_path: &Path) -> Option<DependencyInfo> {
        let bytes = std::fs::read(dep_file_path(target_path)).ok()?;
        DependencyInfo::from_bytes(&bytes)
    }

    /// Atomically overwrite the record for every target named in `info`.
    pub fn store_dependency_info(&self, info: &DependencyInfo) -> Result<(), DbError> {
        let bytes = info.to_bytes();
        for target in &info.targets {
            let dep_path = dep_file_path(&target.path);
            odb_core::fs::atomic_write(&dep_path, &bytes)
                .map_err(|source| DbError::Write { path: dep_path, source })?;
        }
        Ok(())
    }

    /// The five-condition freshness check (spec §4.3). Returns `(info,
    /// None)` when up-to-date, or `(None, Some(reason))` otherwise.
    pub fn check_dependency_info(
        &self,
        target_path: &Path,
        args: &ArgsFingerprint,
        force_build: bool,
    ) -> (Option<DependencyInfo>, Reason) {
        if force_build {
            return (None, Some("forced".to_string()));
        }

        let info = match self.get_dependency_info(target_path) {
            Some(info) => info,
            None => return (None, Some("no prior record".to_string())),
        };

        if &info.args != args {
            return (None, Some("args changed".to_string()));
        }

        for target in &info.targets {
            if !odb_core::fs::is_file(&target.path) {
                return (None, Some(format!("target {} missing", target.path.display())));
            }
        }

        if let Some(reason) = self.stale_input_reason(&info) {
            return (None, Some(reason));
        }

        (Some(info), None)
    }

    fn stale_input_reason(&self, info: &DependencyInfo) -> Reason {
        let oldest_target_mtime =
            info.targets.iter().filter_map(|t| t.timestamp_ms).min().unwrap_or(0);

        for dep in &info.dependencies {
            let current = match odb_core::fs::mtime_ms(&dep.path) {
                Some(ms) => ms,
                None => return Some(format!("input {} missing", dep.path.display())),
            };
            let recorded_matches = dep.timestamp_ms == Some(current);
            if !recorded_matches && current > oldest_target_mtime {
                return Some(format!("input {} newer than target", dep.path.display()));
            }
            if !recorded_matches {
                return Some(format!("input {} changed", dep.path.display()));
            }
        }
        None
    }
}

/// Convenience: build a [`FileInfo`] for a dependency from the current
/// filesystem state, suitable for inclusion in a [`DependencyInfo`] about
/// to be stored.
pub fn capture_file_info(path: &Path, digests: Option<&odb_core::DigestCache>) -> FileInfo {
    FileInfo::capture(path, digests)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
