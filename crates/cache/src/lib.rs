// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Cross-workspace, content-addressed object cache.
//!
//! Layout under `root`:
//! - `<d0>/<d1>/<targetDigest>/<depSetDigest>` — index entry: the
//!   newline-separated dependency path list that produced this object.
//! - `<d0>/<d1>/<objectDigest>` — the cached object bytes.
//!
//! `d0`/`d1` are the first four hex characters of the relevant digest,
//! split into two two-character shards.

use std::path::{Path, PathBuf};

use odb_core::{ArgsFingerprint, DependencyInfo, Digest, DigestCache, FileInfo, DIGEST_HEX_LEN};

/// The object cache root plus the optional workspace-relative rewriting
/// root used to make cache entries portable across checkouts.
pub struct ObjectCache {
    root: PathBuf,
    workspace_root: Option<PathBuf>,
}

fn shard(digest: &Digest) -> (String, String) {
    let hex = digest.to_hex();
    (hex[0..2].to_string(), hex[2..4].to_string())
}

fn resolve_against(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Rewrites `path` to be relative to `workspace_root` when it falls under
/// it; otherwise returned unchanged (spec §4.4). The comparison is
/// case-insensitive only where the host filesystem is (Windows, macOS
/// default); elsewhere it's a plain prefix strip.
fn rewrite_relative(path: &Path, workspace_root: Option<&Path>) -> PathBuf {
    let Some(root) = workspace_root else {
        return path.to_path_buf();
    };
    if let Ok(rel) = path.strip_prefix(root) {
        return rel.to_path_buf();
    }
    if cfg!(any(windows, target_os = "macos")) {
        let path_lower = path.to_string_lossy().to_lowercase();
        let root_lower = root.to_string_lossy().to_lowercase();
        if let Some(rest) = path_lower.strip_prefix(&root_lower) {
            return PathBuf::from(rest.trim_start_matches(['/', '\\']));
        }
    }
    path.to_path_buf()
}

impl ObjectCache {
    pub fn new(root: impl Into<PathBuf>, workspace_root: Option<PathBuf>) -> Self {
        Self { root: root.into(), workspace_root }
    }

    fn rewrite(&self, path: &Path) -> PathBuf {
        rewrite_relative(path, self.workspace_root.as_deref())
    }

    /// Public form of [`Self::rewrite`], for callers building a
    /// [`DependencyInfo`] to hand to [`Self::insert`] whose paths must
    /// already match what [`Self::lookup`] would compute internally.
    pub fn rewrite_path(&self, path: &Path) -> PathBuf {
        self.rewrite(path)
    }

    fn target_identity_digest(&self, target_path: &Path) -> Digest {
        Digest::of_bytes(self.rewrite(target_path).to_string_lossy().as_bytes())
    }

    fn index_dir(&self, target_digest: &Digest) -> PathBuf {
        let (d0, d1) = shard(target_digest);
        self.root.join(d0).join(d1).join(target_digest.to_hex())
    }

    fn object_path(&self, object_digest: &Digest) -> PathBuf {
        let (d0, d1) = shard(object_digest);
        self.root.join(d0).join(d1).join(object_digest.to_hex())
    }

    /// Builds the `DependencyInfo` this cache hashes over: the target and
    /// dependency paths rewritten workspace-relative, with current
    /// (mtime, digest) captured for the dependencies.
    fn rewritten_info(
        &self,
        target_path: &Path,
        args: &ArgsFingerprint,
        dependency_paths: &[PathBuf],
        digests: &DigestCache,
    ) -> Option<DependencyInfo> {
        let mut deps = Vec::with_capacity(dependency_paths.len());
        for dep in dependency_paths {
            let resolved = match &self.workspace_root {
                Some(root) => resolve_against(root, dep),
                None => dep.clone(),
            };
            let digest = digests.digest(&resolved)?;
            let mtime = odb_core::fs::mtime_ms(&resolved)?;
            deps.push(
                FileInfo::new(self.rewrite(dep)).with_timestamp(mtime).with_digest(digest),
            );
        }
        let target = FileInfo::new(self.rewrite(target_path));
        Some(DependencyInfo::new(vec![target], args.clone(), deps))
    }

    /// Lookup algorithm (spec §4.4), run after `checkDependencyInfo` says
    /// "rebuild". On hit, copies the cached object to `target_path` and
    /// returns the `DependencyInfo` to persist; the caller is responsible
    /// for writing it to the dependency database.
    pub fn lookup(
        &self,
        target_path: &Path,
        args: &ArgsFingerprint,
        digests: &DigestCache,
    ) -> Option<DependencyInfo> {
        let target_digest = self.target_identity_digest(target_path);
        let index_dir = self.index_dir(&target_digest);
        let entries = std::fs::read_dir(&index_dir).ok()?;

        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.len() != DIGEST_HEX_LEN || Digest::from_hex(&name).is_none() {
                continue;
            }

            let Ok(contents) = std::fs::read_to_string(entry.path()) else { continue };
            let dependency_paths: Vec<PathBuf> =
                contents.lines().filter(|l| !l.is_empty()).map(PathBuf::from).collect();

            let Some(trial) = self.rewritten_info(target_path, args, &dependency_paths, digests)
            else {
                continue;
            };

            let object_digest = trial.object_identity_digest();
            let object_path = self.object_path(&object_digest);
            if odb_core::fs::is_file(&object_path) {
                if odb_core::fs::copy_file(&object_path, target_path).is_ok() {
                    return Some(trial);
                }
            }
        }
        None
    }

    /// Insert algorithm (spec §4.4): copy object first, then publish the
    /// index entry. Best-effort — failures are logged at debug and
    /// swallowed (§9 open question: stricter policy than the source's
    /// silent swallow).
    pub fn insert(&self, built_object: &Path, info: &DependencyInfo) {
        let object_digest = info.object_identity_digest();
        let dep_set_digest = info.dependency_set_digest();
        let object_path = self.object_path(&object_digest);

        if let Err(e) = odb_core::fs::copy_file(built_object, &object_path) {
            tracing::debug!(error = %e, path = %object_path.display(), "object cache insert: copy failed");
            return;
        }

        let target_path = match info.targets.first() {
            Some(t) => &t.path,
            None => return,
        };
        let target_digest = Digest::of_bytes(target_path.to_string_lossy().as_bytes());
        let index_dir = self.index_dir(&target_digest);
        let index_entry = index_dir.join(dep_set_digest.to_hex());
        if odb_core::fs::is_file(&index_entry) {
            return;
        }

        let mut listing = String::new();
        for dep in &info.dependencies {
            listing.push_str(&dep.path.to_string_lossy());
            listing.push('\n');
        }
        if let Err(e) = odb_core::fs::atomic_write(&index_entry, listing.as_bytes()) {
            tracing::debug!(error = %e, path = %index_entry.display(), "object cache insert: index write failed");
        }
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
