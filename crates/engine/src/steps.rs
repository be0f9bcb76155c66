// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The build-step life cycle (spec §4.5): fingerprint the plugin's
//! commands, ask the dependency database whether the target is already
//! current, fall back to the object cache for object files, and otherwise
//! run the commands and record what they touched.

use std::path::{Path, PathBuf};

use odb_cache::ObjectCache;
use odb_core::{BuildError, CompilerSettings, Diagnostic, EnvironmentError, FileInfo};
use odb_depdb::DbError;
use odb_driver::DriverError;
use odb_graph::TaskResult;

use crate::build_graph::{LibraryNode, ModuleCopyNode, ModuleNode, ObjectNode, PchNode, ProgramNode};
use crate::engine::Engine;

fn object_cache(settings: &CompilerSettings) -> Option<ObjectCache> {
    let root = settings.object_cache_path.clone()?;
    Some(ObjectCache::new(root, settings.object_cache_workspace_root.clone()))
}

fn resolve_against(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

impl Engine {
    fn log_reason(&self, target: &Path, reason: &str) {
        tracing::debug!(target: "odb::reason", path = %target.display(), reason, "rebuild needed");
    }

    fn ensure_parent_dir(&self, target: &Path) -> bool {
        let Some(parent) = target.parent() else { return true };
        if parent.as_os_str().is_empty() {
            return true;
        }
        if let Err(e) = odb_core::fs::make_dirs(parent) {
            self.raise_error(Diagnostic::new(
                EnvironmentError::Unusable {
                    path: parent.to_path_buf(),
                    purpose: "output directory".to_string(),
                    message: e.to_string(),
                },
                Some(target.to_path_buf()),
            ));
            return false;
        }
        true
    }

    fn record_driver_error(&self, target: &Path, err: DriverError) {
        match err {
            DriverError::Spawn { program, source } => {
                tracing::debug!(error = %source, program = %program, "spawn failed");
                self.raise_error(Diagnostic::new(
                    EnvironmentError::ToolNotFound { name: program },
                    Some(target.to_path_buf()),
                ));
            }
            DriverError::CommandFailed { status, stderr, .. } => {
                self.raise_error(Diagnostic::new(
                    BuildError::CommandFailed { target: target.to_path_buf(), status, stderr },
                    Some(target.to_path_buf()),
                ));
            }
            DriverError::Fs(fs_err) => {
                self.raise_error(Diagnostic::new(
                    BuildError::Other { target: target.to_path_buf(), message: fs_err.to_string() },
                    Some(target.to_path_buf()),
                ));
            }
        }
    }

    fn record_db_error(&self, target: &Path, err: DbError) {
        self.raise_error(Diagnostic::new(
            BuildError::Other { target: target.to_path_buf(), message: err.to_string() },
            Some(target.to_path_buf()),
        ));
    }

    fn store_local_info(
        &self,
        target: &Path,
        args: &odb_core::ArgsFingerprint,
        dependencies: &[FileInfo],
        workspace_root: &Path,
    ) -> Result<(), DbError> {
        let deps_local: Vec<FileInfo> = dependencies
            .iter()
            .map(|d| {
                let abs = resolve_against(workspace_root, &d.path);
                odb_depdb::capture_file_info(&abs, Some(self.digests()))
            })
            .collect();
        let target_info = FileInfo::capture(target, Some(self.digests()));
        let info = odb_core::DependencyInfo::new(vec![target_info], args.clone(), deps_local);
        self.depdb().store_dependency_info(&info)
    }

    fn store_local_scan(
        &self,
        target: &Path,
        args: &odb_core::ArgsFingerprint,
        scanned: &[PathBuf],
    ) -> Result<(), DbError> {
        let deps_local: Vec<FileInfo> =
            scanned.iter().map(|p| odb_depdb::capture_file_info(p, Some(self.digests()))).collect();
        let target_info = FileInfo::capture(target, Some(self.digests()));
        let info = odb_core::DependencyInfo::new(vec![target_info], args.clone(), deps_local);
        self.depdb().store_dependency_info(&info)
    }

    /// Seeds the digest cache from the prior `DependencyInfo` for `target`,
    /// if one exists, so an unchanged file's digest is not recomputed
    /// before the object-cache lookup (spec §4.5 step 3).
    fn seed_digests_from_prior(&self, target: &Path) {
        let Some(prior) = self.depdb().get_dependency_info(target) else { return };
        for dep in &prior.dependencies {
            if let (Some(mtime), Some(digest)) = (dep.timestamp_ms, dep.digest) {
                self.digests().seed(dep.path.clone(), mtime, digest);
            }
        }
    }

    fn insert_into_object_cache(
        &self,
        cache: &ObjectCache,
        target: &Path,
        args: &odb_core::ArgsFingerprint,
        scanned: &[PathBuf],
    ) {
        let mut cache_deps = Vec::with_capacity(scanned.len());
        for path in scanned {
            let Some(digest) = self.digests().digest(path) else { return };
            let mtime = odb_core::fs::mtime_ms(path);
            cache_deps.push(FileInfo { path: cache.rewrite_path(path), timestamp_ms: mtime, digest: Some(digest) });
        }
        let target_for_cache = FileInfo::new(cache.rewrite_path(target));
        let info = odb_core::DependencyInfo::new(vec![target_for_cache], args.clone(), cache_deps);
        cache.insert(target, &info);
    }

    pub(crate) fn run_pch_step(&self, node: &PchNode) -> TaskResult {
        if self.is_cancelled() {
            return Err(());
        }
        let cmds = self.plugin().get_pch_commands(
            &node.target,
            &node.source,
            &node.header,
            node.companion_object.as_deref(),
            &node.settings,
        );
        let (_, reason) =
            self.depdb().check_dependency_info(&node.target, &cmds.compile.args, self.options().force_build);
        let Some(reason) = reason else {
            return Ok(());
        };
        self.log_reason(&node.target, &reason);

        if !self.ensure_parent_dir(&node.target) {
            return Err(());
        }

        tracing::info!(target: "odb::run", "Precompiling {}", node.source.display());
        if let Err(e) = (cmds.compile.run)() {
            self.record_driver_error(&node.target, e);
            return Err(());
        }
        if !odb_core::fs::is_file(&node.target) {
            self.raise_error(Diagnostic::new(
                BuildError::OutputMissing { target: node.target.clone() },
                Some(node.target.clone()),
            ));
            return Err(());
        }

        if let Err(e) = self.store_local_scan(&node.target, &cmds.compile.args, std::slice::from_ref(&node.source)) {
            self.record_db_error(&node.target, e);
            return Err(());
        }
        self.notify_file_changed(&node.target);
        Ok(())
    }

    pub(crate) fn run_object_step(&self, node: &ObjectNode, pch: Option<&odb_core::PchTarget>) -> TaskResult {
        if self.is_cancelled() {
            return Err(());
        }
        let cmds = self.plugin().get_object_commands(&node.target, &node.source, pch, &node.settings);
        let (_, reason) =
            self.depdb().check_dependency_info(&node.target, &cmds.compile.args, self.options().force_build);
        let Some(reason) = reason else {
            return Ok(());
        };
        self.log_reason(&node.target, &reason);

        if cmds.can_cache && !self.options().force_build {
            if let Some(cache) = object_cache(&node.settings) {
                self.seed_digests_from_prior(&node.target);
                if let Some(hit) = cache.lookup(&node.target, &cmds.compile.args, self.digests()) {
                    tracing::info!(target: "odb::run", "Cached {}", node.target.display());
                    if let Err(e) = self.store_local_info(
                        &node.target,
                        &cmds.compile.args,
                        &hit.dependencies,
                        &node.settings.workspace_root,
                    ) {
                        self.record_db_error(&node.target, e);
                        return Err(());
                    }
                    self.notify_file_changed(&node.target);
                    return Ok(());
                }
            }
        }

        if !self.ensure_parent_dir(&node.target) {
            return Err(());
        }

        let preprocessed = match cmds.preprocess {
            Some(pp) => {
                tracing::info!(target: "odb::run", "Preprocessing {}", node.source.display());
                match (pp.run)() {
                    Ok(text) => Some(text),
                    Err(e) => {
                        self.record_driver_error(&node.target, e);
                        return Err(());
                    }
                }
            }
            None => None,
        };

        tracing::info!(target: "odb::run", "Compiling {}", node.source.display());
        if let Err(e) = (cmds.compile.run)() {
            self.record_driver_error(&node.target, e);
            return Err(());
        }
        if !odb_core::fs::is_file(&node.target) {
            self.raise_error(Diagnostic::new(
                BuildError::OutputMissing { target: node.target.clone() },
                Some(node.target.clone()),
            ));
            return Err(());
        }

        let scanned = (cmds.scan)(preprocessed.as_deref());
        tracing::debug!(target: "odb::scan", path = %node.target.display(), count = scanned.len(), "scanned dependencies");

        if let Err(e) = self.store_local_scan(&node.target, &cmds.compile.args, &scanned) {
            self.record_db_error(&node.target, e);
            return Err(());
        }
        self.notify_file_changed(&node.target);

        if cmds.can_cache {
            if let Some(cache) = object_cache(&node.settings) {
                self.insert_into_object_cache(&cache, &node.target, &cmds.compile.args, &scanned);
            }
        }

        Ok(())
    }

    fn run_link_step(&self, target: &Path, cmds: odb_driver::LinkCommands, verb: &str) -> TaskResult {
        if self.is_cancelled() {
            return Err(());
        }
        let (_, reason) = self.depdb().check_dependency_info(target, &cmds.command.args, self.options().force_build);
        let Some(reason) = reason else {
            return Ok(());
        };
        self.log_reason(target, &reason);

        if !self.ensure_parent_dir(target) {
            return Err(());
        }

        tracing::info!(target: "odb::run", "{verb} {}", target.display());
        if let Err(e) = (cmds.command.run)() {
            self.record_driver_error(target, e);
            return Err(());
        }
        if !odb_core::fs::is_file(target) {
            self.raise_error(Diagnostic::new(
                BuildError::OutputMissing { target: target.to_path_buf() },
                Some(target.to_path_buf()),
            ));
            return Err(());
        }

        let scanned = (cmds.scan)();
        if let Err(e) = self.store_local_scan(target, &cmds.command.args, &scanned) {
            self.record_db_error(target, e);
            return Err(());
        }
        self.notify_file_changed(target);
        Ok(())
    }

    pub(crate) fn run_library_step(&self, node: &LibraryNode, object_targets: &[PathBuf]) -> TaskResult {
        if self.is_cancelled() {
            return Err(());
        }
        let cmds = self.plugin().get_library_command(&node.target, object_targets, &node.settings);
        let result = self.run_link_step(&node.target, cmds, "Archiving");
        if result.is_ok() {
            self.library_objects().lock().insert(node.target.clone(), object_targets.to_vec());
        }
        result
    }

    pub(crate) fn run_module_step(&self, node: &ModuleNode, object_targets: &[PathBuf]) -> TaskResult {
        if self.is_cancelled() {
            return Err(());
        }
        let cmds = {
            let library_objects = self.library_objects().lock();
            self.plugin().get_module_commands(&node.target, object_targets, &node.settings, &library_objects)
        };
        self.run_link_step(&node.target, cmds, "Linking")
    }

    pub(crate) fn run_program_step(&self, node: &ProgramNode, object_targets: &[PathBuf]) -> TaskResult {
        if self.is_cancelled() {
            return Err(());
        }
        let cmds = {
            let library_objects = self.library_objects().lock();
            self.plugin().get_program_commands(&node.target, object_targets, &node.settings, &library_objects)
        };
        self.run_link_step(&node.target, cmds, "Linking")
    }

    pub(crate) fn run_module_copy_step(&self, node: &ModuleCopyNode) -> TaskResult {
        if self.is_cancelled() {
            return Err(());
        }
        let plan = odb_driver::module_copy_plan(&node.modules, &node.dir);
        for step in plan {
            if !odb_driver::module_copy_needed(&step) {
                continue;
            }
            tracing::info!(target: "odb::run", "Copying {}", step.source.display());
            if let Err(e) = odb_driver::copy_module(&step) {
                self.record_driver_error(&step.target, e);
                return Err(());
            }
            self.notify_file_changed(&step.target);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "steps_tests.rs"]
mod tests;
