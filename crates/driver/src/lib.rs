// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Compiler driver pipeline: the per-toolchain plugin contract, the
//! library resolver, and PCH/module helpers that don't depend on any
//! particular toolchain.

pub mod gcc;
pub mod library;

use std::path::{Path, PathBuf};

use odb_core::{ArgsFingerprint, CompilerSettings, LibraryObjectsMap, PchTarget};
use thiserror::Error;

pub use library::{expand_link_objects, resolve_libraries, ResolvedLibrary};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program}: exited with status {status}\n{stderr}")]
    CommandFailed { program: String, status: i32, stderr: String },
    #[error(transparent)]
    Fs(#[from] odb_core::FsError),
}

/// A single unit of external work: its argv-equivalent fingerprint (which
/// participates in the dependency record) and the closure that performs
/// it. Generic over the value the closure hands back (`()` for a plain
/// compile/archive/link, `String` for a preprocess step whose output text
/// feeds the dependency scan).
pub struct Command<T> {
    pub args: ArgsFingerprint,
    pub run: Box<dyn FnOnce() -> Result<T, DriverError> + Send>,
}

/// Commands for building a precompiled header.
pub struct PchCommands {
    pub compile: Command<()>,
    pub can_cache: bool,
}

/// Commands for building a single object file. `scan` is handed the
/// preprocessed text (when a `preprocess` step ran) and returns the files
/// that step actually read.
pub struct ObjectCommands {
    pub preprocess: Option<Command<String>>,
    pub compile: Command<()>,
    pub scan: Box<dyn FnOnce(Option<&str>) -> Vec<PathBuf> + Send>,
    pub can_cache: bool,
}

/// Commands shared by archive/module/program steps: one linking command
/// plus a scan for its inputs.
pub struct LinkCommands {
    pub command: Command<()>,
    pub scan: Box<dyn FnOnce() -> Vec<PathBuf> + Send>,
}

/// One plugin per toolchain. Every method takes an immutable snapshot of
/// [`CompilerSettings`] — the caller is responsible for cloning before a
/// build step so later mutation never affects in-flight work.
pub trait CompilerPlugin: Send + Sync {
    fn get_pch_commands(
        &self,
        target: &Path,
        source: &Path,
        header: &str,
        object: Option<&Path>,
        settings: &CompilerSettings,
    ) -> PchCommands;

    fn get_object_commands(
        &self,
        target: &Path,
        source: &Path,
        pch: Option<&PchTarget>,
        settings: &CompilerSettings,
    ) -> ObjectCommands;

    fn get_library_command(
        &self,
        target: &Path,
        sources: &[PathBuf],
        settings: &CompilerSettings,
    ) -> LinkCommands;

    fn get_module_commands(
        &self,
        target: &Path,
        sources: &[PathBuf],
        settings: &CompilerSettings,
        library_objects: &LibraryObjectsMap,
    ) -> LinkCommands;

    fn get_program_commands(
        &self,
        target: &Path,
        sources: &[PathBuf],
        settings: &CompilerSettings,
        library_objects: &LibraryObjectsMap,
    ) -> LinkCommands;
}

/// One step of a module copy plan: copy `source` to `target` if `target`
/// is missing or older than `source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleCopyStep {
    pub source: PathBuf,
    pub target: PathBuf,
}

/// `copyModulesTo`: one step per configured module, into `dir`.
pub fn module_copy_plan(modules: &[PathBuf], dir: &Path) -> Vec<ModuleCopyStep> {
    modules
        .iter()
        .filter_map(|source| {
            let name = source.file_name()?;
            Some(ModuleCopyStep { source: source.clone(), target: dir.join(name) })
        })
        .collect()
}

pub fn module_copy_needed(step: &ModuleCopyStep) -> bool {
    let source_mtime = match odb_core::fs::mtime_ms(&step.source) {
        Some(ms) => ms,
        None => return false,
    };
    match odb_core::fs::mtime_ms(&step.target) {
        Some(target_mtime) => source_mtime > target_mtime,
        None => true,
    }
}

pub fn copy_module(step: &ModuleCopyStep) -> Result<(), DriverError> {
    let bytes = std::fs::read(&step.source)
        .map_err(|source| odb_core::FsError::Io { path: step.source.clone(), source })?;
    odb_core::fs::atomic_write(&step.target, &bytes)?;
    Ok(())
}

/// Sanitized environment propagated to every compiler subprocess (spec
/// §6): a temp directory, `SYSTEMROOT` on Windows, `PATHEXT`, and `PATH`.
/// Everything else is elided for reproducibility.
pub fn subprocess_env() -> Vec<(String, String)> {
    let mut env = Vec::new();
    let temp = std::env::var("TMP")
        .or_else(|_| std::env::var("TEMP"))
        .unwrap_or_else(|_| std::env::temp_dir().to_string_lossy().into_owned());
    env.push(("TMP".to_string(), temp.clone()));
    env.push(("TEMP".to_string(), temp));
    env.push(("PATHEXT".to_string(), ".com;.exe;.bat;.cmd".to_string()));

    if let Ok(system_root) = std::env::var("SYSTEMROOT") {
        env.push(("SYSTEMROOT".to_string(), system_root));
    }

    let path = std::env::var("PATH").unwrap_or_default();
    env.push(("PATH".to_string(), path));

    env
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
