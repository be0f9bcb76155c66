// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared data model: file/dependency records and the compiler settings
//! snapshot. See spec §3.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// A file the build cares about: its path, and (when known) the mtime and
/// content digest it had at the time this record was captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<Digest>,
}

impl FileInfo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), timestamp_ms: None, digest: None }
    }

    pub fn with_timestamp(mut self, ms: u64) -> Self {
        self.timestamp_ms = Some(ms);
        self
    }

    pub fn with_digest(mut self, digest: Digest) -> Self {
        self.digest = Some(digest);
        self
    }

    /// Captures path + current mtime + (optionally) current digest from disk.
    pub fn capture(path: &Path, with_digest: Option<&crate::digest::DigestCache>) -> Self {
        let mut info = FileInfo::new(path.to_path_buf());
        if let Some(ms) = crate::fs::mtime_ms(path) {
            info.timestamp_ms = Some(ms);
        }
        if let Some(cache) = with_digest {
            info.digest = cache.digest(path);
        }
        info
    }
}

/// Opaque command-signature fingerprint. Two build steps with equal
/// fingerprints are considered to issue equivalent commands for
/// dependency-staleness purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgsFingerprint(pub Vec<String>);

impl ArgsFingerprint {
    pub fn new(parts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Digest of the fingerprint's parts, used when folding the fingerprint
    /// into the object cache's object-identity digest (spec §4.4).
    pub fn digest(&self) -> Digest {
        let joined = self.0.join("\u{1}");
        Digest::of_bytes(joined.as_bytes())
    }
}

impl std::fmt::Display for ArgsFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

/// The current on-disk dependency-record format version.
///
/// Bumping this is a breaking change: records written under an older (or
/// newer, or unrecognized) version are treated as `Missing` rather than
/// parsed (spec §4.3, §6).
pub const DEPENDENCY_INFO_VERSION: u32 = 1;

/// Persisted per-target record of what produced it and what it depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyInfo {
    #[serde(default = "default_version")]
    pub version: u32,
    pub targets: Vec<FileInfo>,
    pub args: ArgsFingerprint,
    pub dependencies: Vec<FileInfo>,
}

fn default_version() -> u32 {
    DEPENDENCY_INFO_VERSION
}

impl DependencyInfo {
    pub fn new(targets: Vec<FileInfo>, args: ArgsFingerprint, dependencies: Vec<FileInfo>) -> Self {
        Self { version: DEPENDENCY_INFO_VERSION, targets, args, dependencies }
    }

    /// Serialize to the versioned, self-describing on-disk format (JSON).
    pub fn to_bytes(&self) -> Vec<u8> {
        // A DependencyInfo is always representable as JSON; this can't fail.
        serde_json::to_vec_pretty(self).unwrap_or_default()
    }

    /// Deserialize from the on-disk format. Returns `None` (meaning
    /// "missing") on any parse error or unrecognized version, per spec §6.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let info: DependencyInfo = serde_json::from_slice(bytes).ok()?;
        if info.version != DEPENDENCY_INFO_VERSION {
            return None;
        }
        Some(info)
    }

    /// The object-identity digest: `H(argsFingerprint || sorted (path, digest) pairs)`.
    /// Dependencies lacking a digest are excluded (see spec §4.4 step 2: if a
    /// dependency's digest can't be computed, the candidate is skipped
    /// upstream before this is ever called on it for cache purposes).
    pub fn object_identity_digest(&self) -> Digest {
        let mut pairs: Vec<(String, String)> = self
            .dependencies
            .iter()
            .map(|d| {
                let digest_hex = d.digest.map(|dg| dg.to_hex()).unwrap_or_default();
                (d.path.to_string_lossy().into_owned(), digest_hex)
            })
            .collect();
        pairs.sort();

        let mut buf = self.args.digest().to_hex();
        for (path, digest) in pairs {
            buf.push('\u{1}');
            buf.push_str(&path);
            buf.push('\u{1}');
            buf.push_str(&digest);
        }
        Digest::of_bytes(buf.as_bytes())
    }

    /// The dependency-set digest: `H(dependency paths concatenated)`, used as
    /// the index-entry filename inside a target's cache directory.
    pub fn dependency_set_digest(&self) -> Digest {
        let mut buf = String::new();
        for d in &self.dependencies {
            buf.push_str(&d.path.to_string_lossy());
            buf.push('\u{1}');
        }
        Digest::of_bytes(buf.as_bytes())
    }
}

/// Optimization level requested of the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationLevel {
    None,
    Partial,
    Full,
}

crate::simple_display! {
    OptimizationLevel {
        None => "none",
        Partial => "partial",
        Full => "full",
    }
}

/// Source language override. `None` means "infer from the source extension".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    C,
    Cpp,
    ObjectiveC,
}

crate::simple_display! {
    Language {
        C => "c",
        Cpp => "c++",
        ObjectiveC => "objective-c",
    }
}

/// Immutable snapshot of compiler settings. A build step takes a `clone()`
/// of the settings at the moment it's requested; later mutations to the
/// caller's settings object never affect in-flight work (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilerSettings {
    pub debug_symbols: bool,
    pub optimization: OptimizationLevel,
    pub warning_level: Option<u32>,
    pub warnings_as_errors: bool,
    pub enable_rtti: bool,
    pub enable_exceptions: bool,
    pub use_sse: bool,

    pub include_paths: Vec<PathBuf>,
    pub defines: Vec<String>,
    pub forced_includes: Vec<PathBuf>,

    pub library_paths: Vec<PathBuf>,
    pub libraries: Vec<String>,
    pub library_scripts: Vec<PathBuf>,

    pub modules: Vec<String>,
    pub module_scripts: Vec<PathBuf>,

    pub object_cache_path: Option<PathBuf>,
    pub object_cache_workspace_root: Option<PathBuf>,
    pub workspace_root: PathBuf,

    pub language: Option<Language>,

    pub pch_suffix: String,
    pub object_suffix: String,
    pub library_prefix_suffixes: Vec<(String, String)>,
    pub module_suffix: String,
    pub program_suffix: String,

    pub link_objects_in_library: bool,
    pub function_level_linking: bool,
    pub stack_size: Option<u64>,
    pub heap_size: Option<u64>,
    pub linker_script: Option<PathBuf>,
    pub subsystem: Option<String>,
    pub import_library: Option<PathBuf>,
    pub embed_manifest: bool,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            debug_symbols: false,
            optimization: OptimizationLevel::None,
            warning_level: None,
            warnings_as_errors: false,
            enable_rtti: true,
            enable_exceptions: true,
            use_sse: false,
            include_paths: Vec::new(),
            defines: Vec::new(),
            forced_includes: Vec::new(),
            library_paths: Vec::new(),
            libraries: Vec::new(),
            library_scripts: Vec::new(),
            modules: Vec::new(),
            module_scripts: Vec::new(),
            object_cache_path: None,
            object_cache_workspace_root: None,
            workspace_root: PathBuf::new(),
            language: None,
            pch_suffix: ".pch".to_string(),
            object_suffix: ".o".to_string(),
            library_prefix_suffixes: vec![("lib".to_string(), ".a".to_string())],
            module_suffix: ".so".to_string(),
            program_suffix: String::new(),
            link_objects_in_library: false,
            function_level_linking: false,
            stack_size: None,
            heap_size: None,
            linker_script: None,
            subsystem: None,
            import_library: None,
            embed_manifest: false,
        }
    }
}

impl CompilerSettings {
    crate::setters! {
        set { debug_symbols: bool }
        set { optimization: OptimizationLevel }
        option { warning_level: u32 }
        set { warnings_as_errors: bool }
        set { enable_rtti: bool }
        set { enable_exceptions: bool }
        set { use_sse: bool }
        option { object_cache_path: PathBuf }
        option { object_cache_workspace_root: PathBuf }
        into { workspace_root: PathBuf }
        option { language: Language }
        set { link_objects_in_library: bool }
        set { function_level_linking: bool }
        option { stack_size: u64 }
        option { heap_size: u64 }
        option { linker_script: PathBuf }
        option { subsystem: String }
        option { import_library: PathBuf }
        set { embed_manifest: bool }
    }

    pub fn add_include_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_paths.push(path.into());
        self
    }

    pub fn add_define(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        let name = name.into();
        self.defines.push(match value {
            Some(v) => format!("{name}={v}"),
            None => name,
        });
        self
    }

    pub fn add_forced_include(mut self, path: impl Into<PathBuf>) -> Self {
        self.forced_includes.push(path.into());
        self
    }

    pub fn add_library(mut self, name: impl Into<String>) -> Self {
        self.libraries.push(name.into());
        self
    }

    pub fn add_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_paths.push(path.into());
        self
    }

    pub fn add_library_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_scripts.push(path.into());
        self
    }

    pub fn add_module(mut self, name: impl Into<String>) -> Self {
        self.modules.push(name.into());
        self
    }

    pub fn add_module_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.module_scripts.push(path.into());
        self
    }
}

/// A precompiled header build result: the header's own path, the header
/// name consumers `#include`, an optional companion object file some
/// toolchains require at link time, and the id of the task producing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PchTarget {
    pub path: PathBuf,
    pub header: String,
    pub object: Option<PathBuf>,
    pub task: crate::id::TaskId,
}

/// A plain file build result: the produced path and the id of the task
/// producing it (which may already be complete).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTarget {
    pub path: PathBuf,
    pub task: crate::id::TaskId,
}

impl FileTarget {
    pub fn new(path: impl Into<PathBuf>, task: crate::id::TaskId) -> Self {
        Self { path: path.into(), task }
    }
}

/// Process-global (engine-scoped) map from a built library's path to the
/// ordered object paths that populated it. Supports "link objects instead
/// of library" mode at link time (spec §3). Owned by the `Engine`, not a
/// weak map keyed by engine identity — see DESIGN.md.
pub type LibraryObjectsMap = HashMap<PathBuf, Vec<PathBuf>>;

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
