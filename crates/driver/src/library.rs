// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Library name resolution (spec §4.5, Open Question #1).
//!
//! Resolution order is reverse-declaration: libraries added later override
//! earlier ones with the same resolved name, mirroring a linker command
//! line where the last `-l` wins a name collision. For each library name,
//! in order:
//!
//! 1. if the name is itself a path that exists, use it as-is;
//! 2. otherwise try `<prefix><name><suffix>` for every configured
//!    `(prefix, suffix)` pair, searched across every configured library
//!    path plus the empty path (the name may already be a full relative
//!    path with its own directory component);
//! 3. first candidate that exists on disk wins.
//!
//! A name with no surviving candidate resolves to [`ResolvedLibrary::Unresolved`]
//! rather than failing outright — the driver surfaces it as a diagnostic
//! at link time so one bad entry doesn't stop the whole scan.

use std::path::{Path, PathBuf};

use odb_core::LibraryObjectsMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedLibrary {
    Found(PathBuf),
    Unresolved(String),
}

/// Resolves `libraries` against `library_paths` using the prefix/suffix
/// pairs configured for this toolchain (e.g. `("lib", ".a")` on Unix).
/// Libraries are resolved in reverse declaration order — last-added name
/// is searched first among duplicates — then returned back in that same
/// reverse order, matching how `CompilerSettings::add_library` accumulates
/// a linker-line-like list where later entries are expected to take
/// precedence.
pub fn resolve_libraries(
    libraries: &[String],
    library_paths: &[PathBuf],
    prefix_suffixes: &[(String, String)],
) -> Vec<ResolvedLibrary> {
    let mut out = Vec::with_capacity(libraries.len());
    for name in libraries.iter().rev() {
        out.push(resolve_one(name, library_paths, prefix_suffixes));
    }
    out
}

fn resolve_one(
    name: &str,
    library_paths: &[PathBuf],
    prefix_suffixes: &[(String, String)],
) -> ResolvedLibrary {
    let as_path = Path::new(name);
    if as_path.is_file() {
        return ResolvedLibrary::Found(as_path.to_path_buf());
    }

    let mut candidates: Vec<String> = vec![name.to_string()];
    for (prefix, suffix) in prefix_suffixes {
        candidates.push(format!("{prefix}{name}{suffix}"));
    }

    let mut search_dirs: Vec<&Path> = library_paths.iter().rev().map(PathBuf::as_path).collect();
    search_dirs.push(Path::new(""));

    for dir in &search_dirs {
        for candidate in &candidates {
            let full = if dir.as_os_str().is_empty() {
                PathBuf::from(candidate)
            } else {
                dir.join(candidate)
            };
            if full.is_file() {
                return ResolvedLibrary::Found(full);
            }
        }
    }

    ResolvedLibrary::Unresolved(name.to_string())
}

/// `linkObjectsInLibrary` expansion: a library named as a link input whose
/// objects are registered in `map` is replaced by those objects directly,
/// so the link step sees them as if they'd been compiled straight into
/// the dependent target. Libraries with no entry in `map` pass through
/// unchanged.
pub fn expand_link_objects(inputs: &[PathBuf], map: &LibraryObjectsMap) -> Vec<PathBuf> {
    let mut out = Vec::with_capacity(inputs.len());
    for input in inputs {
        match map.get(input) {
            Some(objects) => out.extend(objects.iter().cloned()),
            None => out.push(input.clone()),
        }
    }
    out
}

#[cfg(test)]
#[path = "library_tests.rs"]
mod tests;
