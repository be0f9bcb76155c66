// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GCC/Clang-family [`CompilerPlugin`].
//!
//! Argument construction and the dependency scan follow the GCC driver
//! conventions: `-E` to preprocess to text carrying `# <line> "<path>"`
//! linemarkers, `-MD`-style dependency discovery replaced here by scanning
//! those linemarkers directly (so the scan works identically whether or
//! not a separate preprocess step ran), `ar -rcPs` to archive, and `-shared`
//! to link a dynamic module.

use std::path::{Path, PathBuf};
use std::process::Command as ProcessCommand;
use std::sync::OnceLock;

use odb_core::{ArgsFingerprint, CompilerSettings, Language, LibraryObjectsMap, OptimizationLevel, PchTarget};

use crate::{Command, CompilerPlugin, DriverError, LinkCommands, ObjectCommands, PchCommands};

fn linemarker_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r#"^# [0-9]+ "(?P<path>[^<][^"]*)""#).expect("valid regex"))
}

/// Scans preprocessed GCC output for the linemarkers it emits for every
/// file it entered while expanding includes, returning the distinct set
/// of paths read (other than the angle-bracketed synthetic markers GCC
/// uses for its own builtin pseudo-files). Paths the filesystem no longer
/// reports as a file (removed between preprocessing and the scan, or a
/// synthetic marker GCC emits for a non-file) are dropped rather than
/// recorded as a dependency.
pub fn scan_linemarkers(preprocessed: &str) -> Vec<PathBuf> {
    let mut seen = std::collections::BTreeSet::new();
    for line in preprocessed.lines() {
        if !line.starts_with("# ") {
            continue;
        }
        if let Some(caps) = linemarker_regex().captures(line) {
            if let Some(m) = caps.name("path") {
                seen.insert(PathBuf::from(m.as_str()));
            }
        }
    }
    seen.into_iter()
        .filter(|path| {
            let exists = odb_core::fs::is_file(path);
            if !exists {
                tracing::debug!(target: "odb::scan", path = %path.display(), "ignoring missing include");
            }
            exists
        })
        .collect()
}

fn language_flag(language: Option<Language>, source: &Path) -> Option<&'static str> {
    match language {
        Some(Language::C) => Some("c"),
        Some(Language::Cpp) => Some("c++"),
        Some(Language::ObjectiveC) => Some("objective-c"),
        None => match source.extension().and_then(|e| e.to_str()) {
            Some("c") => Some("c"),
            Some("cc") | Some("cpp") | Some("cxx") => Some("c++"),
            Some("m") => Some("objective-c"),
            _ => None,
        },
    }
}

fn common_compile_args(settings: &CompilerSettings, source: &Path) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(lang) = language_flag(settings.language, source) {
        args.push("-x".to_string());
        args.push(lang.to_string());
    }
    if settings.debug_symbols {
        args.push("-g".to_string());
    }
    args.push(
        match settings.optimization {
            OptimizationLevel::None => "-O0",
            OptimizationLevel::Partial => "-O2",
            OptimizationLevel::Full => "-O4",
        }
        .to_string(),
    );
    if let Some(level) = settings.warning_level {
        args.push(format!("-W{level}"));
    }
    if settings.warnings_as_errors {
        args.push("-Werror".to_string());
    }
    args.push(if settings.enable_rtti { "-frtti" } else { "-fno-rtti" }.to_string());
    args.push(if settings.enable_exceptions { "-fexceptions" } else { "-fno-exceptions" }.to_string());
    if settings.use_sse {
        args.push("-msse".to_string());
    }
    if settings.function_level_linking {
        args.push("-ffunction-sections".to_string());
    }
    // include/define/forced-include order matches the reverse-accumulation
    // convention used by library resolution: last-added wins precedence on
    // the compiler's own left-to-right scan, so push in declared order.
    for include in &settings.include_paths {
        args.push(format!("-I{}", include.display()));
    }
    for define in &settings.defines {
        args.push(format!("-D{define}"));
    }
    for forced in &settings.forced_includes {
        args.push("-include".to_string());
        args.push(forced.display().to_string());
    }
    args
}

pub struct GccPlugin {
    pub cc: String,
    pub ar: String,
}

impl Default for GccPlugin {
    fn default() -> Self {
        Self { cc: "gcc".to_string(), ar: "ar".to_string() }
    }
}

fn run_compiler(args: Vec<String>, env: Vec<(String, String)>, program: String) -> Result<(), DriverError> {
    tracing::debug!(program = %program, args = ?args, "spawning compiler");
    let output = ProcessCommand::new(&program)
        .args(&args)
        .envs(env)
        .output()
        .map_err(|source| DriverError::Spawn { program: program.clone(), source })?;
    if !output.status.success() {
        return Err(DriverError::CommandFailed {
            program,
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

fn run_preprocessor(args: Vec<String>, env: Vec<(String, String)>, program: String) -> Result<String, DriverError> {
    tracing::debug!(program = %program, args = ?args, "spawning preprocessor");
    let output = ProcessCommand::new(&program)
        .args(&args)
        .envs(env)
        .output()
        .map_err(|source| DriverError::Spawn { program: program.clone(), source })?;
    if !output.status.success() {
        return Err(DriverError::CommandFailed {
            program,
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

impl CompilerPlugin for GccPlugin {
    fn get_pch_commands(
        &self,
        target: &Path,
        source: &Path,
        _header: &str,
        _object: Option<&Path>,
        settings: &CompilerSettings,
    ) -> PchCommands {
        let mut args = common_compile_args(settings, source);
        args.push("-x".to_string());
        args.push(match language_flag(settings.language, source) {
            Some("c++") => "c++-header".to_string(),
            _ => "c-header".to_string(),
        });
        args.push("-c".to_string());
        args.push(source.display().to_string());
        args.push("-o".to_string());
        args.push(target.display().to_string());

        let fingerprint = ArgsFingerprint::new(args.iter().cloned());
        let cc = self.cc.clone();
        let env = crate::subprocess_env();

        PchCommands {
            compile: Command {
                args: fingerprint,
                run: Box::new(move || run_compiler(args, env, cc)),
            },
            can_cache: true,
        }
    }

    fn get_object_commands(
        &self,
        target: &Path,
        source: &Path,
        pch: Option<&PchTarget>,
        settings: &CompilerSettings,
    ) -> ObjectCommands {
        let mut compile_args = common_compile_args(settings, source);
        if let Some(pch) = pch {
            compile_args.push("-include".to_string());
            compile_args.push(pch.header.clone());
        }
        compile_args.push("-c".to_string());
        compile_args.push(source.display().to_string());
        compile_args.push("-o".to_string());
        compile_args.push(target.display().to_string());

        let mut preprocess_args = common_compile_args(settings, source);
        preprocess_args.push("-E".to_string());
        preprocess_args.push(source.display().to_string());

        let compile_fingerprint =
            ArgsFingerprint::new(std::iter::once(self.cc.clone()).chain(compile_args.iter().cloned()));
        let preprocess_fingerprint =
            ArgsFingerprint::new(std::iter::once(self.cc.clone()).chain(preprocess_args.iter().cloned()));
        let cc_compile = self.cc.clone();
        let cc_pre = self.cc.clone();
        let cc_scan = self.cc.clone();
        let compile_env = crate::subprocess_env();
        let preprocess_env = crate::subprocess_env();

        ObjectCommands {
            preprocess: Some(Command {
                args: preprocess_fingerprint,
                run: Box::new(move || run_preprocessor(preprocess_args, preprocess_env, cc_pre)),
            }),
            compile: Command {
                args: compile_fingerprint,
                run: Box::new(move || run_compiler(compile_args, compile_env, cc_compile)),
            },
            scan: Box::new(move |preprocessed: Option<&str>| {
                let mut deps = vec![PathBuf::from(&cc_scan)];
                if let Some(text) = preprocessed {
                    deps.extend(scan_linemarkers(text));
                }
                deps
            }),
            can_cache: true,
        }
    }

    fn get_library_command(&self, target: &Path, sources: &[PathBuf], _settings: &CompilerSettings) -> LinkCommands {
        let mut args = vec!["-rcPs".to_string(), target.display().to_string()];
        args.extend(sources.iter().map(|s| s.display().to_string()));
        let fingerprint = ArgsFingerprint::new(args.iter().cloned());
        let ar = self.ar.clone();
        let env = crate::subprocess_env();
        let sources = sources.to_vec();

        LinkCommands {
            command: Command {
                args: fingerprint,
                run: Box::new(move || run_compiler(args, env, ar)),
            },
            scan: Box::new(move || sources),
        }
    }

    fn get_module_commands(
        &self,
        target: &Path,
        sources: &[PathBuf],
        settings: &CompilerSettings,
        library_objects: &LibraryObjectsMap,
    ) -> LinkCommands {
        self.get_linked_binary(target, sources, settings, library_objects, true)
    }

    fn get_program_commands(
        &self,
        target: &Path,
        sources: &[PathBuf],
        settings: &CompilerSettings,
        library_objects: &LibraryObjectsMap,
    ) -> LinkCommands {
        self.get_linked_binary(target, sources, settings, library_objects, false)
    }
}

impl GccPlugin {
    fn get_linked_binary(
        &self,
        target: &Path,
        sources: &[PathBuf],
        settings: &CompilerSettings,
        library_objects: &LibraryObjectsMap,
        shared: bool,
    ) -> LinkCommands {
        let resolved =
            crate::library::resolve_libraries(&settings.libraries, &settings.library_paths, &settings.library_prefix_suffixes);

        let mut args = Vec::new();
        if shared {
            args.push("-shared".to_string());
        }
        if settings.debug_symbols {
            args.push("-g".to_string());
        }
        for path in &settings.library_paths {
            args.push(format!("-L{}", path.display()));
        }
        args.push("-o".to_string());
        args.push(target.display().to_string());
        args.extend(sources.iter().map(|s| s.display().to_string()));

        // `linkObjectsInLibrary`: a resolved library with a known object
        // set is expanded to those objects directly, rather than linked as
        // an archive (spec §3 LibraryObjectsMap, §4.5).
        let resolved_as_paths: Vec<PathBuf> = resolved
            .iter()
            .filter_map(|lib| match lib {
                crate::library::ResolvedLibrary::Found(path) => Some(path.clone()),
                crate::library::ResolvedLibrary::Unresolved(_) => None,
            })
            .collect();
        let expanded = if settings.link_objects_in_library {
            crate::library::expand_link_objects(&resolved_as_paths, library_objects)
        } else {
            resolved_as_paths.clone()
        };
        let unresolved_names: Vec<&String> = resolved
            .iter()
            .filter_map(|lib| match lib {
                crate::library::ResolvedLibrary::Unresolved(name) => Some(name),
                crate::library::ResolvedLibrary::Found(_) => None,
            })
            .collect();

        for path in &expanded {
            args.push(path.display().to_string());
        }
        for name in &unresolved_names {
            args.push(format!("-l{name}"));
        }

        if let Some(script) = &settings.linker_script {
            args.push("-T".to_string());
            args.push(script.display().to_string());
        }

        let fingerprint = ArgsFingerprint::new(args.iter().cloned());
        let cc = self.cc.clone();
        let env = crate::subprocess_env();
        let sources = sources.to_vec();
        let resolved_paths = expanded;

        LinkCommands {
            command: Command {
                args: fingerprint,
                run: Box::new(move || run_compiler(args, env, cc)),
            },
            scan: Box::new(move || {
                let mut scanned = sources;
                scanned.extend(resolved_paths);
                scanned
            }),
        }
    }
}

#[cfg(test)]
#[path = "gcc_tests.rs"]
mod tests;
