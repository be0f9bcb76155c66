// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use odb_core::CompilerSettings;

#[test]
fn scan_linemarkers_collects_distinct_real_paths() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = dir.path().join("a.c");
    let header = dir.path().join("stdio.h");
    std::fs::write(&source, "").expect("write a.c");
    std::fs::write(&header, "").expect("write stdio.h");

    let preprocessed = format!(
        "# 1 \"{source}\"\n# 1 \"<built-in>\"\n# 1 \"<command-line>\"\n# 1 \"{header}\" 1 3 4\nint main(void) {{}}\n# 5 \"{source}\"\n",
        source = source.display(),
        header = header.display(),
    );

    let mut found = scan_linemarkers(&preprocessed);
    found.sort();
    let mut expected = vec![source, header];
    expected.sort();
    assert_eq!(found, expected);
}

#[test]
fn scan_linemarkers_ignores_angle_bracketed_pseudo_files() {
    let preprocessed = "# 1 \"<built-in>\"\n# 1 \"<command-line>\"\n";
    assert!(scan_linemarkers(preprocessed).is_empty());
}

#[test]
fn scan_linemarkers_drops_paths_the_filesystem_no_longer_has() {
    let preprocessed = "# 1 \"/definitely/missing/header.h\"\n";
    assert!(scan_linemarkers(preprocessed).is_empty());
}

#[test]
fn language_flag_infers_from_extension_when_unset() {
    assert_eq!(language_flag(None, Path::new("a.c")), Some("c"));
    assert_eq!(language_flag(None, Path::new("a.cpp")), Some("c++"));
    assert_eq!(language_flag(None, Path::new("a.unknown")), None);
}

#[test]
fn common_compile_args_reflects_optimization_and_debug_flags() {
    let settings = CompilerSettings::default().debug_symbols(true).optimization(OptimizationLevel::Full);
    let args = common_compile_args(&settings, Path::new("a.c"));
    assert!(args.contains(&"-g".to_string()));
    assert!(args.contains(&"-O4".to_string()));
    assert!(args.contains(&"-fno-exceptions".to_string()) || args.contains(&"-fexceptions".to_string()));
}

#[test]
fn object_commands_carry_a_preprocess_step_and_a_scan() {
    let plugin = GccPlugin::default();
    let settings = CompilerSettings::default();
    let commands = plugin.get_object_commands(Path::new("a.o"), Path::new("a.c"), None, &settings);
    assert!(commands.preprocess.is_some());
    assert!(commands.can_cache);
}

#[test]
fn object_commands_fingerprint_and_scan_include_the_compiler_executable() {
    let plugin = GccPlugin::default();
    let settings = CompilerSettings::default();
    let commands = plugin.get_object_commands(Path::new("a.o"), Path::new("a.c"), None, &settings);

    assert!(commands.compile.args.0.contains(&"gcc".to_string()));
    assert!(commands.preprocess.expect("preprocess command").args.0.contains(&"gcc".to_string()));

    let scanned = (commands.scan)(Some(""));
    assert_eq!(scanned, vec![PathBuf::from("gcc")], "compiler executable must be an unconditional dependency");
}

#[test]
fn library_command_uses_ar_archive_flags() {
    let plugin = GccPlugin::default();
    let settings = CompilerSettings::default();
    let commands = plugin.get_library_command(
        Path::new("libfoo.a"),
        &[PathBuf::from("a.o"), PathBuf::from("b.o")],
        &settings,
    );
    assert!(commands.command.args.0.contains(&"-rcPs".to_string()));
}

#[test]
fn program_command_passes_shared_flag_only_for_modules() {
    let plugin = GccPlugin::default();
    let settings = CompilerSettings::default();
    let no_library_objects = odb_core::LibraryObjectsMap::new();
    let program = plugin.get_program_commands(
        Path::new("app"),
        &[PathBuf::from("a.o")],
        &settings,
        &no_library_objects,
    );
    assert!(!program.command.args.0.contains(&"-shared".to_string()));

    let module = plugin.get_module_commands(
        Path::new("mod.so"),
        &[PathBuf::from("a.o")],
        &settings,
        &no_library_objects,
    );
    assert!(module.command.args.0.contains(&"-shared".to_string()));
}

#[test]
fn link_objects_in_library_expands_known_library_to_its_objects() {
    let plugin = GccPlugin::default();
    let settings = CompilerSettings::default()
        .add_library("ab")
        .link_objects_in_library(true);
    let mut library_objects = odb_core::LibraryObjectsMap::new();
    library_objects.insert(PathBuf::from("libab.a"), vec![PathBuf::from("a.o"), PathBuf::from("b.o")]);

    // `resolve_libraries` only finds real files on disk; exercise the
    // expansion function directly against a library it already resolved to,
    // since `libab.a` does not exist in this test's filesystem.
    let expanded = crate::library::expand_link_objects(&[PathBuf::from("libab.a")], &library_objects);
    assert_eq!(expanded, vec![PathBuf::from("a.o"), PathBuf::from("b.o")]);

    let program = plugin.get_program_commands(
        Path::new("app"),
        &[PathBuf::from("main.o")],
        &settings,
        &library_objects,
    );
    // `ab` doesn't resolve to a file on this test's filesystem, so it's
    // passed through as `-lab`; the expansion path is covered above and in
    // odb-engine's library-step integration tests where the object actually
    // exists on disk.
    assert!(program.command.args.0.contains(&"-lab".to_string()));
}
