// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use odb_core::{ArgsFingerprint, CompilerSettings, FsError, LibraryObjectsMap, PchTarget};
use odb_driver::{Command, CompilerPlugin, DriverError, LinkCommands, ObjectCommands, PchCommands};
use tempfile::tempdir;

use super::*;
use crate::build_graph::{LibraryNode, ModuleCopyNode, ObjectNode, PchNode};
use crate::engine::Engine;
use crate::options::EngineOptions;

fn write_file(path: &Path, contents: &[u8]) -> Result<(), DriverError> {
    std::fs::write(path, contents)
        .map_err(|source| DriverError::Fs(FsError::Io { path: path.to_path_buf(), source }))
}

struct CountingPlugin {
    object_runs: Arc<AtomicUsize>,
    library_runs: Arc<AtomicUsize>,
}

impl CountingPlugin {
    fn new() -> Self {
        Self { object_runs: Arc::new(AtomicUsize::new(0)), library_runs: Arc::new(AtomicUsize::new(0)) }
    }
}

impl CompilerPlugin for CountingPlugin {
    fn get_pch_commands(
        &self,
        target: &Path,
        source: &Path,
        _header: &str,
        _object: Option<&Path>,
        _settings: &CompilerSettings,
    ) -> PchCommands {
        let target = target.to_path_buf();
        PchCommands {
            compile: Command {
                args: ArgsFingerprint::new(["pch", &source.display().to_string()]),
                run: Box::new(move || write_file(&target, b"pch")),
            },
            can_cache: false,
        }
    }

    fn get_object_commands(
        &self,
        target: &Path,
        source: &Path,
        _pch: Option<&PchTarget>,
        _settings: &CompilerSettings,
    ) -> ObjectCommands {
        let target = target.to_path_buf();
        let source_for_scan = source.to_path_buf();
        let runs = Arc::clone(&self.object_runs);
        ObjectCommands {
            preprocess: None,
            compile: Command {
                args: ArgsFingerprint::new(["cc", "-c", &source.display().to_string()]),
                run: Box::new(move || {
                    runs.fetch_add(1, Ordering::SeqCst);
                    write_file(&target, b"obj")
                }),
            },
            scan: Box::new(move |_preprocessed| vec![source_for_scan]),
            can_cache: false,
        }
    }

    fn get_library_command(&self, target: &Path, sources: &[PathBuf], _settings: &CompilerSettings) -> LinkCommands {
        let target = target.to_path_buf();
        let sources_owned = sources.to_vec();
        let runs = Arc::clone(&self.library_runs);
        LinkCommands {
            command: Command {
                args: ArgsFingerprint::new(["ar", &target.display().to_string()]),
                run: Box::new(move || {
                    runs.fetch_add(1, Ordering::SeqCst);
                    write_file(&target, b"lib")
                }),
            },
            scan: Box::new(move || sources_owned),
        }
    }

    fn get_module_commands(
        &self,
        target: &Path,
        sources: &[PathBuf],
        settings: &CompilerSettings,
        _library_objects: &LibraryObjectsMap,
    ) -> LinkCommands {
        self.get_library_command(target, sources, settings)
    }

    fn get_program_commands(
        &self,
        target: &Path,
        sources: &[PathBuf],
        settings: &CompilerSettings,
        _library_objects: &LibraryObjectsMap,
    ) -> LinkCommands {
        self.get_library_command(target, sources, settings)
    }
}

struct CachingPlugin {
    object_runs: Arc<AtomicUsize>,
}

impl CachingPlugin {
    fn new() -> Self {
        Self { object_runs: Arc::new(AtomicUsize::new(0)) }
    }
}

impl CompilerPlugin for CachingPlugin {
    fn get_pch_commands(
        &self,
        target: &Path,
        source: &Path,
        _header: &str,
        _object: Option<&Path>,
        _settings: &CompilerSettings,
    ) -> PchCommands {
        let target = target.to_path_buf();
        PchCommands {
            compile: Command {
                args: ArgsFingerprint::new(["pch", &source.display().to_string()]),
                run: Box::new(move || write_file(&target, b"pch")),
            },
            can_cache: false,
        }
    }

    fn get_object_commands(
        &self,
        target: &Path,
        source: &Path,
        _pch: Option<&PchTarget>,
        _settings: &CompilerSettings,
    ) -> ObjectCommands {
        let target = target.to_path_buf();
        let source_for_scan = source.to_path_buf();
        let runs = Arc::clone(&self.object_runs);
        ObjectCommands {
            preprocess: None,
            compile: Command {
                args: ArgsFingerprint::new(["cc", "-c", &source.display().to_string()]),
                run: Box::new(move || {
                    runs.fetch_add(1, Ordering::SeqCst);
                    write_file(&target, b"obj")
                }),
            },
            scan: Box::new(move |_preprocessed| vec![source_for_scan.clone()]),
            can_cache: true,
        }
    }

    fn get_library_command(&self, target: &Path, sources: &[PathBuf], _settings: &CompilerSettings) -> LinkCommands {
        let target = target.to_path_buf();
        let sources_owned = sources.to_vec();
        LinkCommands {
            command: Command {
                args: ArgsFingerprint::new(["ar", &target.display().to_string()]),
                run: Box::new(move || write_file(&target, b"lib")),
            },
            scan: Box::new(move || sources_owned),
        }
    }

    fn get_module_commands(
        &self,
        target: &Path,
        sources: &[PathBuf],
        settings: &CompilerSettings,
        _library_objects: &LibraryObjectsMap,
    ) -> LinkCommands {
        self.get_library_command(target, sources, settings)
    }

    fn get_program_commands(
        &self,
        target: &Path,
        sources: &[PathBuf],
        settings: &CompilerSettings,
        _library_objects: &LibraryObjectsMap,
    ) -> LinkCommands {
        self.get_library_command(target, sources, settings)
    }
}

fn dep_record_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".dep");
    PathBuf::from(name)
}

fn wait_for(task: &odb_graph::Task) -> TaskState {
    let (tx, rx) = std::sync::mpsc::channel();
    task.add_callback(move |state| {
        let _ = tx.send(state);
    });
    rx.recv_timeout(std::time::Duration::from_secs(5)).expect("task did not reach a terminal state")
}

#[test]
fn resolve_against_leaves_absolute_paths_untouched() {
    let root = Path::new("/work");
    let abs = Path::new("/elsewhere/a.c");
    assert_eq!(resolve_against(root, abs), abs);
}

#[test]
fn resolve_against_joins_relative_paths_to_the_workspace_root() {
    let root = Path::new("/work");
    let rel = Path::new("src/a.c");
    assert_eq!(resolve_against(root, rel), PathBuf::from("/work/src/a.c"));
}

#[test]
fn object_step_is_a_noop_on_the_second_run() {
    let dir = tempdir().expect("tempdir");
    let src = dir.path().join("a.c");
    let target = dir.path().join("a.o");
    std::fs::write(&src, "int a(void){return 1;}").expect("write source");

    let plugin = Arc::new(CountingPlugin::new());
    let object_runs = Arc::clone(&plugin.object_runs);
    let engine = Engine::new(EngineOptions::default(), plugin);

    let node = ObjectNode { target: target.clone(), source: src, pch: None, settings: CompilerSettings::default() };

    assert_eq!(engine.run_object_step(&node, None), Ok(()));
    assert_eq!(object_runs.load(Ordering::SeqCst), 1);

    assert_eq!(engine.run_object_step(&node, None), Ok(()));
    assert_eq!(object_runs.load(Ordering::SeqCst), 1, "an up-to-date target must not recompile");
}

#[test]
fn object_step_rebuilds_after_force() {
    let dir = tempdir().expect("tempdir");
    let src = dir.path().join("a.c");
    let target = dir.path().join("a.o");
    std::fs::write(&src, "int a(void){return 1;}").expect("write source");

    let plugin = Arc::new(CountingPlugin::new());
    let object_runs = Arc::clone(&plugin.object_runs);
    let engine = Engine::new(EngineOptions::default().force(), plugin);

    let node = ObjectNode { target, source: src, pch: None, settings: CompilerSettings::default() };

    assert_eq!(engine.run_object_step(&node, None), Ok(()));
    assert_eq!(engine.run_object_step(&node, None), Ok(()));
    assert_eq!(object_runs.load(Ordering::SeqCst), 2, "--force must rebuild regardless of staleness");
}

#[test]
fn library_step_records_its_objects_in_the_library_objects_map() {
    let dir = tempdir().expect("tempdir");
    let obj_a = dir.path().join("a.o");
    let obj_b = dir.path().join("b.o");
    std::fs::write(&obj_a, "obj a").expect("write a.o");
    std::fs::write(&obj_b, "obj b").expect("write b.o");
    let target = dir.path().join("liba.a");

    let engine = Engine::new(EngineOptions::default(), Arc::new(CountingPlugin::new()));
    let node = LibraryNode {
        target: target.clone(),
        objects: Vec::new(),
        settings: CompilerSettings::default(),
    };

    let object_targets = vec![obj_a.clone(), obj_b.clone()];
    assert_eq!(engine.run_library_step(&node, &object_targets), Ok(()));
    assert!(target.exists());

    let recorded = engine.library_objects().lock().get(&target).cloned();
    assert_eq!(recorded, Some(object_targets));
}

#[test]
fn module_copy_step_skips_up_to_date_files() {
    let source_dir = tempdir().expect("source dir");
    let dest_dir = tempdir().expect("dest dir");
    let module = source_dir.path().join("plugin.so");
    std::fs::write(&module, b"v1").expect("write module");

    let engine = Engine::new(EngineOptions::default(), Arc::new(CountingPlugin::new()));
    let node = ModuleCopyNode { dir: dest_dir.path().to_path_buf(), modules: vec![module.clone()], deps: Vec::new() };

    assert_eq!(engine.run_module_copy_step(&node), Ok(()));
    let copied = dest_dir.path().join("plugin.so");
    assert_eq!(std::fs::read(&copied).expect("read copy"), b"v1");

    // A second run with an unchanged source is a no-op; mtimes are equal so
    // `module_copy_needed` reports false and the copy is left alone.
    assert_eq!(engine.run_module_copy_step(&node), Ok(()));
    assert_eq!(std::fs::read(&copied).expect("read copy again"), b"v1");
}

#[test]
fn pch_step_persists_a_dependency_record_consumers_can_reuse() {
    let dir = tempdir().expect("tempdir");
    let header_src = dir.path().join("all.h");
    std::fs::write(&header_src, "// header").expect("write header");
    let target = dir.path().join("all.pch");

    let engine = Engine::new(EngineOptions::default(), Arc::new(CountingPlugin::new()));
    let node = PchNode {
        target: target.clone(),
        source: header_src,
        header: "all.h".to_string(),
        companion_object: None,
        settings: CompilerSettings::default(),
    };

    assert_eq!(engine.run_pch_step(&node), Ok(()));
    assert!(target.exists());
    assert!(engine.depdb().get_dependency_info(&target).is_some());
}

#[test]
fn object_step_force_bypasses_an_object_cache_hit() {
    let dir = tempdir().expect("tempdir");
    let src = dir.path().join("a.c");
    let target = dir.path().join("a.o");
    std::fs::write(&src, "int a(void){return 1;}").expect("write source");

    let mut settings = CompilerSettings::default();
    settings.object_cache_path = Some(dir.path().join("cache"));

    let plugin = Arc::new(CachingPlugin::new());
    let runs = Arc::clone(&plugin.object_runs);
    let node = ObjectNode { target: target.clone(), source: src, pch: None, settings };
    let dep_record = dep_record_path(&target);

    let engine = Engine::new(EngineOptions::default(), Arc::clone(&plugin));
    assert_eq!(engine.run_object_step(&node, None), Ok(()));
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // Drop the local dependency record to simulate a fresh checkout that
    // shares the object cache but not this target's `.dep` sidecar —
    // the same situation as `tests/specs.rs`'s cross-workspace scenario.
    std::fs::remove_file(&dep_record).expect("remove dep record");
    let engine2 = Engine::new(EngineOptions::default(), Arc::clone(&plugin));
    assert_eq!(engine2.run_object_step(&node, None), Ok(()));
    assert_eq!(runs.load(Ordering::SeqCst), 1, "an object cache hit must not recompile");

    // `--force` must still recompile even though the cache has a matching
    // entry for this target.
    std::fs::remove_file(&dep_record).expect("remove dep record again");
    let engine3 = Engine::new(EngineOptions::default().force(), plugin);
    assert_eq!(engine3.run_object_step(&node, None), Ok(()));
    assert_eq!(runs.load(Ordering::SeqCst), 2, "--force must bypass an object cache hit");
}
