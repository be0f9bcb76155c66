// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use odb_core::{ArgsFingerprint, BuildError, CompilerSettings, ConfigError, Diagnostic, FsError, LibraryObjectsMap, PchTarget};
use odb_driver::{Command, CompilerPlugin, DriverError, LinkCommands, ObjectCommands, PchCommands};
use odb_graph::TaskState;
use tempfile::tempdir;

use super::Engine;
use crate::build_graph::{BuildDescription, BuildGraph, Node, ObjectNode, PchNode};
use crate::options::EngineOptions;

fn write_file(path: &Path, contents: &[u8]) -> Result<(), DriverError> {
    std::fs::write(path, contents)
        .map_err(|source| DriverError::Fs(FsError::Io { path: path.to_path_buf(), source }))
}

/// A [`CompilerPlugin`] that "compiles" by writing a fixed byte string to
/// the target, optionally always failing — enough to exercise the engine's
/// coordination without a real toolchain.
struct FakePlugin {
    fail: bool,
}

impl FakePlugin {
    fn new(fail: bool) -> Self {
        Self { fail }
    }
}

impl CompilerPlugin for FakePlugin {
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
        let fail = self.fail;
        ObjectCommands {
            preprocess: None,
            compile: Command {
                args: ArgsFingerprint::new(["cc", "-c", &source.display().to_string()]),
                run: Box::new(move || {
                    if fail {
                        return Err(DriverError::CommandFailed {
                            program: "cc".to_string(),
                            status: 1,
                            stderr: "boom".to_string(),
                        });
                    }
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

struct FixedDescription(BuildGraph);

impl BuildDescription for FixedDescription {
    fn evaluate(&self, _path: &Path, _variant: &str, _args: &BTreeMap<String, String>) -> Result<BuildGraph, ConfigError> {
        Ok(self.0.clone())
    }
}

fn wait_for(task: &odb_graph::Task) -> TaskState {
    let (tx, rx) = mpsc::channel();
    task.add_callback(move |state| {
        let _ = tx.send(state);
    });
    rx.recv_timeout(Duration::from_secs(5)).expect("task did not reach a terminal state")
}

fn single_object_graph(target: &Path, source: &Path) -> BuildGraph {
    let mut graph = BuildGraph::new();
    graph.push(Node::Object(ObjectNode {
        target: target.to_path_buf(),
        source: source.to_path_buf(),
        pch: None,
        settings: CompilerSettings::default(),
    }));
    graph
}

#[test]
fn execute_is_memoized_by_path_and_variant() {
    let dir = tempdir().expect("tempdir");
    let src = dir.path().join("a.c");
    let obj = dir.path().join("a.o");
    std::fs::write(&src, "int a(void){return 1;}").expect("write source");

    let engine = Engine::new(EngineOptions::default(), Arc::new(FakePlugin::new(false)));
    let description = FixedDescription(single_object_graph(&obj, &src));

    let task1 = engine
        .execute(&description, Path::new("build.toml"), "release", &BTreeMap::new())
        .expect("first execute");
    let task2 = engine
        .execute(&description, Path::new("build.toml"), "release", &BTreeMap::new())
        .expect("second execute");

    assert_eq!(task1, task2, "same (path, variant) must reuse the same task");
    assert_eq!(wait_for(&task1), TaskState::Succeeded);
    assert!(obj.exists());
}

#[test]
fn error_budget_stops_dispatch_without_hanging() {
    let dir = tempdir().expect("tempdir");
    let mut graph = BuildGraph::new();
    let mut sources = Vec::new();
    for i in 0..5 {
        let src = dir.path().join(format!("f{i}.c"));
        std::fs::write(&src, "int f(void){return 0;}").expect("write source");
        let obj = dir.path().join(format!("f{i}.o"));
        graph.push(Node::Object(ObjectNode {
            target: obj,
            source: src.clone(),
            pch: None,
            settings: CompilerSettings::default(),
        }));
        sources.push(src);
    }

    let options = EngineOptions::default().with_max_errors(2).with_jobs(1);
    let engine = Engine::new(options, Arc::new(FakePlugin::new(true)));
    let description = FixedDescription(graph);

    let task = engine
        .execute(&description, Path::new("build.toml"), "debug", &BTreeMap::new())
        .expect("execute");

    assert_eq!(wait_for(&task), TaskState::Failed);
    assert_eq!(engine.error_count(), 2, "dispatch must stop exactly at the budget");
    assert_eq!(engine.diagnostics().len(), 2);
}

#[test]
fn raise_error_cancels_once_budget_reached() {
    let engine = Engine::new(EngineOptions::default().with_max_errors(2), Arc::new(FakePlugin::new(false)));
    let diag = || Diagnostic::new(BuildError::OutputMissing { target: PathBuf::from("x") }, None);

    engine.raise_error(diag());
    assert!(!engine.is_cancelled());

    engine.raise_error(diag());
    assert!(engine.is_cancelled());
    assert_eq!(engine.error_count(), 2);
}

#[test]
fn get_timestamp_reflects_stat_only_after_notify() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("f");
    std::fs::write(&path, b"a").expect("write");

    let engine = Engine::new(EngineOptions::default(), Arc::new(FakePlugin::new(false)));
    assert!(engine.get_timestamp(&path).is_some());

    std::fs::remove_file(&path).expect("remove");
    assert!(engine.get_timestamp(&path).is_some(), "stale cache entry survives an uncommunicated change");

    engine.notify_file_changed(&path);
    assert!(engine.get_timestamp(&path).is_none());
}

#[test]
fn pch_predecessor_is_wired_to_the_object_step() {
    let dir = tempdir().expect("tempdir");
    let pch_src = dir.path().join("all.h");
    let obj_src = dir.path().join("a.c");
    std::fs::write(&pch_src, "// header").expect("write header");
    std::fs::write(&obj_src, "int a(void){return 1;}").expect("write source");

    let mut graph = BuildGraph::new();
    let pch_id = graph.push(Node::Pch(PchNode {
        target: dir.path().join("all.pch"),
        source: pch_src,
        header: "all.h".to_string(),
        companion_object: None,
        settings: CompilerSettings::default(),
    }));
    let obj_target = dir.path().join("a.o");
    graph.push(Node::Object(ObjectNode {
        target: obj_target.clone(),
        source: obj_src,
        pch: Some(pch_id),
        settings: CompilerSettings::default(),
    }));

    let engine = Engine::new(EngineOptions::default(), Arc::new(FakePlugin::new(false)));
    let description = FixedDescription(graph);
    let task = engine
        .execute(&description, Path::new("build.toml"), "release", &BTreeMap::new())
        .expect("execute");

    assert_eq!(wait_for(&task), TaskState::Succeeded);
    assert!(obj_target.exists());
}
