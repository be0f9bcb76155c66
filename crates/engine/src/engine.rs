// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use odb_core::{ConfigError, Diagnostic, Digest, DigestCache, LibraryObjectsMap};
use odb_depdb::DependencyDb;
use odb_driver::CompilerPlugin;
use odb_graph::{Task, TaskGraph, ThreadPool};
use parking_lot::Mutex;
use thiserror::Error;

use crate::build_graph::{BuildDescription, BuildGraph, Node, NodeId};
use crate::options::EngineOptions;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

struct Inner {
    options: EngineOptions,
    pool: Arc<ThreadPool>,
    cancelled: Arc<AtomicBool>,
    graph: TaskGraph,
    depdb: DependencyDb,
    digests: DigestCache,
    plugin: Arc<dyn CompilerPlugin>,
    library_objects: Mutex<LibraryObjectsMap>,
    diagnostics: Mutex<Vec<Diagnostic>>,
    error_count: AtomicUsize,
    timestamps: Mutex<HashMap<PathBuf, Option<u64>>>,
    memo: Mutex<HashMap<(PathBuf, String), Task>>,
}

/// Top-level coordinator (spec §4.6). Cheap to clone — every clone shares
/// the same pool, dependency DB handle, digest cache, and diagnostics.
#[derive(Clone)]
pub struct Engine(Arc<Inner>);

impl Engine {
    pub fn new(options: EngineOptions, plugin: Arc<dyn CompilerPlugin>) -> Self {
        let pool = Arc::new(ThreadPool::new(options.jobs));
        let cancelled = Arc::new(AtomicBool::new(false));
        let graph = TaskGraph::new(Arc::clone(&pool), Arc::clone(&cancelled));
        Self(Arc::new(Inner {
            options,
            pool,
            cancelled,
            graph,
            depdb: DependencyDb::new(),
            digests: DigestCache::new(),
            plugin,
            library_objects: Mutex::new(LibraryObjectsMap::new()),
            diagnostics: Mutex::new(Vec::new()),
            error_count: AtomicUsize::new(0),
            timestamps: Mutex::new(HashMap::new()),
            memo: Mutex::new(HashMap::new()),
        }))
    }

    pub fn options(&self) -> &EngineOptions {
        &self.0.options
    }

    pub(crate) fn plugin(&self) -> &dyn CompilerPlugin {
        self.0.plugin.as_ref()
    }

    pub(crate) fn depdb(&self) -> &DependencyDb {
        &self.0.depdb
    }

    pub(crate) fn digests(&self) -> &DigestCache {
        &self.0.digests
    }

    pub(crate) fn library_objects(&self) -> &Mutex<LibraryObjectsMap> {
        &self.0.library_objects
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// `createTask`: a new task sharing this engine's pool and cancellation
    /// flag.
    pub fn create_task(&self, closure: Option<odb_graph::TaskClosure>) -> Task {
        self.0.graph.create(closure)
    }

    /// Records a diagnostic and, if it counts against the budget,
    /// increments the running error count — cancelling the build once the
    /// count reaches `options.max_errors` (spec §5, §7).
    pub fn raise_error(&self, diagnostic: Diagnostic) {
        tracing::error!(target: "odb::reason", error = %diagnostic, "build error");
        if diagnostic.counts_against_budget() {
            let n = self.0.error_count.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(budget) = self.0.options.max_errors {
                if n >= budget {
                    self.0.cancelled.store(true, Ordering::SeqCst);
                }
            }
        }
        self.0.diagnostics.lock().push(diagnostic);
    }

    pub fn error_count(&self) -> usize {
        self.0.error_count.load(Ordering::SeqCst)
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.0.diagnostics.lock().clone()
    }

    /// `getTimestamp`: cached stat, invalidated by [`Engine::notify_file_changed`].
    pub fn get_timestamp(&self, path: &Path) -> Option<u64> {
        if let Some(cached) = self.0.timestamps.lock().get(path) {
            return *cached;
        }
        let ts = odb_core::fs::mtime_ms(path);
        self.0.timestamps.lock().insert(path.to_path_buf(), ts);
        ts
    }

    /// Invalidates the cached timestamp for `path` after the engine writes
    /// to it.
    pub fn notify_file_changed(&self, path: &Path) {
        self.0.timestamps.lock().remove(path);
    }

    /// `getFileDigest`: digest cache keyed by `(path, mtime)`.
    pub fn get_file_digest(&self, path: &Path) -> Option<Digest> {
        self.0.digests.digest(path)
    }

    /// `execute(descriptionPath, variant)`: idempotent. Executing the same
    /// `(path, variant)` pair twice returns the same underlying task rather
    /// than building twice (spec §4.6, §9).
    pub fn execute(
        &self,
        description: &dyn BuildDescription,
        path: &Path,
        variant: &str,
        args: &BTreeMap<String, String>,
    ) -> Result<Task, EngineError> {
        let key = (path.to_path_buf(), variant.to_string());
        if let Some(task) = self.0.memo.lock().get(&key) {
            return Ok(task.clone());
        }

        let graph = description.evaluate(path, variant, args)?;
        graph.validate()?;
        let task = self.build_graph(&graph);

        // Another thread may have raced us to populate the memo for the
        // same key; whichever insert lands first wins, the loser's task is
        // still valid (just not the canonical one returned henceforth).
        let mut memo = self.0.memo.lock();
        let task = memo.entry(key).or_insert(task).clone();
        Ok(task)
    }

    /// Builds every node in `graph` (in index order — callers guarantee
    /// dependency order via [`BuildGraph::validate`]) and returns a
    /// synchronization task that completes once every requested target
    /// does.
    fn build_graph(&self, graph: &BuildGraph) -> Task {
        let mut tasks: Vec<Task> = Vec::with_capacity(graph.nodes.len());
        for (idx, node) in graph.nodes.iter().enumerate() {
            let preds = self.predecessor_tasks(node, &tasks);
            let task = self.build_node(graph, NodeId(idx), node, &preds);
            tasks.push(task);
        }

        let waited_on: Vec<Task> =
            graph.targets().into_iter().map(|id| tasks[id.0].clone()).collect();

        let sync = self.create_task(None);
        sync.complete_after(&waited_on);
        sync.start_after(&[], false);
        sync.start();
        sync
    }

    fn predecessor_tasks(&self, node: &Node, built: &[Task]) -> Vec<Task> {
        let ids: Vec<NodeId> = match node {
            Node::Pch(_) => Vec::new(),
            Node::Object(n) => n.pch.into_iter().collect(),
            Node::Library(n) => n.objects.clone(),
            Node::Module(n) => n.objects.clone(),
            Node::Program(n) => n.objects.clone(),
            Node::ModuleCopy(n) => n.deps.clone(),
        };
        ids.into_iter().map(|id| built[id.0].clone()).collect()
    }

    fn build_node(&self, graph: &BuildGraph, id: NodeId, node: &Node, preds: &[Task]) -> Task {
        let engine = self.clone();
        let graph = graph.clone();
        let task = match node {
            Node::Pch(n) => {
                let n = n.clone();
                self.create_task(Some(Box::new(move || engine.run_pch_step(&n))))
            }
            Node::Object(n) => {
                let n = n.clone();
                let pch_target = match (n.pch, preds.first()) {
                    (Some(pch_id), Some(pch_task)) => match graph.node(pch_id) {
                        Node::Pch(pch) => Some(odb_core::PchTarget {
                            path: pch.target.clone(),
                            header: pch.header.clone(),
                            object: pch.companion_object.clone(),
                            task: pch_task.id(),
                        }),
                        _ => unreachable!("ObjectNode.pch must reference a PchNode"),
                    },
                    _ => None,
                };
                self.create_task(Some(Box::new(move || engine.run_object_step(&n, pch_target.as_ref()))))
            }
            Node::Library(n) => {
                let n = n.clone();
                let object_targets = object_target_paths(&graph, &n.objects);
                self.create_task(Some(Box::new(move || engine.run_library_step(&n, &object_targets))))
            }
            Node::Module(n) => {
                let n = n.clone();
                let object_targets = object_target_paths(&graph, &n.objects);
                self.create_task(Some(Box::new(move || engine.run_module_step(&n, &object_targets))))
            }
            Node::Program(n) => {
                let n = n.clone();
                let object_targets = object_target_paths(&graph, &n.objects);
                self.create_task(Some(Box::new(move || engine.run_program_step(&n, &object_targets))))
            }
            Node::ModuleCopy(n) => {
                let n = n.clone();
                self.create_task(Some(Box::new(move || engine.run_module_copy_step(&n))))
            }
        };
        let _ = id;
        task.start_after(preds, false);
        task.start();
        task
    }
}

fn object_target_paths(graph: &BuildGraph, objects: &[NodeId]) -> Vec<PathBuf> {
    objects
        .iter()
        .map(|id| match graph.node(*id) {
            Node::Object(obj) => obj.target.clone(),
            other => other.target_display().to_path_buf(),
        })
        .collect()
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
