// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The in-memory build description the [`Engine`](crate::Engine) executes.
//!
//! The build-description script language and its evaluator are out of
//! scope for this core (spec §1); a [`BuildGraph`] is the value that
//! external collaborator is expected to hand the engine once it has
//! evaluated a project file for a given variant. Nodes must be listed in
//! dependency order: a node's `deps`/`objects`/`pch` fields may only refer
//! to nodes at a lower index than themselves.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use odb_core::{CompilerSettings, ConfigError};

/// Index of a node within a [`BuildGraph`]. Stable only within the graph
/// that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

/// A precompiled header build step.
#[derive(Debug, Clone)]
pub struct PchNode {
    pub target: PathBuf,
    pub source: PathBuf,
    pub header: String,
    pub companion_object: Option<PathBuf>,
    pub settings: CompilerSettings,
}

/// A single translation unit compiled to an object file.
#[derive(Debug, Clone)]
pub struct ObjectNode {
    pub target: PathBuf,
    pub source: PathBuf,
    pub pch: Option<NodeId>,
    pub settings: CompilerSettings,
}

/// A static library archived from a set of object nodes.
#[derive(Debug, Clone)]
pub struct LibraryNode {
    pub target: PathBuf,
    pub objects: Vec<NodeId>,
    pub settings: CompilerSettings,
}

/// A shared module (`.so`/`.dll`-equivalent) linked from object nodes.
#[derive(Debug, Clone)]
pub struct ModuleNode {
    pub target: PathBuf,
    pub objects: Vec<NodeId>,
    pub settings: CompilerSettings,
}

/// An executable program linked from object nodes.
#[derive(Debug, Clone)]
pub struct ProgramNode {
    pub target: PathBuf,
    pub objects: Vec<NodeId>,
    pub settings: CompilerSettings,
}

/// `copyModulesTo`: copies a set of prebuilt modules into `dir`, after the
/// listed predecessor nodes (typically `moduleScripts`) complete.
#[derive(Debug, Clone)]
pub struct ModuleCopyNode {
    pub dir: PathBuf,
    pub modules: Vec<PathBuf>,
    pub deps: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub enum Node {
    Pch(PchNode),
    Object(ObjectNode),
    Library(LibraryNode),
    Module(ModuleNode),
    Program(ProgramNode),
    ModuleCopy(ModuleCopyNode),
}

impl Node {
    /// The path this node's step ultimately produces (a directory for
    /// `ModuleCopy`, which produces many).
    pub fn target_display(&self) -> &Path {
        match self {
            Node::Pch(n) => &n.target,
            Node::Object(n) => &n.target,
            Node::Library(n) => &n.target,
            Node::Module(n) => &n.target,
            Node::Program(n) => &n.target,
            Node::ModuleCopy(n) => &n.dir,
        }
    }

    /// Predecessor node indices that must exist (and be built first) for
    /// this node's index to be valid.
    fn predecessors(&self) -> Vec<NodeId> {
        match self {
            Node::Pch(_) => Vec::new(),
            Node::Object(n) => n.pch.into_iter().collect(),
            Node::Library(n) => n.objects.clone(),
            Node::Module(n) => n.objects.clone(),
            Node::Program(n) => n.objects.clone(),
            Node::ModuleCopy(n) => n.deps.clone(),
        }
    }
}

/// A dependency-ordered set of build nodes plus the subset the engine
/// should wait on when `execute` is called (an empty `default_targets`
/// means "wait on everything").
#[derive(Debug, Clone, Default)]
pub struct BuildGraph {
    pub nodes: Vec<Node>,
    pub default_targets: Vec<NodeId>,
}

impl BuildGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Every node's predecessors must refer to a strictly earlier index.
    /// This is what lets the engine build nodes in a single forward pass
    /// without a separate topological sort.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (idx, node) in self.nodes.iter().enumerate() {
            for pred in node.predecessors() {
                if pred.0 >= idx {
                    return Err(ConfigError::Invalid {
                        path: node.target_display().to_path_buf(),
                        message: format!(
                            "node {idx} depends on node {} which is not defined before it",
                            pred.0
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn targets(&self) -> Vec<NodeId> {
        if self.default_targets.is_empty() {
            (0..self.nodes.len()).map(NodeId).collect()
        } else {
            self.default_targets.clone()
        }
    }
}

/// The external collaborator that evaluates a build-description file (and
/// `key=value` variant arguments) into a [`BuildGraph`]. Out of scope for
/// this core per spec §1 — the CLI's `odb.toml` project loader is one
/// concrete, deliberately minimal implementation used so `odb build` has
/// something to drive without a real script evaluator.
pub trait BuildDescription: Send + Sync {
    fn evaluate(
        &self,
        path: &Path,
        variant: &str,
        args: &BTreeMap<String, String>,
    ) -> Result<BuildGraph, ConfigError>;
}
