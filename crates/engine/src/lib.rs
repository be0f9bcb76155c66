// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `odb-engine`: the top-level coordinator (spec §4.6). Owns the thread
//! pool, dependency database, digest cache, and `LibraryObjectsMap`; drives
//! a [`BuildGraph`] through the task graph, calling into `odb-driver` for
//! each step and `odb-depdb`/`odb-cache` to decide whether a step is
//! needed at all.

pub mod build_graph;
mod engine;
pub mod options;
mod steps;

pub use build_graph::{
    BuildDescription, BuildGraph, LibraryNode, ModuleCopyNode, ModuleNode, Node, NodeId,
    ObjectNode, PchNode, ProgramNode,
};
pub use engine::{Engine, EngineError};
pub use options::{DebugChannel, EngineOptions};
