// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-wide options: worker count, force-rebuild, the error budget, and
//! which debug channels are enabled (spec §6).

use std::collections::HashSet;

/// One of the debug channels the CLI's `--debug` flag can request (spec
/// §6, §7). Each maps to a `tracing` target so `RUST_LOG`/`--debug` can
/// enable them independently: `odb::reason`, `odb::run`, `odb::script`,
/// `odb::scan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugChannel {
    /// Reasons a target needs rebuilding.
    Reason,
    /// Subprocess command lines as they're run.
    Run,
    /// Build-description script evaluation (owned by the external
    /// collaborator; the core only reserves the channel name).
    Script,
    /// Scanned include/dependency paths.
    Scan,
}

impl DebugChannel {
    pub fn tracing_target(self) -> &'static str {
        match self {
            DebugChannel::Reason => "odb::reason",
            DebugChannel::Run => "odb::run",
            DebugChannel::Script => "odb::script",
            DebugChannel::Scan => "odb::scan",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "reason" => Some(DebugChannel::Reason),
            "run" => Some(DebugChannel::Run),
            "script" => Some(DebugChannel::Script),
            "scan" => Some(DebugChannel::Scan),
            _ => None,
        }
    }
}

/// Immutable options for one `Engine` run.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Worker count for the thread pool. Defaults to host CPU count.
    pub jobs: usize,
    /// `-f/--force`: rebuild every target regardless of dependency info.
    pub force_build: bool,
    /// `-e/--max-errors`: stop dispatching new closures once the recorded
    /// error count reaches this. `None` means unlimited (`-k/--keep-going`).
    pub max_errors: Option<usize>,
    /// `-s/--silent`: suppress non-error progress output. The core only
    /// tracks the flag; the CLI's logger consults it before printing.
    pub silent: bool,
    pub debug_channels: HashSet<DebugChannel>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            jobs: odb_graph::ThreadPool::default_worker_count(),
            force_build: false,
            max_errors: Some(100),
            silent: false,
            debug_channels: HashSet::new(),
        }
    }
}

impl EngineOptions {
    pub fn keep_going(mut self) -> Self {
        self.max_errors = None;
        self
    }

    pub fn with_max_errors(mut self, n: usize) -> Self {
        self.max_errors = Some(n);
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn force(mut self) -> Self {
        self.force_build = true;
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn debug(mut self, channels: impl IntoIterator<Item = DebugChannel>) -> Self {
        self.debug_channels.extend(channels);
        self
    }

    pub fn channel_enabled(&self, channel: DebugChannel) -> bool {
        self.debug_channels.contains(&channel)
    }
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;
