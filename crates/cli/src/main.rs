// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `odb`: the CLI front-end driving `odb-engine` (spec §6). Everything
//! that decides *what* to build and *how to rebuild it* lives in the
//! engine and its collaborator crates; this binary only parses arguments,
//! wires up logging, loads a project file through [`project::TomlProject`],
//! and turns the engine's final error count into a process exit code.

mod cli;
mod color;
mod logging;
mod project;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use odb_driver::gcc::GccPlugin;
use odb_engine::{DebugChannel, Engine, EngineOptions};
use odb_graph::{Task, TaskState};

use cli::Cli;
use project::{SettingsToml, TomlProject};

/// CLI-level failures — a bad args/config file, an unparseable project —
/// are plumbed out with `anyhow` and reported by `main`; build failures
/// proper go through the engine's own diagnostics and error count instead.
fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("odb: {e:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();

    if cli.version {
        println!("odb {}", env!("CARGO_PKG_VERSION"));
        return Ok(1);
    }

    let (paths, mut args) = cli::split_targets(&cli.targets);

    if let Some(args_file) = &cli.args_file {
        args = merge_args_file(args_file, &args)?;
    }

    let overlay = cli.config_file.as_deref().map(load_config_overlay).transpose()?;

    let mut options = EngineOptions::default().with_max_errors(cli.max_errors);
    if let Some(jobs) = cli.jobs {
        options = options.with_jobs(jobs);
    }
    if cli.force {
        options = options.force();
    }
    if cli.keep_going {
        options = options.keep_going();
    }
    if cli.silent {
        options = options.silent();
    }
    let channels: Vec<DebugChannel> = cli.debug.iter().filter_map(|name| DebugChannel::parse(name)).collect();
    options = options.debug(channels);

    logging::init(&options);

    let variant = args.get("variant").cloned().unwrap_or_else(|| "default".to_string());

    let plugin = Arc::new(GccPlugin::default());
    let engine = Engine::new(options, plugin);
    let description = match overlay {
        Some(overlay) => TomlProject::with_overlay(overlay),
        None => TomlProject::new(),
    };

    let mut tasks = Vec::with_capacity(paths.len());
    for raw_path in &paths {
        let path = PathBuf::from(raw_path);
        let task = engine
            .execute(&description, &path, &variant, &args)
            .with_context(|| format!("evaluating {raw_path}"))?;
        tasks.push(task);
    }

    for task in &tasks {
        wait_for(task);
    }

    for diagnostic in engine.diagnostics() {
        eprintln!("odb: {diagnostic}");
    }

    Ok(engine.error_count() as i32)
}

/// Blocks the calling thread until `task` reaches a terminal state.
fn wait_for(task: &Task) -> TaskState {
    let (tx, rx) = mpsc::channel();
    task.add_callback(move |state| {
        let _ = tx.send(state);
    });
    match rx.recv_timeout(Duration::from_secs(3600)) {
        Ok(state) => state,
        Err(_) => task.state(),
    }
}

/// `--args FILE`: a TOML file whose `[args]` table (or, if absent, whose
/// top-level scalar keys) is merged into the `key=value` variant
/// arguments gathered from the command line. Command-line arguments win
/// on conflict.
fn merge_args_file(path: &std::path::Path, existing: &BTreeMap<String, String>) -> anyhow::Result<BTreeMap<String, String>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: toml::Value = toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    let table = value
        .get("args")
        .and_then(toml::Value::as_table)
        .or_else(|| value.as_table())
        .cloned()
        .unwrap_or_default();

    let mut merged = BTreeMap::new();
    for (key, v) in table {
        if let Some(s) = scalar_to_string(&v) {
            merged.insert(key, s);
        }
    }
    merged.extend(existing.clone());
    Ok(merged)
}

/// `--config FILE`: a TOML file holding the same keys as a project's
/// `[settings]` table, applied to every project this run evaluates before
/// its own variant overlay.
fn load_config_overlay(path: &std::path::Path) -> anyhow::Result<SettingsToml> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn scalar_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}
