// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Argument parsing for the CLI surface specified in spec §6.

use clap::Parser;

/// A parallel, dependency-aware build engine for native toolchains.
#[derive(Debug, Parser)]
#[command(name = "odb", disable_version_flag = true, styles = crate::color::styles())]
pub struct Cli {
    /// Build description paths (files or directories) and `key=value`
    /// variant arguments, in any order. Defaults to the current directory
    /// when no path is given.
    pub targets: Vec<String>,

    /// Print version and exit 1.
    #[arg(short = 'V', long = "version")]
    pub version: bool,

    /// Path to an args file merged into the `key=value` variant arguments.
    #[arg(long = "args", value_name = "FILE")]
    pub args_file: Option<std::path::PathBuf>,

    /// Path to a config file merged into the project's base settings.
    #[arg(long = "config", value_name = "FILE")]
    pub config_file: Option<std::path::PathBuf>,

    /// Comma-separated debug channels: reason, run, script, scan.
    #[arg(long = "debug", value_name = "KEYWORDS", value_delimiter = ',')]
    pub debug: Vec<String>,

    /// Suppress non-error output.
    #[arg(short = 's', long = "silent", visible_alias = "quiet")]
    pub silent: bool,

    /// Rebuild all targets regardless of dependency info.
    #[arg(short = 'f', long = "force")]
    pub force: bool,

    /// Worker count (default: host CPU count).
    #[arg(short = 'j', long = "jobs", value_name = "N")]
    pub jobs: Option<usize>,

    /// Equivalent to an unlimited error budget.
    #[arg(short = 'k', long = "keep-going")]
    pub keep_going: bool,

    /// Error budget (default 100).
    #[arg(short = 'e', long = "max-errors", value_name = "N", default_value_t = 100)]
    pub max_errors: usize,
}

/// Splits `targets` into build-description paths and `key=value` variant
/// arguments, per spec §6. A bare path defaults to `.` when none is given.
pub fn split_targets(targets: &[String]) -> (Vec<String>, std::collections::BTreeMap<String, String>) {
    let mut paths = Vec::new();
    let mut args = std::collections::BTreeMap::new();
    for token in targets {
        match token.split_once('=') {
            Some((key, value)) => {
                args.insert(key.to_string(), value.to_string());
            }
            None => paths.push(token.clone()),
        }
    }
    if paths.is_empty() {
        paths.push(".".to_string());
    }
    (paths, args)
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
