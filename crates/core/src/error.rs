// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error kinds shared across the build. A running build accumulates these
//! as [`Diagnostic`]s rather than aborting on the first one, up to the
//! configured error budget (spec §7).

use std::path::PathBuf;

use thiserror::Error;

/// A problem in the project's build description or configuration, detected
/// before any compiler is invoked.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{path}: {message}")]
    Invalid { path: PathBuf, message: String },
    #[error("unknown variant {name:?} (known variants: {known:?})")]
    UnknownVariant { name: String, known: Vec<String> },
    #[error("missing required field {field:?} in {path}")]
    MissingField { path: PathBuf, field: String },
}

/// A failure while executing a build step (a compiler, archiver, or linker
/// invocation exited non-zero, or its output didn't appear on disk).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("{target}: command exited with status {status}")]
    CommandFailed { target: PathBuf, status: i32, stderr: String },
    #[error("{target}: expected output was not produced")]
    OutputMissing { target: PathBuf },
    #[error("{target}: {message}")]
    Other { target: PathBuf, message: String },
}

/// A problem with the environment the build is running in, independent of
/// any particular target (a missing toolchain, an unwritable cache root).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvironmentError {
    #[error("tool not found: {name}")]
    ToolNotFound { name: String },
    #[error("cannot use {path} as {purpose}: {message}")]
    Unusable { path: PathBuf, purpose: String, message: String },
}

/// The top-level error kind an [`Engine`](crate) run can raise.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
    /// The build was stopped after exceeding its error budget, or by an
    /// explicit cancellation request. Carries no message of its own; the
    /// diagnostics that caused it are recorded separately.
    #[error("build cancelled")]
    Cancelled,
}

/// One recorded problem, with enough context to report to a user and to
/// decide whether it counts against the error budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    /// Workspace-relative path the diagnostic is most naturally attributed
    /// to, when there is one (a target, a source file).
    pub path: Option<PathBuf>,
}

impl Diagnostic {
    pub fn new(kind: impl Into<ErrorKind>, path: Option<PathBuf>) -> Self {
        Self { kind: kind.into(), path }
    }

    /// Whether this diagnostic counts against the error budget. Cancellation
    /// itself is a consequence of the budget, not a cause, so it doesn't.
    pub fn counts_against_budget(&self) -> bool {
        !matches!(self.kind, ErrorKind::Cancelled)
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {}", path.display(), self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
