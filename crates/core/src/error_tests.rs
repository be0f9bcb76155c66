// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn cancelled_does_not_count_against_budget() {
    let diag = Diagnostic::new(ErrorKind::Cancelled, None);
    assert!(!diag.counts_against_budget());
}

#[test]
fn build_error_counts_against_budget() {
    let diag = Diagnostic::new(
        BuildError::OutputMissing { target: PathBuf::from("a.o") },
        Some(PathBuf::from("a.o")),
    );
    assert!(diag.counts_against_budget());
}

#[test]
fn diagnostic_display_includes_path_when_present() {
    let diag = Diagnostic::new(
        EnvironmentError::ToolNotFound { name: "gcc".into() },
        Some(PathBuf::from("src/a.c")),
    );
    let rendered = diag.to_string();
    assert!(rendered.contains("src/a.c"));
    assert!(rendered.contains("gcc"));
}

#[test]
fn diagnostic_display_omits_path_when_absent() {
    let diag = Diagnostic::new(
        ConfigError::MissingField { path: PathBuf::from("odb.toml"), field: "compiler".into() },
        None,
    );
    assert!(!diag.to_string().starts_with(':'));
}
