// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! odb-core: shared data model, filesystem, digest, and id primitives
//! used by every other crate in the build engine.

pub mod macros;

pub mod digest;
pub mod error;
pub mod fs;
pub mod id;
pub mod model;

pub use digest::{Digest, DigestCache, DigestError, DIGEST_HEX_LEN};
pub use error::{BuildError, ConfigError, Diagnostic, EnvironmentError, ErrorKind};
pub use fs::FsError;
pub use id::TaskId;
pub use model::{
    ArgsFingerprint, CompilerSettings, DependencyInfo, FileInfo, FileTarget, Language,
    LibraryObjectsMap, OptimizationLevel, PchTarget, DEPENDENCY_INFO_VERSION,
};
