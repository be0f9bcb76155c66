// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content digests and a process-wide cache keyed by `(path, mtime)`.
//!
//! Spec note: SHA-1 is explicitly called sufficient; SHA-256 (via `sha2`,
//! already part of the stack) is used instead since any 160-bit+
//! collision-resistant function satisfies the invariant and there's no
//! reason to pull in a second hash crate.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use sha2::{Digest as _, Sha256};
use thiserror::Error;

/// The canonical hex length of a [`Digest`]: 32 bytes, 2 hex chars each.
pub const DIGEST_HEX_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A 256-bit content digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Digest(#[serde(with = "hex_bytes")] pub [u8; 32]);

impl Digest {
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let out = hasher.finalize();
        let mut buf = [0u8; 32];
        buf.copy_from_slice(&out);
        Digest(buf)
    }

    /// Digest of the streamed contents of `path`.
    pub fn of_file(path: &Path) -> Result<Self, DigestError> {
        let mut f = std::fs::File::open(path)
            .map_err(|e| DigestError::Io { path: path.to_path_buf(), source: e })?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = f
                .read(&mut buf)
                .map_err(|e| DigestError::Io { path: path.to_path_buf(), source: e })?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        let out = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&out);
        Ok(Digest(bytes))
    }

    pub fn to_hex(self) -> String {
        let mut s = String::with_capacity(DIGEST_HEX_LEN);
        for b in self.0 {
            s.push_str(&format!("{:02x}", b));
        }
        s
    }

    /// Parses a lower-case hex string of exactly [`DIGEST_HEX_LEN`] characters.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != DIGEST_HEX_LEN || !s.bytes().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let mut out = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = (chunk[0] as char).to_digit(16)?;
            let lo = (chunk[1] as char).to_digit(16)?;
            out[i] = ((hi << 4) | lo) as u8;
        }
        Some(Digest(out))
    }
}

impl std::fmt::Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

mod hex_bytes {
    use super::Digest;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&Digest(*bytes).to_hex())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        Digest::from_hex(&s).map(|d| d.0).ok_or_else(|| serde::de::Error::custom("bad digest hex"))
    }
}

/// Process-wide digest cache keyed by `(path, mtime_ms)`.
///
/// Entries are immutable for a given key: once a `(path, mtime)` pair has
/// been hashed, the result never changes, so reads never need to re-verify
/// against disk.
#[derive(Default)]
pub struct DigestCache {
    entries: RwLock<HashMap<(PathBuf, u64), Digest>>,
}

impl DigestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached digest for `path` at its current mtime, computing
    /// and caching it on first use. Returns `None` if the path has no mtime
    /// (doesn't exist) or can't be read.
    pub fn digest(&self, path: &Path) -> Option<Digest> {
        let mtime = crate::fs::mtime_ms(path)?;
        let key = (path.to_path_buf(), mtime);
        if let Some(d) = self.entries.read().get(&key) {
            return Some(*d);
        }
        let digest = Digest::of_file(path).ok()?;
        self.entries.write().insert(key, digest);
        Some(digest)
    }

    /// Seed the cache with a digest known from a prior build, so `digest()`
    /// doesn't need to re-read the file if its mtime still matches.
    pub fn seed(&self, path: PathBuf, mtime_ms: u64, digest: Digest) {
        self.entries.write().insert((path, mtime_ms), digest);
    }
}

#[cfg(test)]
#[path = "digest_tests.rs"]
mod tests;
