// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step and run identifiers

use rand::rngs::OsRng;
use rand::TryRngCore;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default hex suffix length for generated run IDs.
pub const DEFAULT_RUN_SUFFIX_LEN: usize = 8;

/// Identifier of a step within a pipeline definition.
///
/// Unique within a single pipeline; artifacts are addressed globally by
/// `(StepId, artifact name)`, and the engine keys its artifact registry,
/// result dictionaries, and workspace maps on this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId(pub String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for StepId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StepId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for StepId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StepId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

// Step-keyed maps are looked up by bare `&str` all over the engine.
impl Borrow<str> for StepId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Identifier of a single pipeline run: `<pipeline-name>-<hex suffix>`.
///
/// The run owns the workspace subtree `<root>/<RunId>/`. Resume scans rely
/// on the `name-suffix` shape, so the accessors below split on the last
/// hyphen rather than storing the parts separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generate a fresh run ID for a pipeline.
    ///
    /// The hex suffix is drawn from OS entropy; if the OS RNG is unavailable
    /// the suffix falls back to the current nanosecond timestamp. Suffix
    /// length defaults to [`DEFAULT_RUN_SUFFIX_LEN`].
    pub fn generate(pipeline_name: &str, suffix_len: usize) -> Self {
        let len = if suffix_len == 0 {
            DEFAULT_RUN_SUFFIX_LEN
        } else {
            suffix_len
        };
        Self(format!("{}-{}", pipeline_name, hex_suffix(len)))
    }

    /// The pipeline name portion of this run ID (everything before the last `-`).
    pub fn pipeline_name(&self) -> &str {
        match self.0.rfind('-') {
            Some(idx) => &self.0[..idx],
            None => &self.0,
        }
    }

    /// The hex suffix portion of this run ID.
    pub fn suffix(&self) -> &str {
        match self.0.rfind('-') {
            Some(idx) => &self.0[idx + 1..],
            None => "",
        }
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for RunId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for RunId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Produce `len` lowercase hex characters from OS entropy, falling back to
/// the nanosecond clock when the OS RNG fails.
fn hex_suffix(len: usize) -> String {
    let nbytes = len.div_ceil(2);
    let mut bytes = vec![0u8; nbytes];
    if OsRng.try_fill_bytes(&mut bytes).is_err() {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = ((nanos >> (8 * (i as u32 % 16))) & 0xff) as u8;
        }
    }
    use std::fmt::Write;
    let mut out = String::with_capacity(nbytes * 2);
    for b in &bytes {
        // Infallible for String.
        let _ = write!(out, "{:02x}", b);
    }
    out.truncate(len);
    out
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
