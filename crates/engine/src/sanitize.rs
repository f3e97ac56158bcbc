// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Contract schema sanitization
//!
//! Two independent defenses. Schema *paths* resolve only under an
//! approved-directory list: traversal sequences (including percent-encoded
//! variants and backslashes) are rejected before touching the filesystem,
//! and canonicalization catches symlink escapes. Schema *content* rendered
//! into the contract prompt is scrubbed of known instruction-override
//! patterns and omitted entirely above a byte cap.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Byte cap above which schema content is omitted from the contract prompt.
pub const SCHEMA_PROMPT_BYTE_LIMIT: usize = 8 * 1024;

/// Substrings (matched case-insensitively) scrubbed from schema text before
/// it is rendered into a prompt.
const INJECTION_PATTERNS: &[&str] = &[
    "ignore previous instructions",
    "ignore all previous instructions",
    "disregard previous instructions",
    "disregard all previous instructions",
    "ignore the above",
    "forget your instructions",
    "you are now",
    "new instructions:",
    "system prompt:",
];

const REDACTED: &str = "[redacted]";

/// Schema path rejections.
#[derive(Debug, Error, PartialEq)]
pub enum SanitizeError {
    #[error("schema path contains traversal sequence: {0}")]
    Traversal(String),
    #[error("schema path not found: {0}")]
    NotFound(String),
    #[error("schema path escapes approved directories: {0}")]
    OutsideApproved(String),
    #[error("no approved schema directories configured")]
    NoApprovedDirs,
}

/// Resolve a contract schema file against the approved-directory list.
///
/// Returns the canonical path on success. Rejects `..` components, encoded
/// traversals (`%2e`, `%2f`, `%5c`), backslashes, and any path whose
/// canonical form (symlinks resolved) lies outside every approved directory.
pub fn approve_schema_path(
    raw: &Path,
    approved_dirs: &[PathBuf],
) -> Result<PathBuf, SanitizeError> {
    if approved_dirs.is_empty() {
        return Err(SanitizeError::NoApprovedDirs);
    }

    let display = raw.display().to_string();
    let lowered = display.to_ascii_lowercase();
    if lowered.contains("%2e") || lowered.contains("%2f") || lowered.contains("%5c") {
        return Err(SanitizeError::Traversal(display));
    }
    if display.contains('\\') {
        return Err(SanitizeError::Traversal(display));
    }
    if raw
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(SanitizeError::Traversal(display));
    }

    // Relative paths resolve against the first approved directory.
    let joined = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        approved_dirs[0].join(raw)
    };

    let canonical = joined
        .canonicalize()
        .map_err(|_| SanitizeError::NotFound(display.clone()))?;

    for dir in approved_dirs {
        let Ok(approved) = dir.canonicalize() else {
            continue;
        };
        if canonical.starts_with(&approved) {
            return Ok(canonical);
        }
    }
    Err(SanitizeError::OutsideApproved(display))
}

/// Prepare schema text for inclusion in a contract prompt.
///
/// Returns `None` when the text exceeds the byte cap (the prompt then says
/// the schema was omitted); otherwise returns the text with instruction
/// -override patterns replaced by `[redacted]`.
pub fn scrub_schema_for_prompt(schema: &str, byte_limit: usize) -> Option<String> {
    if schema.len() > byte_limit {
        return None;
    }
    Some(scrub_patterns(schema))
}

fn scrub_patterns(text: &str) -> String {
    let mut result = text.to_string();
    for pattern in INJECTION_PATTERNS {
        result = replace_case_insensitive(&result, pattern, REDACTED);
    }
    result
}

fn replace_case_insensitive(haystack: &str, needle: &str, replacement: &str) -> String {
    let lower_haystack = haystack.to_ascii_lowercase();
    let lower_needle = needle.to_ascii_lowercase();
    let mut result = String::with_capacity(haystack.len());
    let mut cursor = 0;
    while let Some(found) = lower_haystack[cursor..].find(&lower_needle) {
        let start = cursor + found;
        result.push_str(&haystack[cursor..start]);
        result.push_str(replacement);
        cursor = start + needle.len();
    }
    result.push_str(&haystack[cursor..]);
    result
}

#[cfg(test)]
#[path = "sanitize_tests.rs"]
mod tests;
