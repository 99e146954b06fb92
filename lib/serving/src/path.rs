// SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Validation of client-supplied file identifiers.
//!
//! A request path is accepted only when it already is its own normal form: a
//! relative path of plain segments joined by `/`. Anything the normalization
//! would change (`..`, `.`, an absolute prefix, empty segments, backslashes)
//! is rejected rather than corrected.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid path '{path}': {reason}")]
pub struct InvalidPathError {
    pub path: String,
    pub reason: &'static str,
}

/// A relative path that passed [`validate`]. It can be joined under a root
/// directory without escaping it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidPath(String);

impl ValidPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Location of this path below `root`
    pub fn under(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |p, s| p.join(s))
    }

    /// A sibling path with `suffix` appended to the file name
    pub fn with_suffix(&self, suffix: &str) -> ValidPath {
        ValidPath(format!("{}{suffix}", self.0))
    }

    /// This path below the directory `prefix`, which must be a plain segment
    pub fn prefixed(&self, prefix: &str) -> ValidPath {
        ValidPath(format!("{prefix}/{}", self.0))
    }
}

impl fmt::Display for ValidPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ValidPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ValidPath {
    type Err = InvalidPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate(s)
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Normalize `raw` and accept it only if normalization left it unchanged.
pub fn validate(raw: &str) -> Result<ValidPath, InvalidPathError> {
    let invalid = |reason| InvalidPathError {
        path: raw.to_string(),
        reason,
    };
    if raw.is_empty() {
        return Err(invalid("path is empty"));
    }
    let clean = raw
        .split(is_separator)
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect::<Vec<_>>()
        .join("/");
    if clean.is_empty() {
        return Err(invalid("path has no file name"));
    }
    if clean != raw {
        return Err(invalid("path must be relative and normalized"));
    }
    Ok(ValidPath(clean))
}
