// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree identifiers.

use std::fmt;
use std::sync::Arc;

/// A globally-unique identifier for one tree in a forest.
///
/// Backed by `Arc<str>` rather than `String` or an integer index: tree ids
/// are copied into many maps at once (neighbor sets, child lists, ghost
/// zone relations, ghost location sets), they need to be stable across
/// subdivision and merge (so integer slot indices would be unsafe to
/// reuse), and they are also meant to be human-readable for logging and
/// debugging.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeId(Arc<str>);

impl TreeId {
    /// Wrap an existing string as a tree id.
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        Self(value.into())
    }

    /// The id as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TreeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TreeId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
