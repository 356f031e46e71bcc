// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The forest-wide error taxonomy.

/// Errors raised by the forest core.
///
/// These are kinds, not a deep hierarchy: every operation that can fail
/// returns one of these variants (or an `Option`/`bool` where absence is
/// routine rather than a diagnosed failure). The background adaptation
/// task never propagates these to a caller; it logs and continues (see
/// `forest_core`'s adaptation engine).
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ForestError {
    /// A supplied argument violates a documented precondition: a negative
    /// coordinate where non-negative is required, an out-of-range tetree
    /// level, a non-positive dimension, or a strategy mismatched with the
    /// tree's bounds shape.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An entity id was already registered.
    #[error("duplicate entity id")]
    DuplicateId,

    /// A referenced tree id or entity id does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An operation conflicts with concurrent structural state (for
    /// example, a caller asking whether a tree may be subdivided when it
    /// has already completed subdivision).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A subdivision was requested but the geometry made it impossible: a
    /// tetree level out of `0..=20`, or tetrahedral bounds with a negative
    /// anchor coordinate.
    #[error("geometry error: {0}")]
    Geometry(String),

    /// A density region or index could not track any further entities.
    #[error("capacity exceeded")]
    Capacity,

    /// The operation was attempted after the forest (or adaptive forest)
    /// was shut down.
    #[error("forest has shut down")]
    Shutdown,
}

/// The crate-wide result alias.
pub type Result<T> = core::result::Result<T, ForestError>;
