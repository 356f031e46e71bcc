// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Forest Tree: the `SpatialTree` capability surface and per-tree forest
//! metadata.
//!
//! This crate sits between [`forest_geometry`] and `forest_core`. It
//! defines:
//!
//! - [`SpatialTree`]: the abstract capability a per-tree spatial index
//!   (octree or tetree) must provide. This is deliberately small — insert,
//!   remove, lookup, iteration, bulk-load bracketing, and an optional
//!   internal ghost-layer hook — since the real octree/tetree node layout,
//!   space-filling-curve keys, and in-tree k-NN are Non-goals of this
//!   crate and of the forest core that consumes it.
//! - [`FlatSpatialTree`]: a small linear-scan reference implementation of
//!   `SpatialTree`, useful for tests and small trees.
//! - [`EntityId`]/[`EntityIdGenerator`]/[`SequentialIdGenerator`]: opaque
//!   entity identifiers and their thread-safe generator capability.
//! - [`TreeId`]: a globally-unique, cheaply-cloned tree identifier.
//! - [`TreeNode`]: per-tree forest metadata (bounds, hierarchy, neighbors,
//!   statistics, metadata map) layered over a `SpatialTree`, with the
//!   concurrency primitives the forest core's adaptation engine relies on
//!   (the subdivision compare-and-set gate, the global-bounds monitor).
//! - [`ForestError`]: the forest-wide error taxonomy.

mod entity;
mod error;
mod flat;
mod node;
mod spatial_tree;
mod tree_id;

pub use entity::{EntityId, EntityIdGenerator, SequentialIdGenerator};
pub use error::{ForestError, Result};
pub use flat::FlatSpatialTree;
pub use node::{MetadataValue, TreeNode, TreeStats};
pub use spatial_tree::{GhostType, SpatialTree};
pub use tree_id::TreeId;
