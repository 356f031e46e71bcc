// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The capability this crate consumes from a forest, without depending on
//! the forest implementation itself.

use forest_geometry::{Position, TreeBounds};
use forest_tree::{EntityId, TreeId};

/// Read-only topology and content access a [`crate::GhostZoneManager`] needs
/// to compute and replicate ghost entities, without depending on the
/// concrete forest type that owns the trees.
///
/// Implemented by `forest_core::Forest`.
pub trait NeighborSource<C>: Send + Sync {
    /// Every tree currently known to the source.
    fn all_tree_ids(&self) -> Vec<TreeId>;

    /// The tree ids adjacent to `tree_id` (face, edge, or vertex contact).
    fn neighbor_tree_ids(&self, tree_id: &TreeId) -> Vec<TreeId>;

    /// The shape bounds of `tree_id`, if it exists.
    fn tree_bounds(&self, tree_id: &TreeId) -> Option<TreeBounds>;

    /// Every entity stored directly in `tree_id`, with position and
    /// content, for ghost replication into its neighbors.
    fn tree_entities(&self, tree_id: &TreeId) -> Vec<(EntityId, Position, C)>
    where
        C: Clone;
}
