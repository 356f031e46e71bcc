// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The `SpatialTree` capability: the only surface the forest core consumes
//! from a per-tree spatial index (an octree or a tetree).

use forest_geometry::{Position, TreeBounds};

use crate::entity::EntityId;
use crate::error::Result;

/// Ghost-layer mode of a per-tree index, for indexes that maintain their
/// own internal ghost acceleration structure (distinct from the
/// forest-level ghost manager in `forest_ghost`, which replicates whole
/// entities across tree boundaries).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum GhostType {
    /// No internal ghost layer.
    #[default]
    None,
    /// A face-adjacency ghost layer.
    Face,
    /// A full-neighborhood ghost layer (face, edge, and vertex adjacency).
    Full,
}

/// The abstract capability surface of a per-tree spatial index.
///
/// This is the *only* interface the forest core depends on for per-tree
/// storage: it deliberately does not expose node layout, space-filling-curve
/// keys, or in-tree k-NN, since those are owned by the concrete octree/tetree
/// implementation (a Non-goal of this crate — see the crate's top-level
/// documentation).
///
/// Implementations are free to choose internal structure (grid, R-tree, BVH,
/// true octree/tetree node hierarchy) as long as they honor this contract.
pub trait SpatialTree<C>: Send + Sync {
    /// Insert `content` at `position`, tagged with tree-local `level`.
    ///
    /// `bounds` is an optional bounding volume for the entity (distinct
    /// from a point); omit it for pure point entities.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ForestError::InvalidArgument`] if `level` is out of
    /// range or `position` is outside the tree's coordinate domain (for
    /// example, a negative coordinate in a tetrahedral tree), and
    /// [`crate::ForestError::DuplicateId`] if `id` is already present.
    fn insert(
        &mut self,
        id: EntityId,
        position: Position,
        level: u32,
        content: C,
        bounds: Option<TreeBounds>,
    ) -> Result<()>;

    /// Remove `id`, returning whether it was present.
    fn remove(&mut self, id: EntityId) -> bool;

    /// The content stored for `id`, if present.
    fn get(&self, id: EntityId) -> Option<C>
    where
        C: Clone;

    /// The position of `id`, if present.
    fn position_of(&self, id: EntityId) -> Option<Position>;

    /// All entities currently stored, with their positions.
    ///
    /// Order is implementation-defined; callers that need first-match-wins
    /// semantics over a *child's* insertion order (as in octant/Bey
    /// redistribution) read the order from the density region, not from
    /// this iteration.
    fn entities_with_positions(&self) -> Vec<(EntityId, Position)>;

    /// Enter bulk-loading mode: internal structural rebalancing may be
    /// deferred until [`SpatialTree::finalize_bulk_loading`].
    fn enable_bulk_loading(&mut self) {}

    /// Exit bulk-loading mode, performing any rebalancing deferred during
    /// the bulk phase.
    fn finalize_bulk_loading(&mut self) {}

    /// The index's internal ghost-layer mode.
    fn ghost_type(&self) -> GhostType {
        GhostType::None
    }

    /// Set the index's internal ghost-layer mode.
    fn set_ghost_type(&mut self, _ghost_type: GhostType) {}

    /// Build the index's internal ghost layer from scratch.
    fn create_ghost_layer(&mut self) {}

    /// Refresh the index's internal ghost layer incrementally.
    fn update_ghost_layer(&mut self) {}

    /// Number of entities currently stored.
    fn entity_count(&self) -> usize;

    /// Number of internal nodes, for diagnostics/statistics.
    fn node_count(&self) -> usize;

    /// Maximum depth reached by the internal structure, for diagnostics.
    fn max_depth(&self) -> u32;
}
