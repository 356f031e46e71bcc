// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A flat, linear-scan reference implementation of [`SpatialTree`].
//!
//! This is a small, simple stand-in for a real octree/tetree node layout —
//! useful for tests, examples, and small trees where a real spatial
//! structure's constant overhead isn't worth paying. Production deployments
//! are expected to supply a proper octree/tetree implementation behind the
//! same [`SpatialTree`] capability.

use forest_geometry::Position;
use hashbrown::HashMap;

use crate::entity::EntityId;
use crate::error::{ForestError, Result};
use crate::spatial_tree::{GhostType, SpatialTree};

/// A flat, `HashMap`-backed [`SpatialTree`] using linear scans for
/// iteration.
#[derive(Debug)]
pub struct FlatSpatialTree<C> {
    entries: HashMap<EntityId, (Position, u32, C)>,
    ghost_type: GhostType,
    bulk_loading: bool,
    max_depth: u32,
}

impl<C> Default for FlatSpatialTree<C> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            ghost_type: GhostType::None,
            bulk_loading: false,
            max_depth: 0,
        }
    }
}

impl<C> FlatSpatialTree<C> {
    /// Create an empty flat spatial tree.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Send + Sync> SpatialTree<C> for FlatSpatialTree<C> {
    fn insert(
        &mut self,
        id: EntityId,
        position: Position,
        level: u32,
        content: C,
        _bounds: Option<forest_geometry::TreeBounds>,
    ) -> Result<()> {
        if !position.is_finite() {
            return Err(ForestError::InvalidArgument(
                "position must be finite".into(),
            ));
        }
        if self.entries.contains_key(&id) {
            return Err(ForestError::DuplicateId);
        }
        self.max_depth = self.max_depth.max(level);
        self.entries.insert(id, (position, level, content));
        Ok(())
    }

    fn remove(&mut self, id: EntityId) -> bool {
        self.entries.remove(&id).is_some()
    }

    fn get(&self, id: EntityId) -> Option<C>
    where
        C: Clone,
    {
        self.entries.get(&id).map(|(_, _, c)| c.clone())
    }

    fn position_of(&self, id: EntityId) -> Option<Position> {
        self.entries.get(&id).map(|(p, _, _)| *p)
    }

    fn entities_with_positions(&self) -> Vec<(EntityId, Position)> {
        self.entries.iter().map(|(id, (p, _, _))| (*id, *p)).collect()
    }

    fn enable_bulk_loading(&mut self) {
        self.bulk_loading = true;
    }

    fn finalize_bulk_loading(&mut self) {
        self.bulk_loading = false;
    }

    fn ghost_type(&self) -> GhostType {
        self.ghost_type
    }

    fn set_ghost_type(&mut self, ghost_type: GhostType) {
        self.ghost_type = ghost_type;
    }

    fn entity_count(&self) -> usize {
        self.entries.len()
    }

    fn node_count(&self) -> usize {
        // A flat tree has no internal node hierarchy; every entry is its
        // own "node" for diagnostic purposes.
        self.entries.len()
    }

    fn max_depth(&self) -> u32 {
        self.max_depth
    }
}
