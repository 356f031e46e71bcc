// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end ghost replication scenario.

use forest_geometry::{Aabb, CubicBounds, Position, TreeBounds};
use forest_ghost::{GhostZoneManager, NeighborSource};
use forest_tree::{EntityId, TreeId};
use hashbrown::HashMap;
use parking_lot::RwLock;

/// A tiny, mutable two-tree topology: enough to exercise insert/remove
/// through [`NeighborSource`] without pulling in the full forest crate.
struct TwoTreeSource {
    bounds: HashMap<TreeId, TreeBounds>,
    neighbors: HashMap<TreeId, Vec<TreeId>>,
    entities: RwLock<HashMap<TreeId, Vec<(EntityId, Position, u32)>>>,
}

impl NeighborSource<u32> for TwoTreeSource {
    fn all_tree_ids(&self) -> Vec<TreeId> {
        self.bounds.keys().cloned().collect()
    }
    fn neighbor_tree_ids(&self, tree_id: &TreeId) -> Vec<TreeId> {
        self.neighbors.get(tree_id).cloned().unwrap_or_default()
    }
    fn tree_bounds(&self, tree_id: &TreeId) -> Option<TreeBounds> {
        self.bounds.get(tree_id).copied()
    }
    fn tree_entities(&self, tree_id: &TreeId) -> Vec<(EntityId, Position, u32)> {
        self.entities.read().get(tree_id).cloned().unwrap_or_default()
    }
}

fn cube(min: (f32, f32, f32), max: (f32, f32, f32)) -> TreeBounds {
    TreeBounds::Cubic(CubicBounds::new(Aabb::new(
        Position::new(min.0, min.1, min.2),
        Position::new(max.0, max.1, max.2),
    )))
}

#[test]
fn s4_ghost_replica_of_boundary_entity_tracks_insert_and_remove() {
    let tree1 = TreeId::new("tree1");
    let tree2 = TreeId::new("tree2");

    let mut bounds = HashMap::new();
    bounds.insert(tree1.clone(), cube((0.0, 0.0, 0.0), (10.0, 10.0, 10.0)));
    bounds.insert(tree2.clone(), cube((10.0, 0.0, 0.0), (20.0, 10.0, 10.0)));
    let mut neighbors = HashMap::new();
    neighbors.insert(tree1.clone(), vec![tree2.clone()]);
    neighbors.insert(tree2.clone(), vec![tree1.clone()]);

    let source = TwoTreeSource {
        bounds,
        neighbors,
        entities: RwLock::new(HashMap::new()),
    };

    let manager = GhostZoneManager::<u32>::new();
    manager.set_zone_width(tree1.clone(), tree2.clone(), 2.0);
    manager.set_zone_width(tree2.clone(), tree1.clone(), 2.0);

    let entity_x = EntityId::from_raw(1);
    let position_x = Position::new(9.5, 5.0, 5.0);
    source
        .entities
        .write()
        .insert(tree1.clone(), vec![(entity_x, position_x, 7)]);
    manager.update_ghost_zone(&tree2, &source);

    let ghosts = manager.ghosts_for(&tree2);
    assert_eq!(ghosts.len(), 1);
    assert_eq!(ghosts[0].entity_id, entity_x);
    assert_eq!(ghosts[0].source_tree_id, tree1);
    assert_eq!(ghosts[0].position, position_x);

    // Removing X from tree1 and re-syncing clears its ghost from tree2.
    source.entities.write().remove(&tree1);
    manager.update_ghost_zone(&tree2, &source);
    assert!(manager.ghosts_for(&tree2).is_empty());
}
