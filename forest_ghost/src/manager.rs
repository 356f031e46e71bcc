// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The ghost zone manager: computed ghost-entity caches per tree, refreshed
//! from a [`NeighborSource`] snapshot.

use forest_geometry::{Aabb, Position};
use forest_tree::{EntityId, TreeId};
use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::neighbor_source::NeighborSource;
use crate::zone::{in_ghost_zone, GhostEntity, GhostZoneRelation};

/// Default ghost zone width used for a neighbor pair with no explicit
/// [`GhostZoneRelation`] registered.
pub const DEFAULT_GHOST_ZONE_WIDTH: f32 = 1.0;

/// Maintains, per tree, the set of ghost entities replicated into it from
/// its neighbors.
///
/// Ghost entities are a cache, not a second source of truth: every refresh
/// recomputes them from scratch off a [`NeighborSource`] snapshot, so a
/// stale ghost layer is only ever stale until the next
/// [`GhostZoneManager::synchronize_all_ghost_zones`] call, never
/// incorrect relative to the snapshot it was built from.
pub struct GhostZoneManager<C> {
    relations: RwLock<HashMap<(TreeId, TreeId), GhostZoneRelation>>,
    ghosts: RwLock<HashMap<TreeId, Vec<GhostEntity<C>>>>,
}

impl<C> Default for GhostZoneManager<C> {
    fn default() -> Self {
        Self {
            relations: RwLock::new(HashMap::new()),
            ghosts: RwLock::new(HashMap::new()),
        }
    }
}

impl<C: Clone + Send + Sync> GhostZoneManager<C> {
    /// Create an empty ghost zone manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or overwrite the ghost zone width for the ordered pair
    /// `(owner, neighbor)`. Unregistered pairs use
    /// [`DEFAULT_GHOST_ZONE_WIDTH`].
    pub fn set_zone_width(&self, owner: TreeId, neighbor: TreeId, width: f32) {
        self.relations.write().insert(
            (owner.clone(), neighbor.clone()),
            GhostZoneRelation::new(owner, neighbor, width),
        );
    }

    fn width_for(&self, owner: &TreeId, neighbor: &TreeId) -> f32 {
        self.relations
            .read()
            .get(&(owner.clone(), neighbor.clone()))
            .map(|r| r.width)
            .unwrap_or(DEFAULT_GHOST_ZONE_WIDTH)
    }

    /// Register a bidirectional ghost zone relation between `id1` and
    /// `id2`, using `width` (or [`DEFAULT_GHOST_ZONE_WIDTH`] if `None`) in
    /// both directions.
    pub fn establish_ghost_zone(&self, id1: TreeId, id2: TreeId, width: Option<f32>) {
        let width = width.unwrap_or(DEFAULT_GHOST_ZONE_WIDTH);
        self.set_zone_width(id1.clone(), id2.clone(), width);
        self.set_zone_width(id2, id1, width);
    }

    /// Tear down the ghost zone relation between `id1` and `id2` in both
    /// directions, and purge any cached ghost replicated under it. Leaves
    /// no ghosts with source `id1` in `id2` or vice versa.
    pub fn remove_ghost_zone(&self, id1: &TreeId, id2: &TreeId) {
        self.relations.write().remove(&(id1.clone(), id2.clone()));
        self.relations.write().remove(&(id2.clone(), id1.clone()));

        let mut ghosts = self.ghosts.write();
        if let Some(list) = ghosts.get_mut(id2) {
            list.retain(|g| g.source_tree_id != *id1);
        }
        if let Some(list) = ghosts.get_mut(id1) {
            list.retain(|g| g.source_tree_id != *id2);
        }
    }

    /// Recompute every tree's ghost entity cache from `source`.
    ///
    /// For each tree, for each of its neighbors, entities of the tree that
    /// fall within the owner-to-neighbor ghost zone width are replicated
    /// into the neighbor's cache.
    pub fn synchronize_all_ghost_zones(&self, source: &dyn NeighborSource<C>) {
        let mut next: HashMap<TreeId, Vec<GhostEntity<C>>> = HashMap::new();

        for owner_id in source.all_tree_ids() {
            let entities = source.tree_entities(&owner_id);
            for neighbor_id in source.neighbor_tree_ids(&owner_id) {
                let Some(neighbor_bounds) = source.tree_bounds(&neighbor_id) else {
                    continue;
                };
                let width = self.width_for(&owner_id, &neighbor_id);
                for (entity_id, position, content) in &entities {
                    if in_ghost_zone(position, &neighbor_bounds, width, None) {
                        next.entry(neighbor_id.clone()).or_default().push(GhostEntity {
                            entity_id: *entity_id,
                            position: *position,
                            content: content.clone(),
                            source_tree_id: owner_id.clone(),
                            replicated_into: neighbor_id.clone(),
                        });
                    }
                }
            }
        }

        log::debug!(
            "ghost zone sync produced {} populated ghost caches",
            next.len()
        );
        *self.ghosts.write() = next;
    }

    /// Refresh only `tree_id`'s incoming ghost cache (entities replicated
    /// into it from its neighbors), leaving every other tree's cache
    /// untouched.
    pub fn update_ghost_zone(&self, tree_id: &TreeId, source: &dyn NeighborSource<C>) {
        let mut incoming = Vec::new();
        let Some(tree_bounds) = source.tree_bounds(tree_id) else {
            self.ghosts.write().remove(tree_id);
            return;
        };

        for owner_id in source.neighbor_tree_ids(tree_id) {
            let width = self.width_for(&owner_id, tree_id);
            for (entity_id, position, content) in source.tree_entities(&owner_id) {
                if in_ghost_zone(&position, &tree_bounds, width, None) {
                    incoming.push(GhostEntity {
                        entity_id,
                        position,
                        content,
                        source_tree_id: owner_id.clone(),
                        replicated_into: tree_id.clone(),
                    });
                }
            }
        }

        self.ghosts.write().insert(tree_id.clone(), incoming);
    }

    /// The ghost entities currently cached as replicated into `tree_id`.
    pub fn ghosts_for(&self, tree_id: &TreeId) -> Vec<GhostEntity<C>> {
        self.ghosts.read().get(tree_id).cloned().unwrap_or_default()
    }

    /// Alias for [`GhostZoneManager::ghosts_for`], named to match the ghost
    /// manager's external naming.
    pub fn get_ghost_entities(&self, tree_id: &TreeId) -> Vec<GhostEntity<C>> {
        self.ghosts_for(tree_id)
    }

    /// Incrementally update one entity's ghost replicas after it was
    /// inserted, moved, or had its content changed in `source_tree_id`.
    ///
    /// For each ghost-zone neighbor of `source_tree_id`: replaces any prior
    /// ghost of `(entity_id, source_tree_id)` with a fresh snapshot if the
    /// entity now qualifies (per [`in_ghost_zone`], using `bounds` when
    /// given), or drops it if the entity no longer qualifies.
    pub fn update_ghost_entity(
        &self,
        entity_id: EntityId,
        source_tree_id: &TreeId,
        position: Position,
        bounds: Option<Aabb>,
        content: C,
        source: &dyn NeighborSource<C>,
    ) {
        let mut ghosts = self.ghosts.write();
        for neighbor_id in source.neighbor_tree_ids(source_tree_id) {
            let Some(neighbor_bounds) = source.tree_bounds(&neighbor_id) else {
                continue;
            };
            let width = self.width_for(source_tree_id, &neighbor_id);
            let qualifies = in_ghost_zone(&position, &neighbor_bounds, width, bounds);

            let list = ghosts.entry(neighbor_id.clone()).or_default();
            list.retain(|g| !(g.entity_id == entity_id && g.source_tree_id == *source_tree_id));
            if qualifies {
                list.push(GhostEntity {
                    entity_id,
                    position,
                    content: content.clone(),
                    source_tree_id: source_tree_id.clone(),
                    replicated_into: neighbor_id,
                });
            }
        }
    }

    /// Drop every cached ghost of `entity_id` sourced from `source_tree_id`,
    /// from every neighbor's cache.
    pub fn remove_ghost_entity(&self, entity_id: EntityId, source_tree_id: &TreeId) {
        let mut ghosts = self.ghosts.write();
        for list in ghosts.values_mut() {
            list.retain(|g| !(g.entity_id == entity_id && g.source_tree_id == *source_tree_id));
        }
    }

    /// Total number of ghost entities cached across every tree.
    pub fn total_ghost_count(&self) -> usize {
        self.ghosts.read().values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forest_geometry::{Aabb, CubicBounds, Position, TreeBounds};
    use forest_tree::EntityId;

    struct FakeSource {
        bounds: HashMap<TreeId, TreeBounds>,
        neighbors: HashMap<TreeId, Vec<TreeId>>,
        entities: HashMap<TreeId, Vec<(EntityId, Position, u32)>>,
    }

    impl NeighborSource<u32> for FakeSource {
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
            self.entities.get(tree_id).cloned().unwrap_or_default()
        }
    }

    fn cubic(min: (f32, f32, f32), max: (f32, f32, f32)) -> TreeBounds {
        TreeBounds::Cubic(CubicBounds::new(Aabb::new(
            Position::new(min.0, min.1, min.2),
            Position::new(max.0, max.1, max.2),
        )))
    }

    #[test]
    fn synchronize_replicates_boundary_entities_into_neighbor() {
        let left = TreeId::new("left");
        let right = TreeId::new("right");

        let mut bounds = HashMap::new();
        bounds.insert(left.clone(), cubic((0.0, 0.0, 0.0), (10.0, 10.0, 10.0)));
        bounds.insert(right.clone(), cubic((10.0, 0.0, 0.0), (20.0, 10.0, 10.0)));

        let mut neighbors = HashMap::new();
        neighbors.insert(left.clone(), vec![right.clone()]);
        neighbors.insert(right.clone(), vec![left.clone()]);

        let mut entities = HashMap::new();
        entities.insert(
            left.clone(),
            vec![
                (EntityId::from_raw(1), Position::new(9.5, 5.0, 5.0), 100u32),
                (EntityId::from_raw(2), Position::new(0.5, 5.0, 5.0), 200u32),
            ],
        );

        let source = FakeSource {
            bounds,
            neighbors,
            entities,
        };

        let manager = GhostZoneManager::<u32>::new();
        manager.set_zone_width(left.clone(), right.clone(), 1.0);
        manager.synchronize_all_ghost_zones(&source);

        let ghosts = manager.ghosts_for(&right);
        assert_eq!(ghosts.len(), 1);
        assert_eq!(ghosts[0].entity_id, EntityId::from_raw(1));
        assert_eq!(ghosts[0].source_tree_id, left);
    }

    #[test]
    fn unregistered_pair_uses_default_width() {
        let left = TreeId::new("left");
        let right = TreeId::new("right");
        let mut bounds = HashMap::new();
        bounds.insert(left.clone(), cubic((0.0, 0.0, 0.0), (10.0, 10.0, 10.0)));
        bounds.insert(right.clone(), cubic((10.0, 0.0, 0.0), (20.0, 10.0, 10.0)));
        let mut neighbors = HashMap::new();
        neighbors.insert(left.clone(), vec![right.clone()]);
        let mut entities = HashMap::new();
        entities.insert(
            left.clone(),
            vec![(EntityId::from_raw(1), Position::new(9.9, 5.0, 5.0), 7u32)],
        );
        let source = FakeSource {
            bounds,
            neighbors,
            entities,
        };

        let manager = GhostZoneManager::<u32>::new();
        manager.synchronize_all_ghost_zones(&source);
        assert_eq!(manager.ghosts_for(&right).len(), 1);
    }

    fn two_tree_source(left: &TreeId, right: &TreeId) -> FakeSource {
        let mut bounds = HashMap::new();
        bounds.insert(left.clone(), cubic((0.0, 0.0, 0.0), (10.0, 10.0, 10.0)));
        bounds.insert(right.clone(), cubic((10.0, 0.0, 0.0), (20.0, 10.0, 10.0)));
        let mut neighbors = HashMap::new();
        neighbors.insert(left.clone(), vec![right.clone()]);
        neighbors.insert(right.clone(), vec![left.clone()]);
        FakeSource {
            bounds,
            neighbors,
            entities: HashMap::new(),
        }
    }

    #[test]
    fn establish_then_remove_ghost_zone_leaves_no_ghosts() {
        let left = TreeId::new("left");
        let right = TreeId::new("right");
        let source = two_tree_source(&left, &right);

        let manager = GhostZoneManager::<u32>::new();
        manager.establish_ghost_zone(left.clone(), right.clone(), Some(1.0));

        manager.update_ghost_entity(
            EntityId::from_raw(1),
            &left,
            Position::new(9.5, 5.0, 5.0),
            None,
            100u32,
            &source,
        );
        assert_eq!(manager.get_ghost_entities(&right).len(), 1);

        manager.remove_ghost_zone(&left, &right);
        assert!(manager.get_ghost_entities(&right).is_empty());
        assert!(manager.get_ghost_entities(&left).is_empty());
    }

    #[test]
    fn update_ghost_entity_replaces_stale_ghost_and_removal_drops_it() {
        let left = TreeId::new("left");
        let right = TreeId::new("right");
        let source = two_tree_source(&left, &right);

        let manager = GhostZoneManager::<u32>::new();
        manager.establish_ghost_zone(left.clone(), right.clone(), Some(1.0));

        let entity = EntityId::from_raw(1);
        manager.update_ghost_entity(entity, &left, Position::new(9.5, 5.0, 5.0), None, 1u32, &source);
        assert_eq!(manager.get_ghost_entities(&right)[0].content, 1u32);

        // Entity moves away from the boundary: it should drop out of the zone.
        manager.update_ghost_entity(entity, &left, Position::new(0.0, 5.0, 5.0), None, 2u32, &source);
        assert!(manager.get_ghost_entities(&right).is_empty());

        // Move back in, then remove outright.
        manager.update_ghost_entity(entity, &left, Position::new(9.5, 5.0, 5.0), None, 3u32, &source);
        assert_eq!(manager.get_ghost_entities(&right).len(), 1);
        manager.remove_ghost_entity(entity, &left);
        assert!(manager.get_ghost_entities(&right).is_empty());
    }
}
