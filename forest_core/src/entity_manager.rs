// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The entity manager: a façade that hides tree selection behind an
//! [`AssignmentStrategy`], so callers insert by position and never choose a
//! tree id themselves.

use std::sync::atomic::{AtomicUsize, Ordering};

use forest_geometry::Position;
use forest_tree::TreeId;
use hashbrown::HashMap;
use parking_lot::RwLock;

/// Decides which tree a new entity at a given position should be assigned
/// to, given the forest's current set of leaf trees (ids with bounds).
pub trait AssignmentStrategy: Send + Sync {
    /// Choose a tree id for `position` among `candidates` (leaf tree id and
    /// bounds-projection pairs). Returns `None` if `candidates` is empty.
    fn select(&self, position: &Position, candidates: &[(TreeId, forest_geometry::Aabb)]) -> Option<TreeId>;

    /// Decide whether an entity currently in `current`, moving to
    /// `new_position`, should be re-homed to a different tree.
    ///
    /// Returns `None` to update the entity in place within `current`, or
    /// `Some(tree_id)` for the tree it should move to (which may be
    /// `current` itself, in which case the caller treats it as an in-place
    /// update rather than a migration).
    fn should_migrate(
        &self,
        current: &TreeId,
        new_position: &Position,
        candidates: &[(TreeId, forest_geometry::Aabb)],
    ) -> Option<TreeId>;
}

/// Cycles through the candidate list regardless of position, ignoring
/// geometry entirely. Useful for synthetic load distribution tests and for
/// forests that intentionally treat trees as interchangeable shards.
#[derive(Debug, Default)]
pub struct RoundRobinStrategy {
    next: AtomicUsize,
}

impl RoundRobinStrategy {
    /// Create a round-robin strategy starting at the first candidate.
    pub fn new() -> Self {
        Self::default()
    }
}

impl AssignmentStrategy for RoundRobinStrategy {
    fn select(&self, _position: &Position, candidates: &[(TreeId, forest_geometry::Aabb)]) -> Option<TreeId> {
        if candidates.is_empty() {
            return None;
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % candidates.len();
        Some(candidates[i].0.clone())
    }

    fn should_migrate(
        &self,
        _current: &TreeId,
        _new_position: &Position,
        _candidates: &[(TreeId, forest_geometry::Aabb)],
    ) -> Option<TreeId> {
        None
    }
}

/// Picks the first candidate whose bounds contain the position; falls back
/// to the candidate whose bounds are closest (by distance from the point to
/// the box) if none contain it, so a point slightly outside every leaf due
/// to floating-point slack still lands somewhere.
#[derive(Debug, Default)]
pub struct SpatialBoundsStrategy;

impl SpatialBoundsStrategy {
    /// Create a spatial-bounds assignment strategy.
    pub fn new() -> Self {
        Self
    }
}

impl AssignmentStrategy for SpatialBoundsStrategy {
    fn select(&self, position: &Position, candidates: &[(TreeId, forest_geometry::Aabb)]) -> Option<TreeId> {
        if let Some((id, _)) = candidates.iter().find(|(_, aabb)| aabb.contains_point(position)) {
            return Some(id.clone());
        }
        candidates
            .iter()
            .min_by(|(_, a), (_, b)| {
                a.distance_squared_to_point(position)
                    .total_cmp(&b.distance_squared_to_point(position))
            })
            .map(|(id, _)| id.clone())
    }

    fn should_migrate(
        &self,
        current: &TreeId,
        new_position: &Position,
        candidates: &[(TreeId, forest_geometry::Aabb)],
    ) -> Option<TreeId> {
        let still_contained = candidates
            .iter()
            .find(|(id, _)| id == current)
            .is_some_and(|(_, aabb)| aabb.contains_point(new_position));
        if still_contained {
            return None;
        }
        self.select(new_position, candidates)
    }
}

/// Per-entity bookkeeping: which tree currently owns it.
///
/// The forest's `TreeNode`s are the source of truth for entity storage;
/// this map only lets callers look up "which tree is entity X in" without
/// scanning every tree, and is kept in lockstep with insert/remove/migrate.
#[derive(Debug, Default)]
pub struct EntityManager {
    locations: RwLock<HashMap<forest_tree::EntityId, TreeId>>,
}

impl EntityManager {
    /// Create an empty entity manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `entity` is now stored in `tree_id`.
    pub fn record(&self, entity: forest_tree::EntityId, tree_id: TreeId) {
        self.locations.write().insert(entity, tree_id);
    }

    /// Forget `entity`'s location.
    pub fn forget(&self, entity: forest_tree::EntityId) {
        self.locations.write().remove(&entity);
    }

    /// The tree currently recorded as owning `entity`, if any.
    pub fn locate(&self, entity: forest_tree::EntityId) -> Option<TreeId> {
        self.locations.read().get(&entity).cloned()
    }

    /// Alias for [`EntityManager::locate`], named to match the entity
    /// manager façade's external naming.
    pub fn get_entity_location(&self, entity: forest_tree::EntityId) -> Option<TreeId> {
        self.locate(entity)
    }

    /// The number of tracked entities owned by each tree, for load/skew
    /// diagnostics.
    pub fn get_entity_distribution(&self) -> HashMap<TreeId, usize> {
        let mut distribution = HashMap::new();
        for tree_id in self.locations.read().values() {
            *distribution.entry(tree_id.clone()).or_insert(0) += 1;
        }
        distribution
    }

    /// Number of entities tracked.
    pub fn len(&self) -> usize {
        self.locations.read().len()
    }

    /// Whether no entities are tracked.
    pub fn is_empty(&self) -> bool {
        self.locations.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forest_geometry::Aabb;
    use forest_tree::EntityId;

    fn candidates() -> Vec<(TreeId, Aabb)> {
        vec![
            (TreeId::new("a"), Aabb::new(Position::zero(), Position::new(1.0, 1.0, 1.0))),
            (
                TreeId::new("b"),
                Aabb::new(Position::new(1.0, 0.0, 0.0), Position::new(2.0, 1.0, 1.0)),
            ),
        ]
    }

    #[test]
    fn round_robin_cycles_through_candidates() {
        let strategy = RoundRobinStrategy::new();
        let cands = candidates();
        let a = strategy.select(&Position::zero(), &cands).unwrap();
        let b = strategy.select(&Position::zero(), &cands).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn spatial_bounds_picks_containing_candidate() {
        let strategy = SpatialBoundsStrategy::new();
        let cands = candidates();
        let picked = strategy.select(&Position::new(1.5, 0.5, 0.5), &cands).unwrap();
        assert_eq!(picked, TreeId::new("b"));
    }

    #[test]
    fn spatial_bounds_falls_back_to_closest_when_outside_all() {
        let strategy = SpatialBoundsStrategy::new();
        let cands = candidates();
        let picked = strategy.select(&Position::new(100.0, 100.0, 100.0), &cands).unwrap();
        assert_eq!(picked, TreeId::new("b"));
    }

    #[test]
    fn entity_manager_tracks_locations() {
        let manager = EntityManager::new();
        let e = EntityId::from_raw(1);
        manager.record(e, TreeId::new("a"));
        assert_eq!(manager.locate(e), Some(TreeId::new("a")));
        assert_eq!(manager.get_entity_location(e), Some(TreeId::new("a")));
        manager.forget(e);
        assert_eq!(manager.locate(e), None);
    }

    #[test]
    fn entity_distribution_counts_per_tree() {
        let manager = EntityManager::new();
        manager.record(EntityId::from_raw(1), TreeId::new("a"));
        manager.record(EntityId::from_raw(2), TreeId::new("a"));
        manager.record(EntityId::from_raw(3), TreeId::new("b"));

        let distribution = manager.get_entity_distribution();
        assert_eq!(distribution.get(&TreeId::new("a")), Some(&2));
        assert_eq!(distribution.get(&TreeId::new("b")), Some(&1));
    }

    #[test]
    fn round_robin_never_migrates() {
        let strategy = RoundRobinStrategy::new();
        let cands = candidates();
        assert_eq!(
            strategy.should_migrate(&TreeId::new("a"), &Position::new(1.5, 0.5, 0.5), &cands),
            None
        );
    }

    #[test]
    fn spatial_bounds_migrates_when_position_leaves_current_tree() {
        let strategy = SpatialBoundsStrategy::new();
        let cands = candidates();
        assert_eq!(
            strategy.should_migrate(&TreeId::new("a"), &Position::new(1.5, 0.5, 0.5), &cands),
            Some(TreeId::new("b"))
        );
        assert_eq!(
            strategy.should_migrate(&TreeId::new("a"), &Position::new(0.5, 0.5, 0.5), &cands),
            None
        );
    }
}
