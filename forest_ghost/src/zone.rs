// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ghost zone relations and replicated ghost entities.

use forest_geometry::{Aabb, Position, TreeBounds};
use forest_tree::{EntityId, TreeId};

/// A directed ghost-replication relationship: entities near the boundary
/// `owner_tree_id` shares with `neighbor_tree_id`, within `width`, are
/// replicated into `neighbor_tree_id`'s ghost layer.
#[derive(Clone, Debug, PartialEq)]
pub struct GhostZoneRelation {
    /// The tree whose entities are being replicated out.
    pub owner_tree_id: TreeId,
    /// The tree receiving the replicated ghost entities.
    pub neighbor_tree_id: TreeId,
    /// How far from the shared boundary an entity must be to qualify.
    pub width: f32,
}

impl GhostZoneRelation {
    /// Construct a relation with the given width.
    pub fn new(owner_tree_id: TreeId, neighbor_tree_id: TreeId, width: f32) -> Self {
        Self {
            owner_tree_id,
            neighbor_tree_id,
            width,
        }
    }
}

/// One entity replicated into a neighboring tree's ghost layer.
#[derive(Clone, Debug, PartialEq)]
pub struct GhostEntity<C> {
    /// The entity's id in its owning tree.
    pub entity_id: EntityId,
    /// The entity's real position.
    pub position: Position,
    /// A copy of the entity's content at the time of the last sync.
    pub content: C,
    /// The tree that actually owns this entity.
    pub source_tree_id: TreeId,
    /// The tree this ghost copy was replicated into.
    pub replicated_into: TreeId,
}

/// Whether an entity at `position`, owned by a tree with bounds
/// `owner_bounds`, should be replicated into a neighbor with bounds
/// `neighbor_bounds` under a ghost zone of the given `width`.
///
/// When `bounds` is given (the entity has its own bounding volume, not just
/// a point), the test compares the two boxes' axis separations against
/// `width` directly. Otherwise it falls back to the entity's point distance
/// to the neighbor's bounding volume: true when that distance is at most
/// `width` — i.e. it is within `width` of crossing into the neighbor,
/// regardless of which shared face/edge/vertex the two trees touch along.
pub fn in_ghost_zone(position: &Position, neighbor_bounds: &TreeBounds, width: f32, bounds: Option<Aabb>) -> bool {
    if width < 0.0 || !position.is_finite() {
        return false;
    }
    let neighbor_aabb = neighbor_bounds.aabb_projection();
    match bounds {
        Some(entity_aabb) => entity_aabb.axis_separations(&neighbor_aabb).into_iter().all(|gap| gap <= width),
        None => neighbor_aabb.distance_squared_to_point(position) <= width * width,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forest_geometry::{Aabb, CubicBounds};

    fn cubic(min: (f32, f32, f32), max: (f32, f32, f32)) -> TreeBounds {
        TreeBounds::Cubic(CubicBounds::new(Aabb::new(
            Position::new(min.0, min.1, min.2),
            Position::new(max.0, max.1, max.2),
        )))
    }

    #[test]
    fn point_near_boundary_is_in_zone() {
        let neighbor = cubic((10.0, 0.0, 0.0), (20.0, 10.0, 10.0));
        let near = Position::new(9.5, 5.0, 5.0);
        assert!(in_ghost_zone(&near, &neighbor, 1.0, None));
    }

    #[test]
    fn point_far_from_boundary_is_not_in_zone() {
        let neighbor = cubic((10.0, 0.0, 0.0), (20.0, 10.0, 10.0));
        let far = Position::new(0.0, 5.0, 5.0);
        assert!(!in_ghost_zone(&far, &neighbor, 1.0, None));
    }

    #[test]
    fn point_already_inside_neighbor_is_in_zone() {
        let neighbor = cubic((10.0, 0.0, 0.0), (20.0, 10.0, 10.0));
        let inside = Position::new(15.0, 5.0, 5.0);
        assert!(in_ghost_zone(&inside, &neighbor, 0.0, None));
    }

    #[test]
    fn non_finite_position_is_never_in_zone() {
        let neighbor = cubic((10.0, 0.0, 0.0), (20.0, 10.0, 10.0));
        let nan = Position::new(f32::NAN, 5.0, 5.0);
        assert!(!in_ghost_zone(&nan, &neighbor, 100.0, None));
    }

    #[test]
    fn bounded_entity_within_gap_is_in_zone() {
        let neighbor = cubic((10.0, 0.0, 0.0), (20.0, 10.0, 10.0));
        let position = Position::new(8.5, 5.0, 5.0);
        let entity_bounds = Aabb::new(Position::new(8.0, 4.5, 4.5), Position::new(9.0, 5.5, 5.5));
        assert!(in_ghost_zone(&position, &neighbor, 1.0, Some(entity_bounds)));
    }

    #[test]
    fn bounded_entity_beyond_gap_is_not_in_zone() {
        let neighbor = cubic((10.0, 0.0, 0.0), (20.0, 10.0, 10.0));
        let position = Position::new(0.0, 5.0, 5.0);
        let entity_bounds = Aabb::new(Position::new(-0.5, 4.5, 4.5), Position::new(0.5, 5.5, 5.5));
        assert!(!in_ghost_zone(&position, &neighbor, 1.0, Some(entity_bounds)));
    }
}
