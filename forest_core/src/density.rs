// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-tree density sampling and the operation counter that gates how often
//! the adaptation engine re-checks it.

use std::sync::atomic::{AtomicU64, Ordering};

use forest_tree::{TreeId, TreeNode};

/// A single density sample for one tree.
#[derive(Clone, Debug, PartialEq)]
pub struct DensityRegion {
    /// The sampled tree.
    pub tree_id: TreeId,
    /// Entity count at sample time.
    pub entity_count: usize,
    /// The tree's bounds volume at sample time.
    pub volume: f32,
    /// Milliseconds since the Unix epoch at sample time.
    pub sampled_at_ms: u64,
}

impl DensityRegion {
    /// Entities per unit volume. `f32::INFINITY` if `volume` is zero or
    /// negative (a degenerate tree should never pass the subdivision volume
    /// floor, but density must stay well-defined regardless).
    pub fn density(&self) -> f32 {
        if self.volume > 0.0 {
            self.entity_count as f32 / self.volume
        } else {
            f32::INFINITY
        }
    }
}

/// Tracks how many structural operations (inserts, removes, migrations)
/// have occurred since the last density check, and samples per-tree
/// density on demand.
///
/// The counter is a single atomic rather than one per tree: the adaptation
/// engine's background cycle checks every tree each time it wakes, so the
/// interval gate is forest-wide, not per-tree.
#[derive(Debug, Default)]
pub struct DensityTracker {
    operations_since_check: AtomicU64,
}

impl DensityTracker {
    /// Create a tracker with a zeroed operation counter.
    pub fn new() -> Self {
        Self {
            operations_since_check: AtomicU64::new(0),
        }
    }

    /// Record one structural operation, returning the updated count.
    pub fn record_operation(&self) -> u64 {
        self.operations_since_check.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Whether at least `interval` operations have accumulated since the
    /// last [`DensityTracker::reset`].
    pub fn should_check(&self, interval: u64) -> bool {
        self.operations_since_check.load(Ordering::Relaxed) >= interval
    }

    /// Zero the operation counter, normally called right after a density
    /// check completes.
    pub fn reset(&self) {
        self.operations_since_check.store(0, Ordering::Relaxed);
    }

    /// Sample the density of one tree, using its assigned shape bounds for
    /// volume (falling back to its global entity-covering bounds if no
    /// shape bounds are assigned yet).
    pub fn sample<C>(&self, tree_id: &TreeId, node: &TreeNode<C>) -> DensityRegion {
        let volume = node
            .tree_bounds()
            .map(|b| b.volume())
            .or_else(|| node.global_bounds().map(|b| b.volume()))
            .unwrap_or(0.0);

        DensityRegion {
            tree_id: tree_id.clone(),
            entity_count: node.stats().entity_count,
            volume,
            sampled_at_ms: node.stats().last_update_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forest_geometry::{Aabb, Position, TreeBounds};
    use forest_geometry::CubicBounds;
    use forest_tree::FlatSpatialTree;

    #[test]
    fn counter_gates_on_interval() {
        let tracker = DensityTracker::new();
        assert!(!tracker.should_check(4));
        for _ in 0..4 {
            tracker.record_operation();
        }
        assert!(tracker.should_check(4));
        tracker.reset();
        assert!(!tracker.should_check(4));
    }

    #[test]
    fn density_is_count_over_volume() {
        let node = TreeNode::new(
            TreeId::new("t0"),
            Box::new(FlatSpatialTree::<u32>::new()),
        );
        node.set_tree_bounds(TreeBounds::Cubic(CubicBounds::new(Aabb::new(
            Position::zero(),
            Position::new(2.0, 2.0, 2.0),
        ))));
        {
            let mut idx = node.index();
            idx.insert(
                forest_tree::EntityId::from_raw(1),
                Position::new(1.0, 1.0, 1.0),
                0,
                7u32,
                None,
            )
            .unwrap();
        }
        node.refresh_statistics();

        let tracker = DensityTracker::new();
        let region = tracker.sample(node.tree_id(), &node);
        assert_eq!(region.entity_count, 1);
        assert_eq!(region.volume, 8.0);
        assert!((region.density() - 0.125).abs() < 1e-6);
    }

    #[test]
    fn zero_volume_density_is_infinite() {
        let region = DensityRegion {
            tree_id: TreeId::new("t0"),
            entity_count: 3,
            volume: 0.0,
            sampled_at_ms: 0,
        };
        assert!(region.density().is_infinite());
    }
}
