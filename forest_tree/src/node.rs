// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `TreeNode`: per-tree forest metadata layered on top of a [`SpatialTree`].

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use forest_geometry::{Aabb, Position, TreeBounds};
use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use crate::entity::EntityId;
use crate::spatial_tree::SpatialTree;
use crate::tree_id::TreeId;

/// An opaque metadata value attached to a [`TreeNode`].
///
/// A small closed set rather than a trait object: forest metadata is
/// diagnostic/informational (creation timestamps, strategy tags, operator
/// annotations), not an extension point, so there is no need to pay for
/// dynamic dispatch or `Any` downcasting here.
#[derive(Clone, Debug, PartialEq)]
pub enum MetadataValue {
    /// A string value.
    Text(String),
    /// An integer value.
    Int(i64),
    /// A millisecond timestamp.
    TimestampMs(u64),
}

/// Snapshot statistics for a tree, refreshed from its [`SpatialTree`].
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TreeStats {
    /// Number of entities currently stored.
    pub entity_count: usize,
    /// Maximum depth reached by the internal structure.
    pub max_depth: u32,
    /// Number of internal nodes.
    pub node_count: usize,
    /// Milliseconds since the Unix epoch of the last refresh.
    pub last_update_ms: u64,
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Per-tree forest metadata: identity, bounds, hierarchy position, neighbor
/// set, statistics, and a generic metadata map, layered over an abstract
/// [`SpatialTree`] index.
///
/// Field-level concurrency (see the crate's concurrency design):
/// - `global_bounds` is a monitor (single writer at a time) guarding
///   read-modify-write expansion.
/// - `subdivided` is a single atomic bool; compare-and-set from `false` to
///   `true` is the sole race-free subdivision gate (see
///   [`TreeNode::try_mark_subdivided`]).
/// - `neighbors` and `child_tree_ids` are reader-preferring `RwLock`s: safe
///   for concurrent readers with infrequent writers.
/// - `parent_tree_id` and `hierarchy_level` are written once during
///   parent-child linking and read thereafter.
pub struct TreeNode<C> {
    tree_id: TreeId,
    index: Mutex<Box<dyn SpatialTree<C>>>,
    global_bounds: Mutex<Option<Aabb>>,
    tree_bounds: RwLock<Option<TreeBounds>>,
    neighbors: RwLock<hashbrown::HashSet<TreeId>>,
    parent_tree_id: RwLock<Option<TreeId>>,
    child_tree_ids: RwLock<SmallVec<[TreeId; 8]>>,
    hierarchy_level: AtomicU32,
    subdivided: AtomicBool,
    stats: Mutex<TreeStats>,
    metadata: RwLock<HashMap<String, MetadataValue>>,
    assigned_server_id: RwLock<Option<String>>,
}

impl<C> std::fmt::Debug for TreeNode<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeNode")
            .field("tree_id", &self.tree_id)
            .field("hierarchy_level", &self.hierarchy_level())
            .field("subdivided", &self.is_subdivided())
            .field("children", &self.child_tree_ids.read().len())
            .finish_non_exhaustive()
    }
}

impl<C> TreeNode<C> {
    /// Create a new root-level tree node wrapping `index`.
    pub fn new(tree_id: TreeId, index: Box<dyn SpatialTree<C>>) -> Self {
        Self {
            tree_id,
            index: Mutex::new(index),
            global_bounds: Mutex::new(None),
            tree_bounds: RwLock::new(None),
            neighbors: RwLock::new(hashbrown::HashSet::new()),
            parent_tree_id: RwLock::new(None),
            child_tree_ids: RwLock::new(SmallVec::new()),
            hierarchy_level: AtomicU32::new(0),
            subdivided: AtomicBool::new(false),
            stats: Mutex::new(TreeStats::default()),
            metadata: RwLock::new(HashMap::new()),
            assigned_server_id: RwLock::new(None),
        }
    }

    /// This tree's id.
    #[inline]
    pub fn tree_id(&self) -> &TreeId {
        &self.tree_id
    }

    /// Lock and access the underlying spatial index.
    pub fn index(&self) -> parking_lot::MutexGuard<'_, Box<dyn SpatialTree<C>>> {
        self.index.lock()
    }

    /// The tree's global bounds (the AABB guaranteed to contain every
    /// entity it stores), if initialized.
    pub fn global_bounds(&self) -> Option<Aabb> {
        *self.global_bounds.lock()
    }

    /// Expand `global_bounds` to cover `aabb`, initializing it on first
    /// call.
    ///
    /// Monotonic: the resulting box always contains the previous one (and
    /// `aabb`).
    pub fn expand_global_bounds(&self, aabb: Aabb) {
        let mut guard = self.global_bounds.lock();
        *guard = Some(match *guard {
            Some(existing) => existing.expand_to_cover(&aabb),
            None => aabb,
        });
    }

    /// The tree's shape bounds (cubic or tetrahedral), if assigned.
    pub fn tree_bounds(&self) -> Option<TreeBounds> {
        *self.tree_bounds.read()
    }

    /// Assign the tree's shape bounds. Normally set once, at creation.
    pub fn set_tree_bounds(&self, bounds: TreeBounds) {
        *self.tree_bounds.write() = Some(bounds);
    }

    /// Whether the underlying index is a tetree (tetrahedral bounds).
    pub fn is_tetrahedral(&self) -> bool {
        self.tree_bounds
            .read()
            .as_ref()
            .is_some_and(TreeBounds::is_tetrahedral)
    }

    /// The tree's current neighbor set.
    pub fn neighbors(&self) -> Vec<TreeId> {
        self.neighbors.read().iter().cloned().collect()
    }

    /// Add a neighbor relationship (idempotent).
    pub fn add_neighbor(&self, id: TreeId) {
        self.neighbors.write().insert(id);
    }

    /// Remove a neighbor relationship.
    pub fn remove_neighbor(&self, id: &TreeId) {
        self.neighbors.write().remove(id);
    }

    /// The tree's parent, if any.
    pub fn parent_tree_id(&self) -> Option<TreeId> {
        self.parent_tree_id.read().clone()
    }

    /// Set the tree's parent. Normally called once, during hierarchy
    /// linking in subdivision.
    pub fn set_parent_tree_id(&self, id: TreeId) {
        *self.parent_tree_id.write() = Some(id);
    }

    /// The tree's child ids, in subdivision order.
    pub fn child_tree_ids(&self) -> Vec<TreeId> {
        self.child_tree_ids.read().iter().cloned().collect()
    }

    /// Append a child id.
    pub fn add_child_tree_id(&self, id: TreeId) {
        self.child_tree_ids.write().push(id);
    }

    /// This tree's hierarchy level (`0` for roots).
    #[inline]
    pub fn hierarchy_level(&self) -> u32 {
        self.hierarchy_level.load(Ordering::Acquire)
    }

    /// Set the tree's hierarchy level. Normally called once, during
    /// parent-child linking.
    pub fn set_hierarchy_level(&self, level: u32) {
        self.hierarchy_level.store(level, Ordering::Release);
    }

    /// Whether this tree has no children.
    pub fn is_leaf(&self) -> bool {
        self.child_tree_ids.read().is_empty()
    }

    /// Whether this tree has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_tree_id.read().is_none()
    }

    /// Whether this tree has already completed subdivision.
    pub fn is_subdivided(&self) -> bool {
        self.subdivided.load(Ordering::Acquire)
    }

    /// Atomically mark this tree as subdivided if it was not already.
    ///
    /// Returns `true` exactly once per [`TreeNode`] lifetime: compare-and-set
    /// from `false` to `true` is the single race-free gate for subdivision.
    /// The thread that receives `true` performs the split; every other
    /// caller (racing or sequential) receives `false` and must not create
    /// children.
    pub fn try_mark_subdivided(&self) -> bool {
        self.subdivided
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// The tree's last-refreshed statistics.
    pub fn stats(&self) -> TreeStats {
        *self.stats.lock()
    }

    /// Refresh `stats` by querying the underlying [`SpatialTree`].
    pub fn refresh_statistics(&self) {
        let index = self.index.lock();
        let mut stats = self.stats.lock();
        stats.entity_count = index.entity_count();
        stats.node_count = index.node_count();
        stats.max_depth = index.max_depth();
        stats.last_update_ms = now_ms();
    }

    /// Read one metadata value.
    pub fn metadata(&self, key: &str) -> Option<MetadataValue> {
        self.metadata.read().get(key).cloned()
    }

    /// Set one metadata value.
    pub fn set_metadata(&self, key: impl Into<String>, value: MetadataValue) {
        self.metadata.write().insert(key.into(), value);
    }

    /// The optional informational server assignment for this tree.
    pub fn assigned_server_id(&self) -> Option<String> {
        self.assigned_server_id.read().clone()
    }

    /// Set the informational server assignment.
    pub fn set_assigned_server_id(&self, id: Option<String>) {
        *self.assigned_server_id.write() = id;
    }

    /// All entity positions currently stored by this tree, equivalent to
    /// `self.index().entities_with_positions()` but without holding the
    /// lock across the call site.
    pub fn entity_positions(&self) -> Vec<(EntityId, Position)> {
        self.index.lock().entities_with_positions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flat::FlatSpatialTree;

    fn node() -> TreeNode<u32> {
        TreeNode::new(TreeId::new("root"), Box::new(FlatSpatialTree::<u32>::new()))
    }

    #[test]
    fn leaf_and_root_defaults() {
        let n = node();
        assert!(n.is_leaf());
        assert!(n.is_root());
        assert!(!n.is_subdivided());
    }

    #[test]
    fn global_bounds_expansion_is_monotonic() {
        let n = node();
        let a = Aabb::new(Position::new(0.0, 0.0, 0.0), Position::new(1.0, 1.0, 1.0));
        n.expand_global_bounds(a);
        assert_eq!(n.global_bounds(), Some(a));

        let b = Aabb::new(
            Position::new(-1.0, 0.0, 0.0),
            Position::new(0.5, 5.0, 5.0),
        );
        n.expand_global_bounds(b);
        let after = n.global_bounds().unwrap();
        for corner in [a.min, a.max, b.min, b.max] {
            assert!(after.contains_point(&corner));
        }
    }

    #[test]
    fn try_mark_subdivided_succeeds_once() {
        let n = node();
        assert!(n.try_mark_subdivided());
        assert!(!n.try_mark_subdivided());
        assert!(n.is_subdivided());
    }

    #[test]
    fn try_mark_subdivided_is_race_free() {
        use std::sync::Arc;
        use std::thread;

        let n = Arc::new(node());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let n = Arc::clone(&n);
            handles.push(thread::spawn(move || n.try_mark_subdivided()));
        }
        let winners: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn child_linking_sets_leaf_false() {
        let n = node();
        n.add_child_tree_id(TreeId::new("child_0"));
        assert!(!n.is_leaf());
    }
}
