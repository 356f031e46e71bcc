// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `Forest<C>`: the top-level container of trees, their topology, and the
//! entity-to-tree assignment façade.

use std::sync::Arc;

use forest_geometry::{Aabb, Position, TreeBounds};
use forest_ghost::NeighborSource;
use forest_tree::{EntityId, EntityIdGenerator, ForestError, Result, SpatialTree, TreeId, TreeNode};
use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::connectivity::ConnectivityManager;
use crate::entity_manager::{AssignmentStrategy, EntityManager};
use crate::events::{EventBus, ForestEvent, TreeShape};

/// Aggregate counters over every tree in a [`Forest`], returned by
/// [`Forest::forest_statistics`].
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ForestStatistics {
    /// Total number of trees registered.
    pub tree_count: usize,
    /// Number of trees with no children.
    pub leaf_count: usize,
    /// Total number of entities tracked across every tree.
    pub entity_count: usize,
    /// The deepest hierarchy level reached by any tree.
    pub max_hierarchy_level: u32,
    /// The deepest internal-structure depth reached by any tree's index.
    pub max_depth: u32,
}

/// The forest: a named collection of trees, their parent/child and
/// neighbor relationships, and the entity assignment façade used to insert
/// without naming a tree.
///
/// `Forest` itself does not decide *when* to subdivide or merge — that is
/// [`crate::adaptation::AdaptationEngine`]'s job, operating on the `Forest`
/// through its public methods just like any other caller.
pub struct Forest<C> {
    forest_id: String,
    trees: RwLock<HashMap<TreeId, Arc<TreeNode<C>>>>,
    roots: RwLock<Vec<TreeId>>,
    entities: EntityManager,
    events: EventBus,
    id_gen: Arc<dyn EntityIdGenerator>,
    assignment: Arc<dyn AssignmentStrategy>,
    connectivity: ConnectivityManager,
}

impl<C> std::fmt::Debug for Forest<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forest")
            .field("forest_id", &self.forest_id)
            .field("tree_count", &self.trees.read().len())
            .field("entity_count", &self.entities.len())
            .finish_non_exhaustive()
    }
}

impl<C> Forest<C> {
    /// Create an empty forest.
    pub fn new(
        forest_id: impl Into<String>,
        id_gen: Arc<dyn EntityIdGenerator>,
        assignment: Arc<dyn AssignmentStrategy>,
    ) -> Self {
        let forest_id = forest_id.into();
        Self {
            events: EventBus::new(forest_id.clone()),
            forest_id,
            trees: RwLock::new(HashMap::new()),
            roots: RwLock::new(Vec::new()),
            entities: EntityManager::new(),
            id_gen,
            assignment,
            connectivity: ConnectivityManager::new(),
        }
    }

    /// This forest's id.
    pub fn forest_id(&self) -> &str {
        &self.forest_id
    }

    /// The event bus callers can register [`crate::events::ForestListener`]s on.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The connectivity manager used for adjacency classification and
    /// graph traversal over this forest's trees.
    pub fn connectivity(&self) -> &ConnectivityManager {
        &self.connectivity
    }

    /// A snapshot clone of the tree map, for callers (connectivity,
    /// density, ghost sync) that need to iterate without holding the lock.
    pub fn trees_snapshot(&self) -> HashMap<TreeId, Arc<TreeNode<C>>> {
        self.trees.read().clone()
    }

    /// Register a new root tree with `bounds`, backed by `index`. Returns
    /// its generated id and emits [`ForestEvent::TreeAdded`].
    pub fn add_root_tree(&self, bounds: TreeBounds, index: Box<dyn SpatialTree<C>>) -> TreeId {
        let tree_id = TreeId::new(format!("{}-root-{}", self.forest_id, self.roots.read().len()));
        self.register_tree(tree_id.clone(), bounds, index, None, 0);
        self.roots.write().push(tree_id.clone());
        tree_id
    }

    /// Register a new tree under an explicit, caller-chosen id, typically
    /// used by the adaptation engine when creating subdivision children (it
    /// wants a predictable, loggable id derived from the parent).
    pub fn add_tree_with_id(
        &self,
        tree_id: TreeId,
        bounds: TreeBounds,
        index: Box<dyn SpatialTree<C>>,
        parent_id: Option<TreeId>,
        hierarchy_level: u32,
    ) -> TreeId {
        self.register_tree(tree_id.clone(), bounds, index, parent_id, hierarchy_level);
        tree_id
    }

    fn register_tree(
        &self,
        tree_id: TreeId,
        bounds: TreeBounds,
        index: Box<dyn SpatialTree<C>>,
        parent_id: Option<TreeId>,
        hierarchy_level: u32,
    ) {
        let node = TreeNode::new(tree_id.clone(), index);
        node.set_tree_bounds(bounds);
        node.set_hierarchy_level(hierarchy_level);
        if let Some(parent) = &parent_id {
            node.set_parent_tree_id(parent.clone());
        }
        self.trees.write().insert(tree_id.clone(), Arc::new(node));

        let (timestamp_ms, forest_id) = self.events.stamp();
        self.events.emit(ForestEvent::TreeAdded {
            timestamp_ms,
            forest_id,
            tree_id,
            bounds,
            shape: TreeShape::from(&bounds),
            parent_id,
        });
    }

    /// Remove a tree entirely (used after a merge folds its entities into
    /// another tree). Emits [`ForestEvent::TreeRemoved`].
    ///
    /// Does not recursively remove children or re-home entities; callers
    /// (the adaptation engine) are responsible for migrating entities out
    /// first.
    pub fn remove_tree(&self, tree_id: &TreeId) -> bool {
        let removed = self.trees.write().remove(tree_id).is_some();
        if removed {
            self.roots.write().retain(|id| id != tree_id);
            let (timestamp_ms, forest_id) = self.events.stamp();
            self.events.emit(ForestEvent::TreeRemoved {
                timestamp_ms,
                forest_id,
                tree_id: tree_id.clone(),
            });
        }
        removed
    }

    /// Look up a tree by id.
    pub fn tree(&self, tree_id: &TreeId) -> Option<Arc<TreeNode<C>>> {
        self.trees.read().get(tree_id).cloned()
    }

    /// Every root tree id.
    pub fn root_ids(&self) -> Vec<TreeId> {
        self.roots.read().clone()
    }

    /// Every tree id currently registered.
    pub fn tree_ids(&self) -> Vec<TreeId> {
        self.trees.read().keys().cloned().collect()
    }

    /// Every leaf tree's id and AABB projection, the candidate set the
    /// entity assignment strategy chooses from.
    pub fn leaf_candidates(&self) -> Vec<(TreeId, Aabb)> {
        self.trees
            .read()
            .values()
            .filter(|node| node.is_leaf())
            .filter_map(|node| node.tree_bounds().map(|b| (node.tree_id().clone(), b.aabb_projection())))
            .collect()
    }

    /// Link `child_id` under `parent_id`: sets the child's parent and
    /// hierarchy level (`parent.hierarchy_level() + 1`) and appends it to
    /// the parent's child list.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::NotFound`] if either id is not registered.
    pub fn link_parent_child(&self, parent_id: &TreeId, child_id: &TreeId) -> Result<()> {
        let trees = self.trees.read();
        let parent = trees
            .get(parent_id)
            .ok_or_else(|| ForestError::NotFound(parent_id.to_string()))?;
        let child = trees
            .get(child_id)
            .ok_or_else(|| ForestError::NotFound(child_id.to_string()))?;
        parent.add_child_tree_id(child_id.clone());
        child.set_parent_tree_id(parent_id.clone());
        child.set_hierarchy_level(parent.hierarchy_level() + 1);
        Ok(())
    }

    /// Register a bidirectional neighbor relationship between two trees.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::NotFound`] if either id is not registered.
    pub fn link_neighbors(&self, a: &TreeId, b: &TreeId) -> Result<()> {
        let trees = self.trees.read();
        let node_a = trees.get(a).ok_or_else(|| ForestError::NotFound(a.to_string()))?;
        let node_b = trees.get(b).ok_or_else(|| ForestError::NotFound(b.to_string()))?;
        node_a.add_neighbor(b.clone());
        node_b.add_neighbor(a.clone());
        Ok(())
    }

    /// Insert a new entity at `position`, choosing its tree via the
    /// configured [`AssignmentStrategy`].
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvalidArgument`] if there are no leaf trees
    /// to assign into, or if the chosen tree's index rejects the insert.
    pub fn insert_entity(&self, position: Position, content: C) -> Result<EntityId> {
        let candidates = self.leaf_candidates();
        let tree_id = self
            .assignment
            .select(&position, &candidates)
            .ok_or_else(|| ForestError::InvalidArgument("no leaf trees to assign into".to_string()))?;

        let node = self
            .tree(&tree_id)
            .ok_or_else(|| ForestError::NotFound(tree_id.to_string()))?;

        let entity_id = self.id_gen.generate_id();
        let level = node.hierarchy_level();
        node.index().insert(entity_id, position, level, content, None)?;
        node.expand_global_bounds(Aabb::new(position, position));
        self.entities.record(entity_id, tree_id);
        Ok(entity_id)
    }

    /// Remove an entity, wherever it currently lives.
    pub fn remove_entity(&self, entity_id: EntityId) -> bool {
        let Some(tree_id) = self.entities.locate(entity_id) else {
            return false;
        };
        let Some(node) = self.tree(&tree_id) else {
            self.entities.forget(entity_id);
            return false;
        };
        let removed = node.index().remove(entity_id);
        if removed {
            self.entities.forget(entity_id);
        }
        removed
    }

    /// The tree an entity currently lives in, if tracked.
    pub fn locate_entity(&self, entity_id: EntityId) -> Option<TreeId> {
        self.entities.locate(entity_id)
    }

    /// Move `entity_id` from `from` to `to`, preserving its position and
    /// content. Emits [`ForestEvent::EntityMigrated`].
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::NotFound`] if either tree or the entity in
    /// `from` does not exist.
    pub fn migrate_entity(&self, entity_id: EntityId, from: &TreeId, to: &TreeId) -> Result<()>
    where
        C: Clone,
    {
        let from_node = self.tree(from).ok_or_else(|| ForestError::NotFound(from.to_string()))?;
        let to_node = self.tree(to).ok_or_else(|| ForestError::NotFound(to.to_string()))?;

        let (position, content) = {
            let index = from_node.index();
            let position = index
                .position_of(entity_id)
                .ok_or_else(|| ForestError::NotFound(entity_id.raw().to_string()))?;
            let content = index
                .get(entity_id)
                .ok_or_else(|| ForestError::NotFound(entity_id.raw().to_string()))?;
            (position, content)
        };

        from_node.index().remove(entity_id);
        let level = to_node.hierarchy_level();
        to_node.index().insert(entity_id, position, level, content, None)?;
        to_node.expand_global_bounds(Aabb::new(position, position));
        self.entities.record(entity_id, to.clone());

        let (timestamp_ms, forest_id) = self.events.stamp();
        self.events.emit(ForestEvent::EntityMigrated {
            timestamp_ms,
            forest_id,
            entity_id,
            from_tree_id: from.clone(),
            to_tree_id: to.clone(),
        });
        Ok(())
    }

    /// Total entities tracked across every tree.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Move `entity_id` to `new_position`, deciding via
    /// [`AssignmentStrategy::should_migrate`] whether it should be re-homed
    /// into a different tree or updated in place within its current one.
    ///
    /// Returns `false` if the entity is not tracked, or if its current tree
    /// or content cannot be found.
    pub fn update_position(&self, entity_id: EntityId, new_position: Position) -> bool
    where
        C: Clone,
    {
        let Some(current_tree_id) = self.entities.locate(entity_id) else {
            return false;
        };
        let Some(current_node) = self.tree(&current_tree_id) else {
            return false;
        };

        let candidates = self.leaf_candidates();
        let target = self
            .assignment
            .should_migrate(&current_tree_id, &new_position, &candidates);

        match target {
            Some(target_tree_id) if target_tree_id != current_tree_id => {
                let Some(target_node) = self.tree(&target_tree_id) else {
                    return false;
                };
                let Some(content) = current_node.index().get(entity_id) else {
                    return false;
                };
                current_node.index().remove(entity_id);
                let level = target_node.hierarchy_level();
                if target_node
                    .index()
                    .insert(entity_id, new_position, level, content, None)
                    .is_err()
                {
                    return false;
                }
                target_node.expand_global_bounds(Aabb::new(new_position, new_position));
                self.entities.record(entity_id, target_tree_id.clone());

                let (timestamp_ms, forest_id) = self.events.stamp();
                self.events.emit(ForestEvent::EntityMigrated {
                    timestamp_ms,
                    forest_id,
                    entity_id,
                    from_tree_id: current_tree_id,
                    to_tree_id: target_tree_id,
                });
                true
            }
            _ => {
                let Some(content) = current_node.index().get(entity_id) else {
                    return false;
                };
                current_node.index().remove(entity_id);
                let level = current_node.hierarchy_level();
                if current_node
                    .index()
                    .insert(entity_id, new_position, level, content, None)
                    .is_err()
                {
                    return false;
                }
                current_node.expand_global_bounds(Aabb::new(new_position, new_position));
                true
            }
        }
    }

    /// Every entity whose position lies within `region`, pre-filtering trees
    /// whose `global_bounds` intersect `region` before scanning their
    /// contents.
    pub fn find_entities_in_region(&self, region: &Aabb) -> Vec<(EntityId, Position, C)>
    where
        C: Clone,
    {
        self.trees_snapshot()
            .values()
            .filter(|node| node.global_bounds().is_some_and(|b| b.intersects(region)))
            .flat_map(|node| {
                let index = node.index();
                index
                    .entities_with_positions()
                    .into_iter()
                    .filter(|(_, pos)| region.contains_point(pos))
                    .filter_map(|(id, pos)| index.get(id).map(|content| (id, pos, content)))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// The `k` entities closest to `point` across every tree: gathers every
    /// candidate with its distance, sorts globally, and keeps the top `k`.
    pub fn find_k_nearest_neighbors(&self, point: &Position, k: usize) -> Vec<(EntityId, Position, C)>
    where
        C: Clone,
    {
        if k == 0 {
            return Vec::new();
        }
        let mut candidates: Vec<(f32, EntityId, Position, C)> = self
            .trees_snapshot()
            .values()
            .flat_map(|node| {
                let index = node.index();
                index
                    .entities_with_positions()
                    .into_iter()
                    .filter_map(|(id, pos)| {
                        index.get(id).map(|content| (pos.distance_squared(point), id, pos, content))
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
        candidates.truncate(k);
        candidates.into_iter().map(|(_, id, pos, content)| (id, pos, content)).collect()
    }

    /// The ids of trees whose `global_bounds` intersect `region`: the
    /// routing step [`Forest::find_entities_in_region`] and
    /// [`Forest::find_k_nearest_neighbors`] both pre-filter by, exposed on
    /// its own for callers that route a query to the servers hosting those
    /// trees rather than scanning entities themselves.
    pub fn route_query(&self, region: &Aabb) -> Vec<TreeId> {
        self.trees_snapshot()
            .values()
            .filter(|node| node.global_bounds().is_some_and(|b| b.intersects(region)))
            .map(|node| node.tree_id().clone())
            .collect()
    }

    /// Aggregate counters over every registered tree.
    pub fn forest_statistics(&self) -> ForestStatistics {
        let trees = self.trees_snapshot();
        let mut stats = ForestStatistics {
            tree_count: trees.len(),
            entity_count: self.entity_count(),
            ..ForestStatistics::default()
        };
        for node in trees.values() {
            node.refresh_statistics();
            if node.is_leaf() {
                stats.leaf_count += 1;
            }
            stats.max_hierarchy_level = stats.max_hierarchy_level.max(node.hierarchy_level());
            stats.max_depth = stats.max_depth.max(node.stats().max_depth);
        }
        stats
    }
}

impl<C: Clone + Send + Sync> NeighborSource<C> for Forest<C> {
    fn all_tree_ids(&self) -> Vec<TreeId> {
        self.tree_ids()
    }

    fn neighbor_tree_ids(&self, tree_id: &TreeId) -> Vec<TreeId> {
        self.tree(tree_id).map(|n| n.neighbors()).unwrap_or_default()
    }

    fn tree_bounds(&self, tree_id: &TreeId) -> Option<TreeBounds> {
        self.tree(tree_id).and_then(|n| n.tree_bounds())
    }

    fn tree_entities(&self, tree_id: &TreeId) -> Vec<(EntityId, Position, C)>
    where
        C: Clone,
    {
        let Some(node) = self.tree(tree_id) else {
            return Vec::new();
        };
        let index = node.index();
        index
            .entities_with_positions()
            .into_iter()
            .filter_map(|(id, pos)| index.get(id).map(|content| (id, pos, content)))
            .collect()
    }
}
