// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree-to-tree spatial connectivity: face/edge/vertex adjacency
//! classification and graph traversal over the neighbor relation.

use std::sync::Arc;

use bitflags::bitflags;
use forest_geometry::Aabb;
use forest_tree::{TreeId, TreeNode};
use hashbrown::{HashMap, HashSet};

const TOUCH_EPSILON: f32 = 1e-5;

bitflags! {
    /// Which axes two bounding boxes touch (share a boundary) along.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct TouchingAxes: u8 {
        /// The boxes' X extents touch or overlap.
        const X = 0b001;
        /// The boxes' Y extents touch or overlap.
        const Y = 0b010;
        /// The boxes' Z extents touch or overlap.
        const Z = 0b100;
    }
}

/// How two trees' bounds relate geometrically.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConnectivityType {
    /// The boxes overlap on two axes and touch along the third: they share
    /// a 2-D face.
    Face,
    /// The boxes overlap on one axis and touch along the other two: they
    /// share a 1-D edge.
    Edge,
    /// The boxes touch along all three axes with no overlap: they share a
    /// single point.
    Vertex,
    /// The boxes overlap on all three axes: true volumetric interpenetration,
    /// not a boundary contact.
    Overlap,
    /// The boxes neither overlap nor touch.
    Disjoint,
}

/// One edge of the tree connectivity graph.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeConnection {
    /// One endpoint.
    pub from: TreeId,
    /// The other endpoint.
    pub to: TreeId,
    /// How the two trees' bounds touch.
    pub connectivity_type: ConnectivityType,
    /// Which axes the contact spans.
    pub touching_axes: TouchingAxes,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum AxisRelation {
    Overlapping,
    Touching,
    Separated,
}

fn axis_relation(a_min: f32, a_max: f32, b_min: f32, b_max: f32) -> AxisRelation {
    if a_max < b_min - TOUCH_EPSILON || b_max < a_min - TOUCH_EPSILON {
        AxisRelation::Separated
    } else if (a_max - b_min).abs() <= TOUCH_EPSILON || (b_max - a_min).abs() <= TOUCH_EPSILON {
        AxisRelation::Touching
    } else {
        AxisRelation::Overlapping
    }
}

/// Classify the spatial relationship between two axis-aligned boxes.
///
/// Both boxes are treated as their AABB projections; tetrahedral tree
/// bounds are classified on the AABB that bounds them, so two tetrahedra
/// whose bounding boxes touch are reported connected even if the tetrahedra
/// themselves only share a sliver of that box. That is an intentional
/// over-approximation: ghost replication (`forest_ghost`) treats a false
/// positive here as a slightly wider ghost zone, not a correctness bug.
pub fn classify(a: &Aabb, b: &Aabb) -> (ConnectivityType, TouchingAxes) {
    let rel_x = axis_relation(a.min.x, a.max.x, b.min.x, b.max.x);
    let rel_y = axis_relation(a.min.y, a.max.y, b.min.y, b.max.y);
    let rel_z = axis_relation(a.min.z, a.max.z, b.min.z, b.max.z);

    if rel_x == AxisRelation::Separated || rel_y == AxisRelation::Separated || rel_z == AxisRelation::Separated {
        return (ConnectivityType::Disjoint, TouchingAxes::empty());
    }

    let mut touching = TouchingAxes::empty();
    let mut touch_count = 0;
    for (rel, flag) in [(rel_x, TouchingAxes::X), (rel_y, TouchingAxes::Y), (rel_z, TouchingAxes::Z)] {
        if rel == AxisRelation::Touching {
            touching |= flag;
            touch_count += 1;
        }
    }

    let connectivity_type = match touch_count {
        // No axis merely touches: every axis overlaps, so the boxes
        // interpenetrate rather than share a boundary.
        0 => ConnectivityType::Overlap,
        1 => ConnectivityType::Face,
        2 => ConnectivityType::Edge,
        3 => ConnectivityType::Vertex,
        _ => unreachable!("touch_count is bounded by the 3 axes checked"),
    };

    (connectivity_type, touching)
}

/// Computes and caches the tree-adjacency graph, and answers reachability
/// queries over it.
///
/// The manager does not own the forest's tree map; it is handed a snapshot
/// reference for each call, matching the forest core's preference for
/// short-lived locks over long-held structural state.
#[derive(Default, Debug)]
pub struct ConnectivityManager;

impl ConnectivityManager {
    /// Create a connectivity manager.
    pub fn new() -> Self {
        Self
    }

    /// Compute every pairwise connection among `trees` whose bounds are not
    /// [`ConnectivityType::Disjoint`].
    pub fn compute_connections<C>(
        &self,
        trees: &HashMap<TreeId, Arc<TreeNode<C>>>,
    ) -> Vec<TreeConnection> {
        let entries: Vec<(&TreeId, Aabb)> = trees
            .iter()
            .filter_map(|(id, node)| node.tree_bounds().map(|b| (id, b.aabb_projection())))
            .collect();

        let mut connections = Vec::new();
        for i in 0..entries.len() {
            for j in (i + 1)..entries.len() {
                let (id_a, aabb_a) = &entries[i];
                let (id_b, aabb_b) = &entries[j];
                let (connectivity_type, touching_axes) = classify(aabb_a, aabb_b);
                if connectivity_type != ConnectivityType::Disjoint {
                    connections.push(TreeConnection {
                        from: (*id_a).clone(),
                        to: (*id_b).clone(),
                        connectivity_type,
                        touching_axes,
                    });
                }
            }
        }
        connections
    }

    /// Breadth-first traversal of the neighbor graph starting at `start`,
    /// following each tree's [`TreeNode::neighbors`]. Returns visited ids in
    /// visitation order (including `start`, if present in `trees`).
    pub fn bfs<C>(&self, trees: &HashMap<TreeId, Arc<TreeNode<C>>>, start: &TreeId) -> Vec<TreeId> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut queue = std::collections::VecDeque::new();

        if !trees.contains_key(start) {
            return order;
        }
        queue.push_back(start.clone());
        visited.insert(start.clone());

        while let Some(current) = queue.pop_front() {
            order.push(current.clone());
            let Some(node) = trees.get(&current) else {
                continue;
            };
            for neighbor in node.neighbors() {
                if visited.insert(neighbor.clone()) {
                    queue.push_back(neighbor);
                }
            }
        }
        order
    }

    /// Depth-first traversal of the neighbor graph starting at `start`.
    /// Returns visited ids in visitation order (including `start`, if
    /// present in `trees`).
    pub fn dfs<C>(&self, trees: &HashMap<TreeId, Arc<TreeNode<C>>>, start: &TreeId) -> Vec<TreeId> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut stack = Vec::new();

        if !trees.contains_key(start) {
            return order;
        }
        stack.push(start.clone());

        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            order.push(current.clone());
            let Some(node) = trees.get(&current) else {
                continue;
            };
            for neighbor in node.neighbors() {
                if !visited.contains(&neighbor) {
                    stack.push(neighbor);
                }
            }
        }
        order
    }

    /// Partition `trees` into connected components of the neighbor graph.
    pub fn connected_components<C>(
        &self,
        trees: &HashMap<TreeId, Arc<TreeNode<C>>>,
    ) -> Vec<Vec<TreeId>> {
        let mut remaining: HashSet<TreeId> = trees.keys().cloned().collect();
        let mut components = Vec::new();

        while let Some(seed) = remaining.iter().next().cloned() {
            let component = self.bfs(trees, &seed);
            for id in &component {
                remaining.remove(id);
            }
            components.push(component);
        }
        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forest_geometry::Position;

    fn aabb(min: (f32, f32, f32), max: (f32, f32, f32)) -> Aabb {
        Aabb::new(
            Position::new(min.0, min.1, min.2),
            Position::new(max.0, max.1, max.2),
        )
    }

    #[test]
    fn face_adjacent_boxes_classify_as_face() {
        let a = aabb((0.0, 0.0, 0.0), (1.0, 1.0, 1.0));
        let b = aabb((1.0, 0.0, 0.0), (2.0, 1.0, 1.0));
        let (connectivity_type, touching_axes) = classify(&a, &b);
        assert_eq!(connectivity_type, ConnectivityType::Face);
        assert_eq!(touching_axes, TouchingAxes::X);
    }

    #[test]
    fn edge_adjacent_boxes_classify_as_edge() {
        let a = aabb((0.0, 0.0, 0.0), (1.0, 1.0, 1.0));
        let b = aabb((1.0, 1.0, 0.0), (2.0, 2.0, 1.0));
        let (connectivity_type, _) = classify(&a, &b);
        assert_eq!(connectivity_type, ConnectivityType::Edge);
    }

    #[test]
    fn corner_touching_boxes_classify_as_vertex() {
        let a = aabb((0.0, 0.0, 0.0), (1.0, 1.0, 1.0));
        let b = aabb((1.0, 1.0, 1.0), (2.0, 2.0, 2.0));
        let (connectivity_type, touching_axes) = classify(&a, &b);
        assert_eq!(connectivity_type, ConnectivityType::Vertex);
        assert_eq!(touching_axes, TouchingAxes::all());
    }

    #[test]
    fn interpenetrating_boxes_classify_as_overlap() {
        let a = aabb((0.0, 0.0, 0.0), (2.0, 2.0, 2.0));
        let b = aabb((1.0, 1.0, 1.0), (3.0, 3.0, 3.0));
        let (connectivity_type, touching_axes) = classify(&a, &b);
        assert_eq!(connectivity_type, ConnectivityType::Overlap);
        assert_eq!(touching_axes, TouchingAxes::empty());
    }

    #[test]
    fn separated_boxes_classify_as_disjoint() {
        let a = aabb((0.0, 0.0, 0.0), (1.0, 1.0, 1.0));
        let b = aabb((5.0, 5.0, 5.0), (6.0, 6.0, 6.0));
        let (connectivity_type, _) = classify(&a, &b);
        assert_eq!(connectivity_type, ConnectivityType::Disjoint);
    }

    #[test]
    fn bfs_and_dfs_visit_all_reachable_nodes() {
        use forest_tree::FlatSpatialTree;

        let mut trees: HashMap<TreeId, Arc<TreeNode<u32>>> = HashMap::new();
        let ids: Vec<TreeId> = (0..4).map(|i| TreeId::new(format!("t{i}"))).collect();
        for id in &ids {
            trees.insert(
                id.clone(),
                Arc::new(TreeNode::new(id.clone(), Box::new(FlatSpatialTree::<u32>::new()))),
            );
        }
        // chain: t0 - t1 - t2, t3 isolated
        trees[&ids[0]].add_neighbor(ids[1].clone());
        trees[&ids[1]].add_neighbor(ids[0].clone());
        trees[&ids[1]].add_neighbor(ids[2].clone());
        trees[&ids[2]].add_neighbor(ids[1].clone());

        let mgr = ConnectivityManager::new();
        let bfs_order = mgr.bfs(&trees, &ids[0]);
        assert_eq!(bfs_order.len(), 3);
        assert!(bfs_order.contains(&ids[2]));
        assert!(!bfs_order.contains(&ids[3]));

        let dfs_order = mgr.dfs(&trees, &ids[0]);
        assert_eq!(dfs_order.len(), 3);

        let components = mgr.connected_components(&trees);
        assert_eq!(components.len(), 2);
    }
}
