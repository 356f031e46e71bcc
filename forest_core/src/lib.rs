// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Forest Core: an adaptive, multi-tree spatial index forest.
//!
//! A single octree or tetree assumes a workload whose spatial distribution
//! is known and roughly stable. Forest Core instead manages a *forest* of
//! independently-addressable trees — cubic (octree) or tetrahedral (tetree)
//! — that subdivide when they get dense and merge back down when they get
//! sparse, so the index's shape tracks the data instead of the other way
//! around.
//!
//! - [`Forest`] is the topology container: trees, their parent/child and
//!   neighbor relationships, and the entity-to-tree assignment façade
//!   ([`AssignmentStrategy`]). It never decides to restructure itself.
//! - [`AdaptationEngine`] is the decision maker: it samples density
//!   ([`density`]), chooses a subdivision geometry ([`strategies`]), and
//!   performs subdivision and merging through `Forest`'s own public API.
//! - [`AdaptiveForest`] pairs a `Forest` with an `AdaptationEngine` running
//!   on a background thread, plus a [`forest_ghost::GhostZoneManager`] kept
//!   in sync after every cycle.
//! - [`ConnectivityManager`] classifies adjacency between tree bounds
//!   (face/edge/vertex/disjoint) and provides BFS/DFS/connected-components
//!   traversal over the resulting graph.
//! - [`EventBus`]/[`ForestEvent`] notify external listeners of structural
//!   changes (trees added/removed/subdivided/merged, entities migrated)
//!   without coupling the forest to any particular subscriber.
//!
//! Per-tree storage ([`forest_tree::SpatialTree`]) and cross-tree ghost
//! replication ([`forest_ghost`]) are separate crates; this crate composes
//! them rather than re-implementing either.

mod adaptation;
mod adaptive_forest;
mod config;
mod connectivity;
mod density;
mod entity_manager;
mod events;
mod forest;
mod strategies;

pub use adaptation::{AdaptationEngine, IndexFactory};
pub use adaptive_forest::AdaptiveForest;
pub use config::{AdaptationConfig, SubdivisionStrategy};
pub use connectivity::{ConnectivityManager, ConnectivityType, TouchingAxes, TreeConnection};
pub use density::{DensityRegion, DensityTracker};
pub use entity_manager::{AssignmentStrategy, EntityManager, RoundRobinStrategy, SpatialBoundsStrategy};
pub use events::{EventBus, ForestEvent, ForestListener, ListenerHandle, TreeShape};
pub use forest::Forest;
pub use strategies::{
    adaptive_split, binary_split, compute_child_bounds, kmeans_assign, kmeans_split, octant_split,
    tetrahedral_split, Axis, ChildBounds,
};

pub use forest_geometry::{Aabb, CubicBounds, Position, TetAnchor, TetrahedralBounds, TreeBounds};
pub use forest_ghost::{in_ghost_zone, GhostEntity, GhostZoneManager, GhostZoneRelation, NeighborSource};
pub use forest_tree::{
    EntityId, EntityIdGenerator, FlatSpatialTree, ForestError, Result, SequentialIdGenerator,
    SpatialTree, TreeId, TreeNode, TreeStats,
};
