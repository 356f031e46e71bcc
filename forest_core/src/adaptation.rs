// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The adaptation engine: density-driven subdivision and merging of trees.
//!
//! This is the only code in the crate that *decides* to restructure the
//! forest; [`crate::forest::Forest`] only ever does what it's told.

use std::sync::Arc;

use forest_geometry::{Aabb, CubicBounds, Position, TreeBounds};
use forest_ghost::NeighborSource;
use forest_tree::{EntityId, ForestError, Result, SpatialTree, TreeId};
use hashbrown::HashSet;
use parking_lot::RwLock;

use crate::config::{AdaptationConfig, SubdivisionStrategy};
use crate::connectivity::{classify, ConnectivityType};
use crate::density::{DensityRegion, DensityTracker};
use crate::events::{ForestEvent, TreeShape};
use crate::forest::Forest;
use crate::strategies::compute_child_bounds;

/// A factory for the per-tree spatial index backing newly-created trees
/// (subdivision children, or a merge's combined tree).
pub type IndexFactory<C> = dyn Fn() -> Box<dyn SpatialTree<C>> + Send + Sync;

/// Whether two trees' bounds are close enough to be merge partners: the gap
/// along every axis (0 if the boxes touch or overlap) is at most `gap`.
pub fn are_adjacent(bounds_a: &Aabb, bounds_b: &Aabb, gap: f32) -> bool {
    bounds_a.axis_separations(bounds_b).into_iter().all(|g| g <= gap)
}

/// Density-driven subdivision and merging, operating on a [`Forest`]
/// through its public API.
pub struct AdaptationEngine<C> {
    config: RwLock<AdaptationConfig>,
    density: DensityTracker,
    index_factory: Arc<IndexFactory<C>>,
}

impl<C> std::fmt::Debug for AdaptationEngine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptationEngine")
            .field("config", &self.config())
            .finish_non_exhaustive()
    }
}

impl<C: Clone + Send + Sync + 'static> AdaptationEngine<C> {
    /// Create an adaptation engine with `config`, using `index_factory` to
    /// build the per-tree index for every new tree it creates.
    pub fn new(config: AdaptationConfig, index_factory: Arc<IndexFactory<C>>) -> Self {
        Self {
            config: RwLock::new(config),
            density: DensityTracker::new(),
            index_factory,
        }
    }

    /// The current configuration.
    pub fn config(&self) -> AdaptationConfig {
        *self.config.read()
    }

    /// Replace the configuration, effective on the next cycle.
    pub fn set_config(&self, config: AdaptationConfig) {
        *self.config.write() = config;
    }

    /// Record one structural operation against the density check interval.
    pub fn record_operation(&self) -> u64 {
        self.density.record_operation()
    }

    /// Whether enough operations have accumulated to run a full density
    /// check, per [`AdaptationConfig::density_check_interval`].
    pub fn should_check(&self) -> bool {
        self.density.should_check(self.config().density_check_interval)
    }

    /// Trees whose entity count has already crossed the urgent threshold
    /// (`1.5 * max_entities_per_tree`), regardless of the check interval.
    /// The background scheduler treats these as high-priority subdivision
    /// requests rather than waiting for the next periodic cycle.
    pub fn check_adaptation_triggers(&self, forest: &Forest<C>) -> Vec<TreeId> {
        let threshold = self.config().urgent_entity_threshold();
        forest
            .tree_ids()
            .into_iter()
            .filter(|id| {
                forest.tree(id).is_some_and(|n| {
                    n.refresh_statistics();
                    n.is_leaf() && n.stats().entity_count >= threshold
                })
            })
            .collect()
    }

    /// Refresh every tree's statistics and sample its density.
    pub fn perform_density_analysis(&self, forest: &Forest<C>) -> Vec<DensityRegion> {
        let snapshot = forest.trees_snapshot();
        snapshot
            .iter()
            .map(|(id, node)| {
                node.refresh_statistics();
                self.density.sample(id, node)
            })
            .collect()
    }

    /// Attempt to subdivide `tree_id`, using `strategy` if given or the
    /// configured default.
    ///
    /// Returns `Ok(None)` (not an error) if the tree does not qualify: it
    /// is not a leaf, has already been subdivided, is below the entity/
    /// density thresholds, or is too small to split further. Returns
    /// `Ok(Some(children))` on success.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::NotFound`] if `tree_id` does not exist, and
    /// propagates any error from redistributing entities into the new
    /// children.
    pub fn consider_subdivision(
        &self,
        forest: &Forest<C>,
        tree_id: &TreeId,
        strategy: Option<SubdivisionStrategy>,
    ) -> Result<Option<Vec<TreeId>>> {
        let node = forest
            .tree(tree_id)
            .ok_or_else(|| ForestError::NotFound(tree_id.to_string()))?;

        if node.is_subdivided() || !node.is_leaf() {
            return Ok(None);
        }

        let config = self.config();
        let bounds = node
            .tree_bounds()
            .ok_or_else(|| ForestError::Geometry("tree has no assigned bounds".to_string()))?;
        node.refresh_statistics();
        let stats = node.stats();
        let density = if bounds.volume() > 0.0 {
            stats.entity_count as f32 / bounds.volume()
        } else {
            f32::INFINITY
        };

        let qualifies = config.enable_auto_subdivision
            && (stats.entity_count > config.max_entities_per_tree || density > config.density_threshold)
            && bounds.volume() > config.subdivision_volume_floor();
        if !qualifies {
            return Ok(None);
        }

        if !node.try_mark_subdivided() {
            // Another caller (racing background cycle and urgent request)
            // already won the gate.
            return Ok(None);
        }

        let entities: Vec<(EntityId, Position, C)> = {
            let index = node.index();
            index
                .entities_with_positions()
                .into_iter()
                .filter_map(|(id, pos)| index.get(id).map(|content| (id, pos, content)))
                .collect()
        };
        let positions: Vec<Position> = entities.iter().map(|(_, p, _)| *p).collect();

        let strategy = strategy.unwrap_or(config.subdivision_strategy);
        let child_bounds = compute_child_bounds(strategy, &bounds, &positions);
        if child_bounds.is_empty() {
            return Ok(None);
        }

        let child_aabbs: Vec<Aabb> = child_bounds.iter().map(TreeBounds::aabb_projection).collect();
        let mut child_ids = Vec::with_capacity(child_bounds.len());
        for (i, bounds) in child_bounds.iter().enumerate() {
            let child_id = TreeId::new(format!("{tree_id}.{i}"));
            forest.add_tree_with_id(
                child_id.clone(),
                *bounds,
                (self.index_factory)(),
                Some(tree_id.clone()),
                node.hierarchy_level() + 1,
            );
            forest.link_parent_child(tree_id, &child_id)?;
            child_ids.push(child_id);
        }

        for i in 0..child_ids.len() {
            for j in (i + 1)..child_ids.len() {
                let (connectivity_type, _) = classify(&child_aabbs[i], &child_aabbs[j]);
                if connectivity_type != ConnectivityType::Disjoint {
                    forest.link_neighbors(&child_ids[i], &child_ids[j])?;
                }
            }
        }

        for (entity_id, position, _) in &entities {
            let target = child_bounds
                .iter()
                .position(|b| b.contains_point(position))
                .unwrap_or_else(|| {
                    child_aabbs
                        .iter()
                        .enumerate()
                        .min_by(|(_, a), (_, b)| {
                            a.distance_squared_to_point(position)
                                .total_cmp(&b.distance_squared_to_point(position))
                        })
                        .map(|(i, _)| i)
                        .unwrap_or(0)
                });
            forest.migrate_entity(*entity_id, tree_id, &child_ids[target])?;
        }

        let (timestamp_ms, forest_id) = forest.events().stamp();
        forest.events().emit(ForestEvent::TreeSubdivided {
            timestamp_ms,
            forest_id,
            parent_id: tree_id.clone(),
            child_ids: child_ids.clone(),
            strategy_tag: strategy,
            child_shape: TreeShape::from(&child_bounds[0]),
        });

        Ok(Some(child_ids))
    }

    /// Merge adjacent, under-populated leaf trees pairwise.
    ///
    /// A leaf qualifies as a merge source when its entity count is below
    /// [`AdaptationConfig::min_entities_per_tree`]. Two qualifying leaves
    /// merge when they are neighbors and the AABB covering both has volume
    /// at most [`AdaptationConfig::max_tree_volume`]. Each tree merges at
    /// most once per call; a leaf with multiple qualifying neighbors is
    /// paired with the first one encountered.
    ///
    /// Returns the `(source_ids, merged_id)` pairs actually performed.
    pub fn consider_merging(&self, forest: &Forest<C>) -> Result<Vec<(Vec<TreeId>, TreeId)>> {
        let config = self.config();
        if !config.enable_auto_merging {
            return Ok(Vec::new());
        }

        let low_density = config.low_density_threshold();
        let candidates: HashSet<TreeId> = forest
            .tree_ids()
            .into_iter()
            .filter(|id| {
                forest.tree(id).is_some_and(|n| {
                    n.refresh_statistics();
                    let stats = n.stats();
                    if !n.is_leaf() || stats.entity_count >= config.min_entities_per_tree {
                        return false;
                    }
                    let density = n
                        .tree_bounds()
                        .map(|b| {
                            let volume = b.aabb_projection().volume();
                            if volume > 0.0 {
                                stats.entity_count as f32 / volume
                            } else {
                                f32::INFINITY
                            }
                        })
                        .unwrap_or(f32::INFINITY);
                    density < low_density
                })
            })
            .collect();

        let mut consumed: HashSet<TreeId> = HashSet::new();
        let mut merges = Vec::new();

        for id in &candidates {
            if consumed.contains(id) {
                continue;
            }
            let Some(node) = forest.tree(id) else { continue };
            let Some(bounds_a) = node.tree_bounds() else { continue };
            let aabb_a = bounds_a.aabb_projection();

            let Some(partner_id) = candidates
                .iter()
                .filter(|n| *n != id && !consumed.contains(*n))
                .find(|n| {
                    forest
                        .tree(n)
                        .and_then(|pn| pn.tree_bounds())
                        .is_some_and(|pb| are_adjacent(&aabb_a, &pb.aabb_projection(), 1.0))
                })
                .cloned()
            else {
                continue;
            };
            let Some(partner_node) = forest.tree(&partner_id) else {
                continue;
            };
            let Some(bounds_b) = partner_node.tree_bounds() else {
                continue;
            };
            let merged_aabb = aabb_a.expand_to_cover(&bounds_b.aabb_projection());
            if merged_aabb.volume() > config.max_tree_volume {
                continue;
            }

            let outside_neighbors: Vec<TreeId> = node
                .neighbors()
                .into_iter()
                .chain(partner_node.neighbors())
                .filter(|n| n != id && *n != partner_id)
                .collect();
            let parent_id = node.parent_tree_id();

            let merged_id = TreeId::new(format!("{id}+{partner_id}"));
            let merged_bounds = TreeBounds::Cubic(CubicBounds::new(merged_aabb));
            forest.add_tree_with_id(
                merged_id.clone(),
                merged_bounds,
                (self.index_factory)(),
                parent_id.clone(),
                node.hierarchy_level(),
            );

            for (entity_id, _, _) in forest.tree_entities(id) {
                forest.migrate_entity(entity_id, id, &merged_id)?;
            }
            for (entity_id, _, _) in forest.tree_entities(&partner_id) {
                forest.migrate_entity(entity_id, &partner_id, &merged_id)?;
            }

            if let Some(parent_id) = &parent_id {
                forest.link_parent_child(parent_id, &merged_id)?;
            }
            for neighbor in &outside_neighbors {
                forest.link_neighbors(&merged_id, neighbor)?;
            }

            forest.remove_tree(id);
            forest.remove_tree(&partner_id);

            let (timestamp_ms, forest_id) = forest.events().stamp();
            forest.events().emit(ForestEvent::TreesMerged {
                timestamp_ms,
                forest_id,
                source_ids: vec![id.clone(), partner_id.clone()],
                merged_id: merged_id.clone(),
            });

            consumed.insert(id.clone());
            consumed.insert(partner_id.clone());
            merges.push((vec![id.clone(), partner_id.clone()], merged_id));
        }

        Ok(merges)
    }

    /// One full adaptation cycle: sample density, subdivide trees that
    /// qualify, then merge trees that qualify, and reset the operation
    /// counter.
    ///
    /// Returns every error encountered rather than stopping at the first;
    /// callers running this on a background schedule log-and-continue
    /// rather than abort (see `crate::adaptive_forest`).
    pub fn run_cycle(&self, forest: &Forest<C>) -> Vec<ForestError> {
        let mut errors = Vec::new();
        let config = self.config();
        let regions = self.perform_density_analysis(forest);

        if config.enable_auto_subdivision {
            for region in &regions {
                let should_subdivide = region.entity_count > config.max_entities_per_tree
                    || region.density() > config.density_threshold;
                if should_subdivide {
                    if let Err(e) = self.consider_subdivision(forest, &region.tree_id, None) {
                        errors.push(e);
                    }
                }
            }
        }

        if config.enable_auto_merging {
            match self.consider_merging(forest) {
                Ok(_) => {}
                Err(e) => errors.push(e),
            }
        }

        self.density.reset();
        errors
    }
}
