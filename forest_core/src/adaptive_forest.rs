// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `AdaptiveForest`: a [`Forest`] paired with a background thread that
//! periodically runs the [`AdaptationEngine`] and keeps ghost zones in
//! sync, plus an urgent-request path for callers that can't wait for the
//! next scheduled cycle.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use forest_geometry::Position;
use forest_ghost::GhostZoneManager;
use forest_tree::{EntityId, Result, TreeId};

use crate::adaptation::AdaptationEngine;
use crate::forest::Forest;

/// A [`Forest`] with an attached background adaptation/ghost-sync worker.
///
/// Dropping this stops the worker, waiting up to
/// [`crate::config::AdaptationConfig::shutdown_grace`] for it to finish the
/// cycle it's in before giving up and logging a warning; the worker thread
/// itself is left to finish on its own rather than killed.
pub struct AdaptiveForest<C> {
    forest: Arc<Forest<C>>,
    engine: Arc<AdaptationEngine<C>>,
    ghosts: Arc<GhostZoneManager<C>>,
    urgent_tx: Sender<TreeId>,
    stop_tx: Sender<()>,
    worker: Option<JoinHandle<()>>,
    shutdown_grace: Duration,
}

impl<C> std::fmt::Debug for AdaptiveForest<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveForest")
            .field("forest", &self.forest)
            .finish_non_exhaustive()
    }
}

impl<C: Clone + Send + Sync + 'static> AdaptiveForest<C> {
    /// Wrap `forest`, starting the background worker immediately.
    pub fn new(forest: Forest<C>, engine: AdaptationEngine<C>) -> Self {
        let forest = Arc::new(forest);
        let engine = Arc::new(engine);
        let ghosts = Arc::new(GhostZoneManager::new());
        let (urgent_tx, urgent_rx) = unbounded();
        let (stop_tx, stop_rx) = bounded(1);
        let shutdown_grace = engine.config().shutdown_grace;

        let worker = {
            let forest = Arc::clone(&forest);
            let engine = Arc::clone(&engine);
            let ghosts = Arc::clone(&ghosts);
            thread::spawn(move || background_loop(forest, engine, ghosts, urgent_rx, stop_rx))
        };

        Self {
            forest,
            engine,
            ghosts,
            urgent_tx,
            stop_tx,
            worker: Some(worker),
            shutdown_grace,
        }
    }

    /// The underlying forest.
    pub fn forest(&self) -> &Forest<C> {
        &self.forest
    }

    /// The adaptation engine driving subdivision and merge decisions.
    pub fn engine(&self) -> &AdaptationEngine<C> {
        &self.engine
    }

    /// The ghost zone manager kept in sync by the background worker.
    pub fn ghosts(&self) -> &GhostZoneManager<C> {
        &self.ghosts
    }

    /// Insert an entity and, if this pushes a tree past the urgent
    /// threshold, request an out-of-band subdivision rather than waiting
    /// for the next scheduled cycle.
    ///
    /// # Errors
    ///
    /// Propagates [`Forest::insert_entity`]'s errors.
    pub fn insert_entity(&self, position: Position, content: C) -> Result<EntityId> {
        let entity_id = self.forest.insert_entity(position, content)?;
        self.engine.record_operation();
        if self.engine.should_check() {
            for tree_id in self.engine.check_adaptation_triggers(&self.forest) {
                // The worker may already be processing this tree; a
                // redundant send just costs a no-op `consider_subdivision`.
                let _ = self.urgent_tx.send(tree_id);
            }
        }
        Ok(entity_id)
    }

    /// Force one adaptation cycle on the calling thread, outside the
    /// background schedule. Useful for tests and for callers that want a
    /// synchronous guarantee before proceeding.
    pub fn run_cycle_now(&self) -> Vec<forest_tree::ForestError> {
        let errors = self.engine.run_cycle(&self.forest);
        self.ghosts.synchronize_all_ghost_zones(self.forest.as_ref());
        errors
    }

    /// Every ancestor of `tree_id`, nearest first, up to and including the
    /// root. Empty if `tree_id` is a root or unknown.
    pub fn ancestors(&self, tree_id: &TreeId) -> Vec<TreeId> {
        let mut out = Vec::new();
        let mut current = tree_id.clone();
        while let Some(parent) = self.forest.tree(&current).and_then(|n| n.parent_tree_id()) {
            out.push(parent.clone());
            current = parent;
        }
        out
    }

    /// Every descendant of `tree_id`, in breadth-first order. Empty if
    /// `tree_id` is a leaf or unknown.
    pub fn descendants(&self, tree_id: &TreeId) -> Vec<TreeId> {
        let mut out = Vec::new();
        let mut queue: std::collections::VecDeque<TreeId> = self
            .forest
            .tree(tree_id)
            .map(|n| n.child_tree_ids())
            .unwrap_or_default()
            .into();
        while let Some(id) = queue.pop_front() {
            if let Some(node) = self.forest.tree(&id) {
                queue.extend(node.child_tree_ids());
            }
            out.push(id);
        }
        out
    }

    /// `tree_id` itself together with every one of its descendants.
    pub fn subtree(&self, tree_id: &TreeId) -> Vec<TreeId> {
        let mut out = vec![tree_id.clone()];
        out.extend(self.descendants(tree_id));
        out
    }

    /// Every tree with no children, across the whole forest.
    pub fn leaves(&self) -> Vec<TreeId> {
        self.forest
            .trees_snapshot()
            .values()
            .filter(|n| n.is_leaf())
            .map(|n| n.tree_id().clone())
            .collect()
    }

    /// Every tree at exactly `level` in the hierarchy (`0` for roots).
    pub fn trees_at_level(&self, level: u32) -> Vec<TreeId> {
        self.forest
            .trees_snapshot()
            .values()
            .filter(|n| n.hierarchy_level() == level)
            .map(|n| n.tree_id().clone())
            .collect()
    }
}

impl<C> Drop for AdaptiveForest<C> {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.worker.take() {
            join_with_grace(handle, self.shutdown_grace);
        }
    }
}

fn background_loop<C: Clone + Send + Sync + 'static>(
    forest: Arc<Forest<C>>,
    engine: Arc<AdaptationEngine<C>>,
    ghosts: Arc<GhostZoneManager<C>>,
    urgent_rx: Receiver<TreeId>,
    stop_rx: Receiver<()>,
) {
    let ticks = crossbeam_channel::tick(engine.config().background_cycle);
    loop {
        crossbeam_channel::select! {
            recv(ticks) -> _ => {
                for error in engine.run_cycle(&forest) {
                    log::error!("adaptation cycle failed: {error}");
                }
                ghosts.synchronize_all_ghost_zones(forest.as_ref());
            }
            recv(urgent_rx) -> msg => {
                let Ok(tree_id) = msg else { continue };
                match engine.consider_subdivision(&forest, &tree_id, None) {
                    Ok(Some(children)) => {
                        log::info!("urgent subdivision of {tree_id} produced {} children", children.len());
                        ghosts.update_ghost_zone(&tree_id, forest.as_ref());
                    }
                    Ok(None) => {}
                    Err(error) => log::error!("urgent subdivision of {tree_id} failed: {error}"),
                }
            }
            recv(stop_rx) -> _ => return,
        }
    }
}

/// Join `handle`, but stop waiting (and log) after `grace` elapses. The
/// thread itself is not killed — a detached watcher joins it in the
/// background so the handle is never leaked.
fn join_with_grace(handle: JoinHandle<()>, grace: Duration) {
    let (tx, rx) = bounded::<()>(1);
    thread::spawn(move || {
        let _ = handle.join();
        let _ = tx.send(());
    });
    if rx.recv_timeout(grace).is_err() {
        log::warn!("adaptation worker did not stop within {grace:?}, abandoning wait");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdaptationConfig;
    use crate::entity_manager::SpatialBoundsStrategy;
    use forest_geometry::{Aabb, CubicBounds, TreeBounds};
    use forest_tree::{FlatSpatialTree, SequentialIdGenerator};
    use std::time::Duration as StdDuration;

    fn cube(min: f32, max: f32) -> TreeBounds {
        TreeBounds::Cubic(CubicBounds::new(Aabb::new(
            Position::new(min, min, min),
            Position::new(max, max, max),
        )))
    }

    fn short_cycle_config() -> AdaptationConfig {
        AdaptationConfig {
            background_cycle: StdDuration::from_millis(20),
            shutdown_grace: StdDuration::from_millis(500),
            ..AdaptationConfig::default()
        }
    }

    #[test]
    fn inserting_entities_and_running_a_cycle_does_not_panic() {
        let forest = Forest::new(
            "f",
            Arc::new(SequentialIdGenerator::new()),
            Arc::new(SpatialBoundsStrategy::new()),
        );
        forest.add_root_tree(cube(0.0, 100.0), Box::new(FlatSpatialTree::<u32>::new()));

        let engine = AdaptationEngine::new(short_cycle_config(), Arc::new(|| Box::new(FlatSpatialTree::<u32>::new()) as Box<dyn forest_tree::SpatialTree<u32>>));
        let adaptive = AdaptiveForest::new(forest, engine);

        for i in 0..10 {
            adaptive
                .insert_entity(Position::new(i as f32, i as f32, i as f32), i)
                .unwrap();
        }
        let errors = adaptive.run_cycle_now();
        assert!(errors.is_empty());
        assert_eq!(adaptive.forest().entity_count(), 10);
    }

    #[test]
    fn navigation_helpers_walk_the_hierarchy() {
        let forest = Forest::new(
            "f",
            Arc::new(SequentialIdGenerator::new()),
            Arc::new(SpatialBoundsStrategy::new()),
        );
        let root = forest.add_root_tree(cube(0.0, 100.0), Box::new(FlatSpatialTree::<u32>::new()));
        let child = forest.add_tree_with_id(
            TreeId::new("child"),
            cube(0.0, 50.0),
            Box::new(FlatSpatialTree::<u32>::new()),
            Some(root.clone()),
            1,
        );
        let grandchild = forest.add_tree_with_id(
            TreeId::new("grandchild"),
            cube(0.0, 25.0),
            Box::new(FlatSpatialTree::<u32>::new()),
            Some(child.clone()),
            2,
        );
        forest.link_parent_child(&root, &child).unwrap();
        forest.link_parent_child(&child, &grandchild).unwrap();

        let engine = AdaptationEngine::new(short_cycle_config(), Arc::new(|| Box::new(FlatSpatialTree::<u32>::new()) as Box<dyn forest_tree::SpatialTree<u32>>));
        let adaptive = AdaptiveForest::new(forest, engine);

        assert_eq!(adaptive.ancestors(&grandchild), vec![child.clone(), root.clone()]);
        assert_eq!(adaptive.ancestors(&root), Vec::<TreeId>::new());

        let mut descendants = adaptive.descendants(&root);
        descendants.sort();
        let mut expected = vec![child.clone(), grandchild.clone()];
        expected.sort();
        assert_eq!(descendants, expected);

        let mut subtree = adaptive.subtree(&child);
        subtree.sort();
        let mut expected_subtree = vec![child.clone(), grandchild.clone()];
        expected_subtree.sort();
        assert_eq!(subtree, expected_subtree);

        assert!(adaptive.leaves().contains(&grandchild));
        assert!(!adaptive.leaves().contains(&root));
        assert!(!adaptive.leaves().contains(&child));

        assert_eq!(adaptive.trees_at_level(0), vec![root]);
    }

    #[test]
    fn drop_stops_the_worker_within_the_grace_period() {
        let forest = Forest::new(
            "f",
            Arc::new(SequentialIdGenerator::new()),
            Arc::new(SpatialBoundsStrategy::new()),
        );
        forest.add_root_tree(cube(0.0, 10.0), Box::new(FlatSpatialTree::<u32>::new()));
        let engine = AdaptationEngine::new(short_cycle_config(), Arc::new(|| Box::new(FlatSpatialTree::<u32>::new()) as Box<dyn forest_tree::SpatialTree<u32>>));
        let adaptive = AdaptiveForest::new(forest, engine);
        drop(adaptive);
    }
}
