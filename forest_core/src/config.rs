// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Adaptation configuration: the enumerated knobs the adaptation engine
//! reads, with defaults chosen to match the worked examples in the design.

use std::time::Duration;

/// Which geometric strategy the adaptation engine uses to split an
/// over-dense tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum SubdivisionStrategy {
    /// 8 children split by the bit-triple of each axis (the default).
    #[default]
    Octant,
    /// 2 children split at the X midplane.
    BinaryX,
    /// 2 children split at the Y midplane.
    BinaryY,
    /// 2 children split at the Z midplane.
    BinaryZ,
    /// Pick `BinaryX`/`BinaryY`/`BinaryZ` by largest per-axis variance of
    /// entity positions (ties favor `Octant`).
    Adaptive,
    /// 8-means clustering of entity positions.
    KMeans,
    /// Cubic bounds split into 6 characteristic tetrahedra, or tetrahedral
    /// bounds split into 8 Bey children.
    Tetrahedral,
}

/// The enumerated adaptation knobs (see the design's configuration table).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AdaptationConfig {
    /// Subdivide when a tree's entity count exceeds this.
    pub max_entities_per_tree: usize,
    /// A tree is a merge candidate when its entity count is below this.
    pub min_entities_per_tree: usize,
    /// Subdivide when a tree's density (`count / volume`) exceeds this.
    pub density_threshold: f32,
    /// Refuse to subdivide a tree whose volume is `<= 8 * min_tree_volume`.
    pub min_tree_volume: f32,
    /// Cap on the volume of a tree produced by merging.
    pub max_tree_volume: f32,
    /// Number of tracked operations between trigger checks.
    pub density_check_interval: u64,
    /// Master switch for automatic subdivision.
    pub enable_auto_subdivision: bool,
    /// Master switch for automatic merging.
    pub enable_auto_merging: bool,
    /// The configured subdivision strategy.
    pub subdivision_strategy: SubdivisionStrategy,
    /// Interval of the background density-analysis cycle.
    pub background_cycle: Duration,
    /// Bounded wait for in-flight operations during shutdown.
    pub shutdown_grace: Duration,
    /// Default ghost-zone width used when a relation doesn't specify one.
    pub default_ghost_zone_width: f32,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            max_entities_per_tree: 256,
            min_entities_per_tree: 16,
            density_threshold: 1.0,
            min_tree_volume: 1.0,
            max_tree_volume: f32::MAX,
            density_check_interval: 64,
            enable_auto_subdivision: true,
            enable_auto_merging: true,
            subdivision_strategy: SubdivisionStrategy::Octant,
            background_cycle: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(5),
            default_ghost_zone_width: 1.0,
        }
    }
}

impl AdaptationConfig {
    /// The "urgent" threshold for [`crate::adaptation::AdaptationEngine::check_adaptation_triggers`]:
    /// `1.5 * max_entities_per_tree`, rounded down.
    pub fn urgent_entity_threshold(&self) -> usize {
        (self.max_entities_per_tree as f32 * 1.5) as usize
    }

    /// The minimum tree volume a subdivision is allowed to proceed past:
    /// `8 * min_tree_volume`.
    pub fn subdivision_volume_floor(&self) -> f32 {
        8.0 * self.min_tree_volume
    }

    /// The low-density threshold: `0.1 * density_threshold`.
    pub fn low_density_threshold(&self) -> f32 {
        0.1 * self.density_threshold
    }
}
