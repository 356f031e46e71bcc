// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Forest Ghost: cross-tree ghost zone replication.
//!
//! A tree's spatial index only ever answers queries about the entities it
//! directly stores. Queries near a tree's boundary (range queries,
//! nearest-neighbor, collision checks) need visibility into entities just
//! across that boundary too. This crate computes, per tree, the set of
//! neighboring entities within a configurable width of the shared
//! boundary — the tree's *ghost zone* — without those entities actually
//! moving: they stay owned by their source tree and are copied into the
//! neighbor's read-only ghost cache.
//!
//! This crate depends only on [`forest_geometry`] and [`forest_tree`]; it
//! has no dependency on the concrete forest implementation. It consumes
//! forest topology and content through the [`NeighborSource`] trait, which
//! a forest implements to hand this crate read-only, on-demand access.

mod manager;
mod neighbor_source;
mod zone;

pub use manager::{GhostZoneManager, DEFAULT_GHOST_ZONE_WIDTH};
pub use neighbor_source::NeighborSource;
pub use zone::{in_ghost_zone, GhostEntity, GhostZoneRelation};
