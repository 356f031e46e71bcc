// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Forest Geometry: 3D bounds and geometry primitives for the forest
//! spatial index.
//!
//! This crate is the leaf dependency of the forest core: it knows nothing
//! about entities, trees, or the forest graph. It provides:
//!
//! - [`Position`]: a point in 3D space.
//! - [`Aabb`]: an axis-aligned bounding box with containment, intersection,
//!   and monotonic expansion.
//! - [`TetAnchor`]/[`TetrahedralBounds`]: grid-aligned tetrahedral cells,
//!   the 6-way Kuhn decomposition of a cube into characteristic tetrahedra,
//!   and 8-way Bey subdivision of a tetrahedron.
//! - [`TreeBounds`]: the tagged `Cubic`/`Tetrahedral` variant that the rest
//!   of the forest core dispatches subdivision geometry on.
//!
//! Geometry predicates never fail: `NaN` inputs produce `false` for
//! containment tests and `0.0` for volume, rather than panicking or
//! propagating an error.

mod aabb;
mod bounds;
mod position;
mod tetra;

pub use aabb::Aabb;
pub use bounds::{CubicBounds, TreeBounds};
pub use position::Position;
pub use tetra::{
    cube_to_characteristic_tets, level_for_cube_side, TetAnchor, TetrahedralBounds, MAX_LEVEL,
};
