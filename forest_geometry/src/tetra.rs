// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tetrahedral bounds: anchors, characteristic-tetrahedron tiling of a cube,
//! and Bey subdivision of a tetrahedron into 8 children.

use crate::{Aabb, Position};

/// Maximum tetree level (grid resolution is `1 << (21 - level)`).
pub const MAX_LEVEL: u8 = 21;

/// Barycentric slack tolerated by [`TetrahedralBounds::contains_point`].
const BARYCENTRIC_EPSILON: f32 = 1e-4;

/// The grid-aligned anchor of a tetrahedral cell: a corner of the enclosing
/// cube at `level`, plus a characteristic type in `0..6` selecting which of
/// the 6 Kuhn tetrahedra of that cube this cell is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TetAnchor {
    /// Grid x coordinate, a multiple of [`TetAnchor::cell_size`].
    pub x: i64,
    /// Grid y coordinate, a multiple of [`TetAnchor::cell_size`].
    pub y: i64,
    /// Grid z coordinate, a multiple of [`TetAnchor::cell_size`].
    pub z: i64,
    /// Refinement level, `0..=21`. Level 0 is the coarsest (the root cube).
    pub level: u8,
    /// Characteristic tetrahedron type within the cube, `0..6`.
    pub kind: u8,
}

impl TetAnchor {
    /// The edge length of the cube at `level`, in grid units.
    ///
    /// `1 << (21 - level)`; this is `1` at the maximum level and `1 << 21`
    /// at the root.
    #[inline]
    pub const fn cell_size(level: u8) -> i64 {
        1i64 << (MAX_LEVEL - level)
    }

    /// Round `coord` down to the nearest multiple of `cell_size`.
    #[inline]
    pub const fn snap(coord: i64, cell_size: i64) -> i64 {
        if coord >= 0 {
            (coord / cell_size) * cell_size
        } else {
            // Round toward negative infinity for negative inputs, even
            // though tetree anchors are expected to stay non-negative.
            ((coord - cell_size + 1) / cell_size) * cell_size
        }
    }

    /// Whether this anchor's coordinates are grid-aligned to its own cell
    /// size and its `level`/`kind` are in range.
    pub fn is_valid(&self) -> bool {
        if self.level > MAX_LEVEL || self.kind >= 6 {
            return false;
        }
        if self.x < 0 || self.y < 0 || self.z < 0 {
            return false;
        }
        let size = Self::cell_size(self.level);
        self.x % size == 0 && self.y % size == 0 && self.z % size == 0
    }
}

/// Tetrahedral bounds: the 6-way Kuhn decomposition of the cube described by
/// `anchor`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TetrahedralBounds {
    /// The grid-aligned anchor (cube corner, level, characteristic type).
    pub anchor: TetAnchor,
    /// The 4 vertices of this tetrahedron, derived from `anchor`.
    pub vertices: [Position; 4],
}

impl TetrahedralBounds {
    /// Construct tetrahedral bounds from a grid anchor.
    ///
    /// Returns `None` if the anchor is invalid (out-of-range level/kind, a
    /// negative coordinate, or misaligned to its cell size).
    pub fn from_anchor(anchor: TetAnchor) -> Option<Self> {
        if !anchor.is_valid() {
            return None;
        }
        let vertices = characteristic_tet_vertices(anchor.x, anchor.y, anchor.z, anchor.level, anchor.kind);
        Some(Self { anchor, vertices })
    }

    /// The arithmetic mean of the 4 vertices.
    pub fn centroid(&self) -> Position {
        // `Position::centroid` only returns `None` for an empty slice.
        Position::centroid(&self.vertices).expect("tetrahedron always has 4 vertices")
    }

    /// The axis-aligned bounding box of the 4 vertices.
    pub fn aabb(&self) -> Aabb {
        let mut min = self.vertices[0];
        let mut max = self.vertices[0];
        for v in &self.vertices[1..] {
            min = Position::new(min.x.min(v.x), min.y.min(v.y), min.z.min(v.z));
            max = Position::new(max.x.max(v.x), max.y.max(v.y), max.z.max(v.z));
        }
        Aabb::new(min, max)
    }

    /// Signed volume `(v1-v0)·((v2-v0)×(v3-v0)) / 6`.
    fn signed_volume(&self) -> f32 {
        signed_tet_volume(&self.vertices)
    }

    /// The (unsigned) volume of the tetrahedron.
    pub fn volume(&self) -> f32 {
        self.signed_volume().abs()
    }

    /// Barycentric coordinates of `p` with respect to this tetrahedron's
    /// vertices, in vertex order. Each coordinate is `sub_volume_i / total`.
    ///
    /// Returns `None` if the tetrahedron is degenerate (near-zero volume).
    pub fn barycentric(&self, p: &Position) -> Option<[f32; 4]> {
        let [v0, v1, v2, v3] = self.vertices;
        let total = self.signed_volume();
        if total.abs() < f32::EPSILON {
            return None;
        }
        let b0 = signed_tet_volume(&[*p, v1, v2, v3]) / total;
        let b1 = signed_tet_volume(&[v0, *p, v2, v3]) / total;
        let b2 = signed_tet_volume(&[v0, v1, *p, v3]) / total;
        let b3 = signed_tet_volume(&[v0, v1, v2, *p]) / total;
        Some([b0, b1, b2, b3])
    }

    /// Whether `p` lies within the tetrahedron (barycentric coordinates all
    /// `>= -epsilon`).
    ///
    /// `NaN` in `p` always yields `false`.
    pub fn contains_point(&self, p: &Position) -> bool {
        if !p.is_finite() {
            return false;
        }
        match self.barycentric(p) {
            Some(b) => b.iter().all(|c| *c >= -BARYCENTRIC_EPSILON),
            None => false,
        }
    }

    /// Split this tetrahedron into 8 Bey children at `level + 1`.
    ///
    /// The children are ordered: 4 "corner" children similar to the parent
    /// (each sharing one parent vertex), followed by 4 "interior" children
    /// formed by splitting the central octahedron across a fixed diagonal
    /// (`e02`–`e13`, a deterministic but otherwise arbitrary choice — see
    /// DESIGN.md).
    pub fn bey_children(&self) -> [[Position; 4]; 8] {
        let [v0, v1, v2, v3] = self.vertices;
        let e01 = v0.midpoint(&v1);
        let e02 = v0.midpoint(&v2);
        let e03 = v0.midpoint(&v3);
        let e12 = v1.midpoint(&v2);
        let e13 = v1.midpoint(&v3);
        let e23 = v2.midpoint(&v3);
        [
            [v0, e01, e02, e03],
            [e01, v1, e12, e13],
            [e02, e12, v2, e23],
            [e03, e13, e23, v3],
            [e01, e02, e03, e13],
            [e01, e02, e12, e13],
            [e02, e03, e13, e23],
            [e02, e12, e13, e23],
        ]
    }
}

fn signed_tet_volume(v: &[Position; 4]) -> f32 {
    let [v0, v1, v2, v3] = *v;
    let a = Position::new(v1.x - v0.x, v1.y - v0.y, v1.z - v0.z);
    let b = Position::new(v2.x - v0.x, v2.y - v0.y, v2.z - v0.z);
    let c = Position::new(v3.x - v0.x, v3.y - v0.y, v3.z - v0.z);
    // a . (b x c)
    let cross_x = b.y * c.z - b.z * c.y;
    let cross_y = b.z * c.x - b.x * c.z;
    let cross_z = b.x * c.y - b.y * c.x;
    (a.x * cross_x + a.y * cross_y + a.z * cross_z) / 6.0
}

/// The 4 vertices of the Kuhn characteristic tetrahedron of `kind` (`0..6`)
/// within the cube anchored at `(x, y, z)` at `level`.
fn characteristic_tet_vertices(x: i64, y: i64, z: i64, level: u8, kind: u8) -> [Position; 4] {
    let s = TetAnchor::cell_size(level) as f32;
    let (x, y, z) = (x as f32, y as f32, z as f32);
    let v000 = Position::new(x, y, z);
    let v100 = Position::new(x + s, y, z);
    let v010 = Position::new(x, y + s, z);
    let v001 = Position::new(x, y, z + s);
    let v110 = Position::new(x + s, y + s, z);
    let v101 = Position::new(x + s, y, z + s);
    let v011 = Position::new(x, y + s, z + s);
    let v111 = Position::new(x + s, y + s, z + s);
    // Kuhn's triangulation of a cube into 6 tetrahedra along the main
    // diagonal v000-v111, one per permutation of the axis order.
    match kind {
        0 => [v000, v100, v110, v111], // order x, y, z
        1 => [v000, v100, v101, v111], // order x, z, y
        2 => [v000, v010, v110, v111], // order y, x, z
        3 => [v000, v010, v011, v111], // order y, z, x
        4 => [v000, v001, v101, v111], // order z, x, y
        _ => [v000, v001, v011, v111], // order z, y, x
    }
}

/// The 6 characteristic tetrahedra (types `0..6`) tiling the cube anchored
/// at `(x, y, z)` at `level`.
pub fn cube_to_characteristic_tets(x: i64, y: i64, z: i64, level: u8) -> [[Position; 4]; 6] {
    core::array::from_fn(|kind| characteristic_tet_vertices(x, y, z, level, kind as u8))
}

/// Smallest level `L` such that `cell_size(L) >= side`, or `None` if no such
/// level exists within `0..=21` (i.e. `side` exceeds the root cell size).
pub fn level_for_cube_side(side: f32) -> Option<u8> {
    if !side.is_finite() || side <= 0.0 {
        return None;
    }
    for level in 0..=MAX_LEVEL {
        if TetAnchor::cell_size(level) as f32 >= side {
            return Some(level);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_size_halves_per_level() {
        assert_eq!(TetAnchor::cell_size(0), 1 << 21);
        assert_eq!(TetAnchor::cell_size(21), 1);
        assert_eq!(TetAnchor::cell_size(20), 2);
    }

    #[test]
    fn invalid_anchor_rejected() {
        let bad = TetAnchor {
            x: 3,
            y: 0,
            z: 0,
            level: 5,
            kind: 0,
        };
        assert!(!bad.is_valid());
        assert!(TetrahedralBounds::from_anchor(bad).is_none());
    }

    #[test]
    fn negative_anchor_rejected() {
        let bad = TetAnchor {
            x: -1,
            y: 0,
            z: 0,
            level: 0,
            kind: 0,
        };
        assert!(!bad.is_valid());
    }

    #[test]
    fn six_characteristic_tets_tile_cube_volume() {
        let side = 8.0_f32;
        let tets = cube_to_characteristic_tets(0, 0, 0, level_for_cube_side(side).unwrap());
        let total: f32 = tets.iter().map(|v| signed_tet_volume(v).abs()).sum();
        assert!((total - side.powi(3)).abs() < 1.0);
    }

    #[test]
    fn characteristic_tet_contains_its_own_centroid() {
        let level = level_for_cube_side(8.0).unwrap();
        let anchor = TetAnchor {
            x: 0,
            y: 0,
            z: 0,
            level,
            kind: 2,
        };
        let bounds = TetrahedralBounds::from_anchor(anchor).unwrap();
        let c = bounds.centroid();
        assert!(bounds.contains_point(&c));
    }

    #[test]
    fn point_outside_cube_not_contained() {
        let level = level_for_cube_side(8.0).unwrap();
        let anchor = TetAnchor {
            x: 0,
            y: 0,
            z: 0,
            level,
            kind: 0,
        };
        let bounds = TetrahedralBounds::from_anchor(anchor).unwrap();
        assert!(!bounds.contains_point(&Position::new(1000.0, 1000.0, 1000.0)));
    }

    #[test]
    fn bey_children_volumes_sum_to_parent() {
        let level = level_for_cube_side(8.0).unwrap();
        let anchor = TetAnchor {
            x: 0,
            y: 0,
            z: 0,
            level,
            kind: 0,
        };
        let bounds = TetrahedralBounds::from_anchor(anchor).unwrap();
        let parent_vol = bounds.volume();
        let children = bounds.bey_children();
        let child_vol_sum: f32 = children.iter().map(|v| signed_tet_volume(v).abs()).sum();
        assert!((parent_vol - child_vol_sum).abs() < 1e-3);
    }

    #[test]
    fn bey_child_contains_its_own_centroid() {
        let level = level_for_cube_side(8.0).unwrap();
        let anchor = TetAnchor {
            x: 0,
            y: 0,
            z: 0,
            level,
            kind: 0,
        };
        let bounds = TetrahedralBounds::from_anchor(anchor).unwrap();
        for child in bounds.bey_children() {
            let child_bounds = TetrahedralBounds {
                anchor: TetAnchor {
                    level: level + 1,
                    ..anchor
                },
                vertices: child,
            };
            let c = child_bounds.centroid();
            assert!(child_bounds.contains_point(&c));
        }
    }
}
