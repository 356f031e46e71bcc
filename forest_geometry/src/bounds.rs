// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The tagged `TreeBounds` variant: a tree is either cubic (backed by an
//! octree) or tetrahedral (backed by a tetree).

use crate::{Aabb, Position, TetrahedralBounds};

/// Cubic bounds: a plain AABB, backing an octree.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CubicBounds {
    /// The axis-aligned box.
    pub aabb: Aabb,
}

impl CubicBounds {
    /// Wrap an AABB as cubic bounds.
    #[inline]
    pub const fn new(aabb: Aabb) -> Self {
        Self { aabb }
    }
}

/// The bounds of one tree in the forest: either [`CubicBounds`] (an octree)
/// or [`TetrahedralBounds`] (a tetree).
///
/// This is the central polymorphism point of the forest core: subdivision,
/// containment, and volume all dispatch on this variant rather than on a
/// trait object, since the two shapes need fundamentally different
/// subdivision geometry (§4.G of the design).
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TreeBounds {
    /// An axis-aligned cube (octree).
    Cubic(CubicBounds),
    /// A tetrahedron (tetree).
    Tetrahedral(TetrahedralBounds),
}

impl TreeBounds {
    /// Whether `p` lies within these bounds.
    pub fn contains_point(&self, p: &Position) -> bool {
        match self {
            Self::Cubic(c) => c.aabb.contains_point(p),
            Self::Tetrahedral(t) => t.contains_point(p),
        }
    }

    /// The centroid of these bounds.
    pub fn centroid(&self) -> Position {
        match self {
            Self::Cubic(c) => c.aabb.center(),
            Self::Tetrahedral(t) => t.centroid(),
        }
    }

    /// The volume of these bounds.
    pub fn volume(&self) -> f32 {
        match self {
            Self::Cubic(c) => c.aabb.volume(),
            Self::Tetrahedral(t) => t.volume(),
        }
    }

    /// The axis-aligned bounding box of these bounds (identity for cubic
    /// bounds; the AABB of the 4 vertices for tetrahedral bounds).
    pub fn aabb_projection(&self) -> Aabb {
        match self {
            Self::Cubic(c) => c.aabb,
            Self::Tetrahedral(t) => t.aabb(),
        }
    }

    /// Whether the underlying spatial index for these bounds is a tetree.
    pub fn is_tetrahedral(&self) -> bool {
        matches!(self, Self::Tetrahedral(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TetAnchor;

    #[test]
    fn cubic_dispatch_matches_aabb() {
        let aabb = Aabb::new(Position::new(0.0, 0.0, 0.0), Position::new(2.0, 2.0, 2.0));
        let bounds = TreeBounds::Cubic(CubicBounds::new(aabb));
        assert_eq!(bounds.volume(), 8.0);
        assert!(bounds.contains_point(&Position::new(1.0, 1.0, 1.0)));
        assert!(!bounds.is_tetrahedral());
    }

    #[test]
    fn tetrahedral_dispatch_matches_tet() {
        let anchor = TetAnchor {
            x: 0,
            y: 0,
            z: 0,
            level: 10,
            kind: 1,
        };
        let t = TetrahedralBounds::from_anchor(anchor).unwrap();
        let bounds = TreeBounds::Tetrahedral(t);
        assert!(bounds.is_tetrahedral());
        assert!(bounds.volume() > 0.0);
    }
}
