// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pure subdivision geometry: given a tree's bounds (and, for the
//! density-aware strategies, its entities' positions), compute the bounds
//! of its children. No locking, no forest state — these functions are free
//! functions precisely so the adaptation engine can unit-test and reuse
//! them independently of any tree.

use forest_geometry::{
    cube_to_characteristic_tets, level_for_cube_side, Aabb, CubicBounds, Position, TetAnchor,
    TetrahedralBounds, TreeBounds,
};
use smallvec::SmallVec;

use crate::config::SubdivisionStrategy;

/// Up to 8 children; inline-stored for the common octant/Bey case.
pub type ChildBounds = SmallVec<[TreeBounds; 8]>;

fn cubic(aabb: Aabb) -> TreeBounds {
    TreeBounds::Cubic(CubicBounds::new(aabb))
}

/// Split `aabb` into its 8 octants.
pub fn octant_split(aabb: &Aabb) -> [Aabb; 8] {
    let c = aabb.center();
    let mut out = [Aabb::new(aabb.min, aabb.max); 8];
    for (i, slot) in out.iter_mut().enumerate() {
        let x_lo = i & 1 == 0;
        let y_lo = i & 2 == 0;
        let z_lo = i & 4 == 0;
        let min = Position::new(
            if x_lo { aabb.min.x } else { c.x },
            if y_lo { aabb.min.y } else { c.y },
            if z_lo { aabb.min.z } else { c.z },
        );
        let max = Position::new(
            if x_lo { c.x } else { aabb.max.x },
            if y_lo { c.y } else { aabb.max.y },
            if z_lo { c.z } else { aabb.max.z },
        );
        *slot = Aabb::new(min, max);
    }
    out
}

/// Which axis a binary split divides along.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Axis {
    /// The X axis.
    X,
    /// The Y axis.
    Y,
    /// The Z axis.
    Z,
}

/// Split `aabb` at its midplane along `axis`.
pub fn binary_split(axis: Axis, aabb: &Aabb) -> [Aabb; 2] {
    let c = aabb.center();
    let (lo_max, hi_min) = match axis {
        Axis::X => (
            Position::new(c.x, aabb.max.y, aabb.max.z),
            Position::new(c.x, aabb.min.y, aabb.min.z),
        ),
        Axis::Y => (
            Position::new(aabb.max.x, c.y, aabb.max.z),
            Position::new(aabb.min.x, c.y, aabb.min.z),
        ),
        Axis::Z => (
            Position::new(aabb.max.x, aabb.max.y, c.z),
            Position::new(aabb.min.x, aabb.min.y, c.z),
        ),
    };
    [Aabb::new(aabb.min, lo_max), Aabb::new(hi_min, aabb.max)]
}

fn variance(values: impl Iterator<Item = f32>, mean: f32) -> f32 {
    let mut count = 0usize;
    let mut sum_sq = 0.0f32;
    for v in values {
        sum_sq += (v - mean) * (v - mean);
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum_sq / count as f32
    }
}

/// Pick a binary split axis by largest per-axis variance of `positions`,
/// falling back to an 8-way octant split when there are too few positions
/// (`< 2`) to measure variance, or when all three variances are equal
/// (including all-zero).
pub fn adaptive_split(aabb: &Aabb, positions: &[Position]) -> ChildBounds {
    if positions.len() < 2 {
        return octant_split(aabb).into_iter().map(cubic).collect();
    }
    let n = positions.len() as f32;
    let mean_x = positions.iter().map(|p| p.x).sum::<f32>() / n;
    let mean_y = positions.iter().map(|p| p.y).sum::<f32>() / n;
    let mean_z = positions.iter().map(|p| p.z).sum::<f32>() / n;
    let var_x = variance(positions.iter().map(|p| p.x), mean_x);
    let var_y = variance(positions.iter().map(|p| p.y), mean_y);
    let var_z = variance(positions.iter().map(|p| p.z), mean_z);

    let axis = if var_x > var_y && var_x > var_z {
        Some(Axis::X)
    } else if var_y > var_x && var_y > var_z {
        Some(Axis::Y)
    } else if var_z > var_x && var_z > var_y {
        Some(Axis::Z)
    } else {
        None
    };

    match axis {
        Some(axis) => binary_split(axis, aabb).into_iter().map(cubic).collect(),
        None => octant_split(aabb).into_iter().map(cubic).collect(),
    }
}

/// Partition `positions` into `k` clusters with Lloyd's algorithm, seeded
/// deterministically from the bounding box octants (not randomly: a
/// subdivision decision must be reproducible given the same entity
/// snapshot). Runs for `iterations` rounds or until assignments stop
/// changing, whichever comes first.
///
/// Returns one assignment (cluster index in `0..k`) per input position.
pub fn kmeans_assign(aabb: &Aabb, positions: &[Position], k: usize, iterations: usize) -> Vec<usize> {
    if positions.is_empty() || k == 0 {
        return Vec::new();
    }
    let seeds = octant_split(aabb);
    let mut centroids: Vec<Position> = seeds.iter().take(k).map(|b| b.center()).collect();
    while centroids.len() < k {
        centroids.push(aabb.center());
    }

    let mut assignments = vec![0usize; positions.len()];
    for _ in 0..iterations.max(1) {
        let mut changed = false;
        for (i, p) in positions.iter().enumerate() {
            let mut best = 0usize;
            let mut best_dist = f32::MAX;
            for (c, centroid) in centroids.iter().enumerate() {
                let d = p.distance_squared(centroid);
                if d < best_dist {
                    best_dist = d;
                    best = c;
                }
            }
            if assignments[i] != best {
                assignments[i] = best;
                changed = true;
            }
        }

        let mut sums = vec![(0.0f32, 0.0f32, 0.0f32, 0usize); k];
        for (p, &a) in positions.iter().zip(assignments.iter()) {
            let entry = &mut sums[a];
            entry.0 += p.x;
            entry.1 += p.y;
            entry.2 += p.z;
            entry.3 += 1;
        }
        for (c, (sx, sy, sz, count)) in sums.into_iter().enumerate() {
            if count > 0 {
                centroids[c] = Position::new(sx / count as f32, sy / count as f32, sz / count as f32);
            }
        }

        if !changed {
            break;
        }
    }
    assignments
}

/// Bound each of the `k` clusters produced by [`kmeans_assign`] with the
/// AABB of its member positions, clipped to `parent`. Empty clusters
/// collapse to a zero-volume box at the parent's center, so callers that
/// redistribute entities by point-in-bounds still see `k` children even
/// when a cluster is empty (merge/density bookkeeping expects a stable
/// child count per subdivision).
pub fn kmeans_split(parent: &Aabb, positions: &[Position], k: usize, iterations: usize) -> ChildBounds {
    let assignments = kmeans_assign(parent, positions, k, iterations);
    let mut boxes: Vec<Option<Aabb>> = vec![None; k];
    for (p, &a) in positions.iter().zip(assignments.iter()) {
        boxes[a] = Some(match boxes[a] {
            Some(existing) => existing.expand_to_cover(&Aabb::new(*p, *p)),
            None => Aabb::new(*p, *p),
        });
    }
    boxes
        .into_iter()
        .map(|maybe| {
            let aabb = maybe.unwrap_or_else(|| Aabb::new(parent.center(), parent.center()));
            cubic(aabb)
        })
        .collect()
}

/// Split cubic bounds into the 6 characteristic tetrahedra of their cube, or
/// tetrahedral bounds into their 8 Bey children.
///
/// Returns `None` for cubic bounds whose side length/position cannot be
/// represented on the tetree grid (a non-cubic box, or one whose level
/// exceeds [`forest_geometry::MAX_LEVEL`]); callers should fall back to
/// [`SubdivisionStrategy::Octant`] in that case, matching the policy
/// recorded in this repository's design notes.
pub fn tetrahedral_split(bounds: &TreeBounds) -> Option<ChildBounds> {
    match bounds {
        TreeBounds::Cubic(c) => {
            let extent = c.aabb.extent();
            let side = extent.x;
            if (extent.x - extent.y).abs() > 1e-3 || (extent.x - extent.z).abs() > 1e-3 {
                return None;
            }
            if !c.aabb.min.is_non_negative() {
                return None;
            }
            let level = level_for_cube_side(side)?;
            let x = c.aabb.min.x.round() as i64;
            let y = c.aabb.min.y.round() as i64;
            let z = c.aabb.min.z.round() as i64;
            let tets = cube_to_characteristic_tets(x, y, z, level);
            Some(
                tets.into_iter()
                    .enumerate()
                    .map(|(kind, vertices)| {
                        TreeBounds::Tetrahedral(TetrahedralBounds {
                            anchor: TetAnchor {
                                x,
                                y,
                                z,
                                level,
                                kind: kind as u8,
                            },
                            vertices,
                        })
                    })
                    .collect(),
            )
        }
        TreeBounds::Tetrahedral(t) => {
            if t.anchor.level >= forest_geometry::MAX_LEVEL {
                return None;
            }
            let children = t.bey_children();
            Some(
                children
                    .into_iter()
                    .map(|vertices| {
                        TreeBounds::Tetrahedral(TetrahedralBounds {
                            anchor: TetAnchor {
                                level: t.anchor.level + 1,
                                ..t.anchor
                            },
                            vertices,
                        })
                    })
                    .collect(),
            )
        }
    }
}

/// Compute child bounds for `bounds` under `strategy`, given the positions
/// of the entities currently stored (used only by
/// [`SubdivisionStrategy::Adaptive`] and [`SubdivisionStrategy::KMeans`]).
///
/// Falls back to [`SubdivisionStrategy::Octant`] when `strategy` is
/// [`SubdivisionStrategy::Tetrahedral`] but `bounds` cannot be split that
/// way (see [`tetrahedral_split`]), and when a binary strategy is requested
/// on tetrahedral bounds (binary splits are not defined for tetrahedra).
pub fn compute_child_bounds(
    strategy: SubdivisionStrategy,
    bounds: &TreeBounds,
    positions: &[Position],
) -> ChildBounds {
    let aabb = bounds.aabb_projection();
    match (strategy, bounds) {
        (SubdivisionStrategy::Tetrahedral, _) => {
            tetrahedral_split(bounds).unwrap_or_else(|| octant_split(&aabb).into_iter().map(cubic).collect())
        }
        (_, TreeBounds::Tetrahedral(_)) => {
            // Non-tetrahedral strategies are undefined on tetrahedral
            // bounds; Bey subdivision is the only valid split for a tetree
            // leaf regardless of the configured strategy.
            tetrahedral_split(bounds).unwrap_or_default()
        }
        (SubdivisionStrategy::Octant, _) => octant_split(&aabb).into_iter().map(cubic).collect(),
        (SubdivisionStrategy::BinaryX, _) => binary_split(Axis::X, &aabb).into_iter().map(cubic).collect(),
        (SubdivisionStrategy::BinaryY, _) => binary_split(Axis::Y, &aabb).into_iter().map(cubic).collect(),
        (SubdivisionStrategy::BinaryZ, _) => binary_split(Axis::Z, &aabb).into_iter().map(cubic).collect(),
        (SubdivisionStrategy::Adaptive, _) => adaptive_split(&aabb, positions),
        (SubdivisionStrategy::KMeans, _) => {
            if positions.len() < 8 {
                octant_split(&aabb).into_iter().map(cubic).collect()
            } else {
                kmeans_split(&aabb, positions, 8, 10)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(side: f32) -> Aabb {
        Aabb::new(Position::zero(), Position::new(side, side, side))
    }

    #[test]
    fn octant_split_covers_parent_volume_exactly() {
        let parent = cube(4.0);
        let children = octant_split(&parent);
        let total: f32 = children.iter().map(|c| c.volume()).sum();
        assert!((total - parent.volume()).abs() < 1e-6);
        assert_eq!(children.len(), 8);
    }

    #[test]
    fn binary_split_covers_parent_volume_exactly() {
        let parent = cube(4.0);
        let children = binary_split(Axis::X, &parent);
        let total: f32 = children.iter().map(|c| c.volume()).sum();
        assert!((total - parent.volume()).abs() < 1e-6);
    }

    #[test]
    fn adaptive_split_falls_back_to_octant_with_few_positions() {
        let parent = cube(4.0);
        let children = adaptive_split(&parent, &[Position::new(1.0, 1.0, 1.0)]);
        assert_eq!(children.len(), 8);
    }

    #[test]
    fn adaptive_split_picks_high_variance_axis() {
        let parent = cube(4.0);
        // spread widely along X, tightly along Y and Z
        let positions = vec![
            Position::new(0.1, 2.0, 2.0),
            Position::new(3.9, 2.0, 2.0),
            Position::new(0.2, 2.1, 1.9),
            Position::new(3.8, 1.9, 2.1),
        ];
        let children = adaptive_split(&parent, &positions);
        assert_eq!(children.len(), 2);
    }

    #[test]
    fn kmeans_split_produces_k_children() {
        let parent = cube(4.0);
        let positions: Vec<Position> = (0..20)
            .map(|i| Position::new((i % 4) as f32, (i % 3) as f32, (i % 2) as f32))
            .collect();
        let children = kmeans_split(&parent, &positions, 8, 5);
        assert_eq!(children.len(), 8);
    }

    #[test]
    fn tetrahedral_split_of_root_cube_yields_six_tets() {
        let level = level_for_cube_side(8.0).unwrap();
        let bounds = TreeBounds::Cubic(CubicBounds::new(Aabb::new(
            Position::zero(),
            Position::new(8.0, 8.0, 8.0),
        )));
        let _ = level;
        let children = tetrahedral_split(&bounds).unwrap();
        assert_eq!(children.len(), 6);
        let total: f32 = children.iter().map(|b| b.volume()).sum();
        assert!((total - 512.0).abs() < 1.0);
    }

    #[test]
    fn tetrahedral_split_of_non_cubic_box_falls_back() {
        let bounds = TreeBounds::Cubic(CubicBounds::new(Aabb::new(
            Position::zero(),
            Position::new(8.0, 4.0, 8.0),
        )));
        assert!(tetrahedral_split(&bounds).is_none());
    }

    #[test]
    fn bey_split_preserves_volume() {
        let anchor = TetAnchor {
            x: 0,
            y: 0,
            z: 0,
            level: level_for_cube_side(8.0).unwrap(),
            kind: 0,
        };
        let t = TetrahedralBounds::from_anchor(anchor).unwrap();
        let parent_volume = t.volume();
        let bounds = TreeBounds::Tetrahedral(t);
        let children = tetrahedral_split(&bounds).unwrap();
        assert_eq!(children.len(), 8);
        let total: f32 = children.iter().map(|b| b.volume()).sum();
        assert!((total - parent_volume).abs() < 1e-2);
    }
}
