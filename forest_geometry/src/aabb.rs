// Copyright 2025 the Forest Core Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Axis-aligned bounding boxes.

use crate::Position;

/// An axis-aligned bounding box with `min` and `max` corners.
///
/// `min` is assumed to be componentwise `<= max`; constructors do not
/// reorder coordinates, since callers (e.g. subdivision strategies) rely on
/// the corners meaning exactly "low" and "high" along each axis.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb {
    /// The minimum corner.
    pub min: Position,
    /// The maximum corner.
    pub max: Position,
}

impl Aabb {
    /// Create a new AABB from its min/max corners.
    #[inline]
    pub const fn new(min: Position, max: Position) -> Self {
        Self { min, max }
    }

    /// The center point of the box.
    #[inline]
    pub fn center(&self) -> Position {
        self.min.midpoint(&self.max)
    }

    /// The side lengths of the box along each axis.
    #[inline]
    pub fn extent(&self) -> Position {
        Position::new(
            self.max.x - self.min.x,
            self.max.y - self.min.y,
            self.max.z - self.min.z,
        )
    }

    /// The volume of the box, `Δx·Δy·Δz`.
    ///
    /// Returns `0.0` if any extent is negative or any coordinate is `NaN`.
    #[inline]
    pub fn volume(&self) -> f32 {
        let e = self.extent();
        if !e.is_finite() || e.x < 0.0 || e.y < 0.0 || e.z < 0.0 {
            return 0.0;
        }
        e.x * e.y * e.z
    }

    /// Whether the box contains `p` using closed intervals on every axis.
    ///
    /// `NaN` coordinates in either the box or the point make this `false`.
    #[inline]
    pub fn contains_point(&self, p: &Position) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Whether this box and `other` overlap, using closed half-space tests
    /// on each axis (boxes that share only a face/edge/vertex overlap).
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// The axis-aligned intersection of this box and `other`.
    ///
    /// The result may be empty (inverted) if the boxes do not overlap;
    /// callers that care should check [`Aabb::intersects`] first, or check
    /// [`Aabb::volume`] of the result.
    pub fn intersection(&self, other: &Self) -> Self {
        Self::new(
            Position::new(
                self.min.x.max(other.min.x),
                self.min.y.max(other.min.y),
                self.min.z.max(other.min.z),
            ),
            Position::new(
                self.max.x.min(other.max.x),
                self.max.y.min(other.max.y),
                self.max.z.min(other.max.z),
            ),
        )
    }

    /// Return a new box expanded to cover both this box and `other`
    /// (componentwise min of mins, max of maxes).
    pub fn expand_to_cover(&self, other: &Self) -> Self {
        Self::new(
            Position::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            Position::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        )
    }

    /// Squared distance from `p` to the closest point on this box.
    ///
    /// Zero if `p` is inside the box.
    pub fn distance_squared_to_point(&self, p: &Position) -> f32 {
        let closest = self.closest_point(p);
        closest.distance_squared(p)
    }

    /// The closest point on (or in) this box to `p`.
    pub fn closest_point(&self, p: &Position) -> Position {
        Position::new(
            p.x.clamp(self.min.x, self.max.x),
            p.y.clamp(self.min.y, self.max.y),
            p.z.clamp(self.min.z, self.max.z),
        )
    }

    /// Axis-aligned separation between this box and `other`: for each axis,
    /// the gap between the boxes (zero or negative if they overlap on that
    /// axis).
    pub fn axis_separations(&self, other: &Self) -> [f32; 3] {
        [
            axis_gap(self.min.x, self.max.x, other.min.x, other.max.x),
            axis_gap(self.min.y, self.max.y, other.min.y, other.max.y),
            axis_gap(self.min.z, self.max.z, other.min.z, other.max.z),
        ]
    }
}

fn axis_gap(a_min: f32, a_max: f32, b_min: f32, b_max: f32) -> f32 {
    if a_max < b_min {
        b_min - a_max
    } else if b_max < a_min {
        a_min - b_max
    } else {
        0.0
    }
}
