use super::curve::ParametricCurve2d;
use super::util::cross;
use super::{Point2d, Vector2d};
use crate::util::Interval;
use cgmath::prelude::*;

/// Determinants smaller than this (relative to the edge lengths) mean the segments are parallel.
const PARALLEL_EPSILON: f64 = 1e-12;

/// A straight line segment.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LineSegment2d {
    pub start: Point2d,
    pub end: Point2d,
}

impl LineSegment2d {
    pub const fn from_ends(start: Point2d, end: Point2d) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    /// The vector from the start to the end of the segment.
    pub fn delta(&self) -> Vector2d {
        self.end - self.start
    }

    /// Intersects two segments, returning the parameter along each where they cross.
    ///
    /// Each segment is extended by `slack` units at both ends before testing.
    /// Parallel or zero-length segments never intersect.
    pub fn intersect(&self, other: &LineSegment2d, slack: f64) -> Option<(f64, f64)> {
        let r = self.delta();
        let s = other.delta();
        let (r_len, s_len) = (r.magnitude(), s.magnitude());
        let denom = cross(r, s);
        if denom.abs() <= PARALLEL_EPSILON * r_len * s_len || r_len == 0.0 || s_len == 0.0 {
            return None;
        }

        let qp = other.start - self.start;
        let t = cross(qp, s) / denom;
        let u = cross(qp, r) / denom;

        let t_range = Interval::new(0.0, 1.0).expand(slack / r_len);
        let u_range = Interval::new(0.0, 1.0).expand(slack / s_len);
        (t_range.contains(t) && u_range.contains(u)).then_some((t, u))
    }
}

impl ParametricCurve2d for LineSegment2d {
    fn sample(&self, t: f64) -> Point2d {
        self.start + t * self.delta()
    }

    fn bounds(&self) -> Interval<f64> {
        Interval::new(0.0, 1.0)
    }

    fn sample_dt(&self, _t: f64) -> Vector2d {
        self.delta()
    }
}
