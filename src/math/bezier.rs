use super::curve::ParametricCurve2d;
use super::{Point2d, Vector2d};
use crate::util::Interval;
use cgmath::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A quadratic bezier curve
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QuadraticBezier2d {
    points: [Point2d; 3],
}

impl QuadraticBezier2d {
    pub const fn new(points: &[Point2d; 3]) -> Self {
        Self { points: *points }
    }

    /// A straight quadratic from `start` to `end`, with its control point at the midpoint.
    pub fn line(start: Point2d, end: Point2d) -> Self {
        Self::new(&[start, start.midpoint(end), end])
    }

    pub fn start(&self) -> Point2d {
        self.points[0]
    }

    pub fn ctrl(&self) -> Point2d {
        self.points[1]
    }

    pub fn end(&self) -> Point2d {
        self.points[2]
    }

    pub fn points(&self) -> &[Point2d; 3] {
        &self.points
    }

    /// Replaces the start point, leaving the rest of the control polygon as is.
    pub fn with_start(mut self, start: Point2d) -> Self {
        self.points[0] = start;
        self
    }

    /// Replaces the end point, leaving the rest of the control polygon as is.
    pub fn with_end(mut self, end: Point2d) -> Self {
        self.points[2] = end;
        self
    }

    /// Distance between the two end points.
    pub fn chord_length(&self) -> f64 {
        self.points[0].distance(self.points[2])
    }

    /// Whether all three control points coincide (within `eps`).
    pub fn is_degenerate(&self, eps: f64) -> bool {
        let [a, b, c] = self.points;
        a.distance(b) <= eps && b.distance(c) <= eps
    }

    /// Splits the curve in two at `t` using de Casteljau's algorithm.
    pub fn split(&self, t: f64) -> [QuadraticBezier2d; 2] {
        let [p00, p01, p02] = self.points.map(|x| x.to_vec());
        let p10 = p00.lerp(p01, t);
        let p11 = p01.lerp(p02, t);
        let p20 = p10.lerp(p11, t);
        let curves = [[p00, p10, p20], [p20, p11, p02]];
        curves.map(|p| QuadraticBezier2d {
            points: p.map(Point2d::from_vec),
        })
    }
}

impl ParametricCurve2d for QuadraticBezier2d {
    fn sample(&self, t: f64) -> Point2d {
        let t1 = 1.0 - t;
        Point2d::from_vec(
            t1 * t1 * self.points[0].to_vec()
                + 2.0 * t1 * t * self.points[1].to_vec()
                + t * t * self.points[2].to_vec(),
        )
    }

    fn bounds(&self) -> Interval<f64> {
        Interval { min: 0.0, max: 1.0 }
    }

    fn sample_dt(&self, t: f64) -> Vector2d {
        let t1 = 1.0 - t;
        -2.0 * t1 * self.points[0].to_vec()
            + (2.0 - 4.0 * t) * self.points[1].to_vec()
            + 2.0 * t * self.points[2].to_vec()
    }
}
