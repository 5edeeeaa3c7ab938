use crate::math::{
    flattened_samples_along_curve, polyline_length, ParametricCurve2d, Point2d, QuadraticBezier2d,
    Vector2d,
};
use crate::util::Interval;
use cgmath::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Flattening tolerance used wherever curves become polylines.
pub const FLATNESS: f64 = 1.0;

/// An ordered chain of quadratic segments, each starting where the previous one ends.
///
/// As a [ParametricCurve2d], segment `i` covers `t` in `[i, i + 1]`.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompositeCurve {
    segments: Vec<QuadraticBezier2d>,
}

impl CompositeCurve {
    /// Creates a new [CompositeCurve] from its segments.
    pub fn new(segments: Vec<QuadraticBezier2d>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[QuadraticBezier2d] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The number of segments in the curve.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn start(&self) -> Option<Point2d> {
        self.segments.first().map(|s| s.start())
    }

    pub fn end(&self) -> Option<Point2d> {
        self.segments.last().map(|s| s.end())
    }

    /// Approximates the curve by a polyline, with shared segment end points emitted once.
    pub fn flatten(&self, tolerance: f64) -> Vec<Point2d> {
        let mut points: Vec<Point2d> = vec![];
        for segment in &self.segments {
            let samples = flattened_samples_along_curve(segment, tolerance).map(|(_, p)| p);
            let skip = usize::from(points.last() == Some(&segment.start()));
            points.extend(samples.skip(skip));
        }
        points
    }

    /// The length of the flattened curve.
    pub fn length(&self, tolerance: f64) -> f64 {
        polyline_length(&self.flatten(tolerance))
    }

    /// Finds the segment and local parameter for a global parameter `t`.
    fn sample_internal(&self, t: f64) -> Option<(&QuadraticBezier2d, f64)> {
        let last = self.segments.len().checked_sub(1)?;
        let idx = (t.max(0.0) as usize).min(last);
        Some((&self.segments[idx], t - idx as f64))
    }
}

impl ParametricCurve2d for CompositeCurve {
    /// Samples the curve. An empty curve is a single point at the origin.
    fn sample(&self, t: f64) -> Point2d {
        match self.sample_internal(t) {
            Some((segment, t)) => segment.sample(t),
            None => Point2d::origin(),
        }
    }

    fn bounds(&self) -> Interval<f64> {
        Interval::new(0.0, self.segments.len() as f64)
    }

    fn sample_dt(&self, t: f64) -> Vector2d {
        match self.sample_internal(t) {
            Some((segment, t)) => segment.sample_dt(t),
            None => Vector2d::zero(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn p(x: f64, y: f64) -> Point2d {
        Point2d::new(x, y)
    }

    #[test]
    fn flatten_deduplicates_joints() {
        let curve = CompositeCurve::new(vec![
            QuadraticBezier2d::line(p(0.0, 0.0), p(100.0, 0.0)),
            QuadraticBezier2d::line(p(100.0, 0.0), p(100.0, 50.0)),
        ]);
        let points = curve.flatten(FLATNESS);
        assert_eq!(points.len(), 5);
        assert_eq!(points[2], p(100.0, 0.0));
        assert_approx_eq!(curve.length(FLATNESS), 150.0);
    }

    #[test]
    fn global_parameter_selects_segment() {
        let curve = CompositeCurve::new(vec![
            QuadraticBezier2d::line(p(0.0, 0.0), p(10.0, 0.0)),
            QuadraticBezier2d::line(p(10.0, 0.0), p(10.0, 10.0)),
        ]);
        assert_eq!(curve.bounds(), Interval::new(0.0, 2.0));
        let q = curve.sample(1.5);
        assert_approx_eq!(q.x, 10.0);
        assert_approx_eq!(q.y, 5.0);
        assert_eq!(curve.sample(2.0), p(10.0, 10.0));
    }

    #[test]
    fn empty_curve_flattens_to_nothing() {
        let curve = CompositeCurve::default();
        assert!(curve.flatten(FLATNESS).is_empty());
        assert_eq!(curve.length(FLATNESS), 0.0);
        assert!(curve.start().is_none());
        assert_eq!(curve.bounds(), Interval::new(0.0, 0.0));
        assert_eq!(curve.sample(0.0), Point2d::origin());
        assert_eq!(curve.sample_dt(0.5), Vector2d::zero());
    }
}
