use super::ParametricCurve2d;
use crate::math::{distance_to_segment, LineSegment2d, Point2d};
use crate::util::Interval;
use cgmath::prelude::*;
use itertools::{iproduct, Itertools};
use smallvec::SmallVec;

/// Sub-intervals narrower than this in t are never split further.
const MIN_DT: f64 = 1e-6;

/// Flattened samples of a single curve segment.
pub type Samples = SmallVec<[(f64, Point2d); 16]>;

/// Approximates a curve by a polyline whose edges deviate from the curve by at most `tolerance`.
///
/// Yields `(t, point)` pairs in increasing order of `t`, including both ends.
pub fn flattened_samples_along_curve(
    curve: &impl ParametricCurve2d,
    tolerance: f64,
) -> impl Iterator<Item = (f64, Point2d)> + '_ {
    FlattenedSamples::new(curve, tolerance)
}

/// Collects the flattened samples of a curve. See [flattened_samples_along_curve].
pub fn flatten_curve(curve: &impl ParametricCurve2d, tolerance: f64) -> Samples {
    FlattenedSamples::new(curve, tolerance).collect()
}

pub struct FlattenedSamples<'a, C> {
    curve: &'a C,
    stack: Vec<(f64, Point2d)>,
    tolerance: f64,
}

impl<'a, C: ParametricCurve2d> FlattenedSamples<'a, C> {
    fn new(curve: &'a C, tolerance: f64) -> Self {
        let Interval { min, max } = curve.bounds();
        let mid = 0.5 * (min + max);
        Self {
            curve,
            stack: vec![
                (max, curve.sample(max)),
                (mid, curve.sample(mid)),
                (min, curve.sample(min)),
            ],
            tolerance,
        }
    }
}

impl<'a, C: ParametricCurve2d> Iterator for FlattenedSamples<'a, C> {
    type Item = (f64, Point2d);

    fn next(&mut self) -> Option<Self::Item> {
        let (t1, p1) = self.stack.pop()?;
        if let Some((mut t2, mut p2)) = self.stack.last().copied() {
            while t2 - t1 > MIN_DT {
                let mid_t = 0.5 * (t1 + t2);
                let mid_p = self.curve.sample(mid_t);
                if distance_to_segment(mid_p, p1, p2) <= self.tolerance {
                    break;
                }
                (t2, p2) = (mid_t, mid_p);
                self.stack.push((t2, p2));
            }
        }
        Some((t1, p1))
    }
}

/// The total length of a polyline.
pub fn polyline_length(points: &[Point2d]) -> f64 {
    points
        .iter()
        .tuple_windows()
        .map(|(a, b)| a.distance(*b))
        .sum()
}

/// A region around a point in which intersections are ignored.
#[derive(Clone, Copy, Debug)]
pub struct IgnoreZone {
    pub centre: Point2d,
    pub radius: f64,
}

/// Where two polylines cross.
#[derive(Clone, Copy, Debug)]
pub struct PolylineHit {
    pub point: Point2d,
    /// Index of the edge of the first polyline.
    pub edge_a: usize,
    /// Parameter along that edge.
    pub t_a: f64,
    pub edge_b: usize,
    pub t_b: f64,
}

/// Finds where polyline `b` first crosses polyline `a`, measured along `a`.
///
/// Edges are extended by `slack` units at both ends. Crossings inside `ignore` are skipped.
pub fn intersect_polylines(
    a: &[Point2d],
    b: &[Point2d],
    slack: f64,
    ignore: Option<IgnoreZone>,
) -> Option<PolylineHit> {
    let mut best: Option<PolylineHit> = None;
    for ((i, ea), (j, eb)) in iproduct!(a.windows(2).enumerate(), b.windows(2).enumerate()) {
        if matches!(best, Some(hit) if hit.edge_a < i) {
            break;
        }
        let seg_a = LineSegment2d::from_ends(ea[0], ea[1]);
        let seg_b = LineSegment2d::from_ends(eb[0], eb[1]);
        let (t, u) = match seg_a.intersect(&seg_b, slack) {
            Some(params) => params,
            None => continue,
        };
        let point = seg_a.sample(t);
        if let Some(zone) = ignore {
            if point.distance(zone.centre) < zone.radius {
                continue;
            }
        }
        if best.map_or(true, |hit| t < hit.t_a) {
            best = Some(PolylineHit {
                point,
                edge_a: i,
                t_a: t,
                edge_b: j,
                t_b: u,
            });
        }
    }
    best
}

/// Where two curves cross, as parameters along each curve.
#[derive(Clone, Copy, Debug)]
pub struct CurveHit {
    pub point: Point2d,
    pub t_a: f64,
    pub t_b: f64,
}

/// Finds the first crossing of curve `b` along curve `a`, by flattening both at `tolerance`.
pub fn intersect_curves(
    curve_a: &impl ParametricCurve2d,
    curve_b: &impl ParametricCurve2d,
    tolerance: f64,
    slack: f64,
    ignore: Option<IgnoreZone>,
) -> Option<CurveHit> {
    let samples_a = flatten_curve(curve_a, tolerance);
    let samples_b = flatten_curve(curve_b, tolerance);
    let points_a: SmallVec<[Point2d; 16]> = samples_a.iter().map(|(_, p)| *p).collect();
    let points_b: SmallVec<[Point2d; 16]> = samples_b.iter().map(|(_, p)| *p).collect();

    let hit = intersect_polylines(&points_a, &points_b, slack, ignore)?;
    let edge_t = |samples: &Samples, edge: usize, t: f64| {
        Interval::new(samples[edge].0, samples[edge + 1].0).lerp(t.clamp(0.0, 1.0))
    };
    Some(CurveHit {
        point: hit.point,
        t_a: edge_t(&samples_a, hit.edge_a, hit.t_a),
        t_b: edge_t(&samples_b, hit.edge_b, hit.t_b),
    })
}
