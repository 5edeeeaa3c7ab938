//! Parallel lane curves offset from a centre line, with knot removal.
//!
//! Offsetting a curve by more than its radius of curvature makes the offset fold
//! back over itself. Every lane keeps its most recent segments in a tail buffer;
//! each new offset segment is tested against that tail and, where the two cross,
//! the loop between the crossing points is cut out and the crossing recorded as
//! a knot. Segments leave the tail once it grows past the knot test distance.

use crate::curve::{CompositeCurve, FLATNESS};
use crate::error::{Error, Result};
use crate::math::{
    edge_normal, intersect_curves, try_normalize, IgnoreZone, Point2d, QuadraticBezier2d,
    Vector2d,
};
use cgmath::prelude::*;
use std::collections::VecDeque;
use std::f64::consts::TAU;

/// The lane width assumed when offsets are given explicitly.
pub const DEFAULT_LANE_WIDTH: f64 = 50.0;

/// Crossings closer than this to the start of the new segment are its joint with the tail.
const KNOT_IGNORE_RADIUS: f64 = 1.0;

/// Edge extension used when looking for knots.
const KNOT_SLACK: f64 = 1e-6;

/// Control points closer than this are considered coincident.
const DEGENERATE_EPSILON: f64 = 1e-9;

/// Loops cut out of one lane for a single appended segment before giving up.
const MAX_CUTS_PER_SEGMENT: usize = 64;

/// The knot test distance used for lanes of the given width.
pub fn knot_test_distance(lane_width: f64) -> f64 {
    lane_width * TAU
}

/// Offsets a quadratic segment sideways by `offset` units along its left-hand normal.
///
/// The end points move along the normals of their control polygon edges and the
/// control point moves along the normal of the chord. Zero-length edges borrow the
/// normal of a neighbouring edge.
pub fn offset_segment(segment: &QuadraticBezier2d, offset: f64) -> QuadraticBezier2d {
    let [a, b, c] = *segment.points();
    let chord = edge_normal(a, c);
    let first = edge_normal(a, b);
    let second = edge_normal(b, c);

    let n0 = first.or(chord).or(second).unwrap_or_else(Vector2d::zero);
    let n2 = second.or(chord).or(first).unwrap_or_else(Vector2d::zero);
    let n1 = chord
        .or_else(|| try_normalize(n0 + n2))
        .unwrap_or_else(Vector2d::zero);

    QuadraticBezier2d::new(&[a + offset * n0, b + offset * n1, c + offset * n2])
}

/// One curve of a [CurveOffsetSet].
#[derive(Clone, Debug)]
pub struct LaneCurve {
    offset: f64,
    committed: Vec<QuadraticBezier2d>,
    tail: VecDeque<QuadraticBezier2d>,
    tail_length: f64,
    knots: Vec<Point2d>,
}

impl LaneCurve {
    fn new(offset: f64) -> Self {
        Self {
            offset,
            committed: vec![],
            tail: VecDeque::new(),
            tail_length: 0.0,
            knots: vec![],
        }
    }

    /// The signed lateral offset of this curve from the centre line.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Points where loops were cut out of this curve.
    pub fn knots(&self) -> &[Point2d] {
        &self.knots
    }

    /// Segments that will no longer change.
    pub fn committed(&self) -> &[QuadraticBezier2d] {
        &self.committed
    }

    /// Recent segments that are still checked for knots.
    pub fn tail(&self) -> impl Iterator<Item = &QuadraticBezier2d> {
        self.tail.iter()
    }

    /// The sum of the chord lengths of the tail segments.
    pub fn tail_length(&self) -> f64 {
        self.tail_length
    }

    /// A snapshot of the committed and tail segments as one curve.
    pub fn curve(&self) -> CompositeCurve {
        let segments = self.committed.iter().chain(self.tail.iter()).copied();
        CompositeCurve::new(segments.collect())
    }

    fn end(&self) -> Option<Point2d> {
        self.tail
            .back()
            .or_else(|| self.committed.last())
            .map(|s| s.end())
    }

    /// Appends an offset segment, cutting out any loop it closes with the tail.
    ///
    /// A cut shortens an older tail segment and the new one, which changes how they
    /// flatten, so both pieces are checked again before they join the tail. Returns
    /// the number of knots that were cut.
    fn append(&mut self, segment: QuadraticBezier2d, knot_test_distance: f64) -> usize {
        let before = self.knots.len();
        let mut pending = VecDeque::from([segment]);
        while let Some(segment) = pending.pop_front() {
            if self.knots.len() - before >= MAX_CUTS_PER_SEGMENT {
                log::warn!("gave up removing knots after {} cuts", MAX_CUTS_PER_SEGMENT);
                self.tail.push_back(segment);
                self.tail.extend(pending.drain(..));
                break;
            }
            let ignore = IgnoreZone {
                centre: segment.start(),
                radius: KNOT_IGNORE_RADIUS,
            };
            let found = self.tail.iter().enumerate().find_map(|(idx, old)| {
                intersect_curves(old, &segment, FLATNESS, KNOT_SLACK, Some(ignore))
                    .map(|hit| (idx, hit))
            });
            let (idx, hit) = match found {
                Some(found) => found,
                None => {
                    self.tail.push_back(segment);
                    continue;
                }
            };

            let [kept, _] = self.tail[idx].split(hit.t_a);
            let [_, rest] = segment.split(hit.t_b);
            self.tail.truncate(idx);
            self.knots.push(hit.point);
            pending.push_front(rest.with_start(hit.point));
            let kept = kept.with_end(hit.point);
            if kept.is_degenerate(DEGENERATE_EPSILON) {
                self.tail.push_back(kept);
            } else {
                pending.push_front(kept);
            }
        }

        self.tail_length = self.tail.iter().map(|s| s.chord_length()).sum();
        while self.tail_length > knot_test_distance && self.tail.len() > 1 {
            if let Some(oldest) = self.tail.pop_front() {
                self.tail_length -= oldest.chord_length();
                self.committed.push(oldest);
            }
        }
        self.knots.len() - before
    }

    fn flush(&mut self) {
        self.committed.extend(self.tail.drain(..));
        self.tail_length = 0.0;
    }
}

/// A set of curves running parallel to a centre line at fixed lateral offsets.
#[derive(Clone, Debug)]
pub struct CurveOffsetSet {
    lanes: Vec<LaneCurve>,
    knot_test_distance: f64,
    finalized: bool,
}

impl CurveOffsetSet {
    /// Creates `count` curves spaced `width` apart, centred on the centre line.
    pub fn new(count: usize, width: f64) -> Result<Self> {
        if count == 0 {
            return Err(Error::invalid("an offset set needs at least one curve"));
        }
        if !width.is_finite() || width < 0.0 {
            return Err(Error::invalid(format!("invalid lane width {}", width)));
        }
        let centre = 0.5 * (count as f64 - 1.0);
        let offsets = (0..count)
            .map(|i| width * (i as f64 - centre))
            .collect::<Vec<_>>();
        Self::build(&offsets, knot_test_distance(width))
    }

    /// Creates one curve per entry in `offsets`.
    pub fn with_offsets(offsets: &[f64]) -> Result<Self> {
        if offsets.is_empty() {
            return Err(Error::invalid("an offset set needs at least one curve"));
        }
        if offsets.iter().any(|o| !o.is_finite()) {
            return Err(Error::invalid("offsets must be finite"));
        }
        Self::build(offsets, knot_test_distance(DEFAULT_LANE_WIDTH))
    }

    fn build(offsets: &[f64], knot_test_distance: f64) -> Result<Self> {
        Ok(Self {
            lanes: offsets.iter().map(|o| LaneCurve::new(*o)).collect(),
            knot_test_distance,
            finalized: false,
        })
    }

    /// Overrides how much of each curve stays in the tail buffer.
    pub fn with_knot_test_distance(mut self, distance: f64) -> Self {
        self.knot_test_distance = distance.max(0.0);
        self
    }

    pub fn knot_test_distance(&self) -> f64 {
        self.knot_test_distance
    }

    /// The number of curves.
    pub fn count(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Offsets a centre line segment onto every curve.
    ///
    /// Returns the number of knots that were cut out.
    pub fn append_segment(&mut self, start: Point2d, ctrl: Point2d, end: Point2d) -> Result<usize> {
        if self.finalized {
            return Err(Error::AlreadyFinalized);
        }
        let points = [start, ctrl, end];
        if points.iter().any(|p| !(p.x.is_finite() && p.y.is_finite())) {
            return Err(Error::invalid("segment coordinates must be finite"));
        }
        let segment = QuadraticBezier2d::new(&points);
        if segment.is_degenerate(DEGENERATE_EPSILON) {
            return Err(Error::invalid("segment has no extent"));
        }

        let mut knots = 0;
        for (idx, lane) in self.lanes.iter_mut().enumerate() {
            let mut offset = offset_segment(&segment, lane.offset);
            if let Some(end) = lane.end() {
                offset = offset.with_start(end);
            }
            let cut = lane.append(offset, self.knot_test_distance);
            for knot in &lane.knots[lane.knots.len() - cut..] {
                log::debug!("removed knot at {:?} on curve {}", knot, idx);
                crate::debug::debug_point("knot", *knot);
            }
            knots += cut;
        }
        Ok(knots)
    }

    /// Commits every tail. The set cannot be changed afterwards.
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Err(Error::AlreadyFinalized);
        }
        self.lanes.iter_mut().for_each(LaneCurve::flush);
        self.finalized = true;
        Ok(())
    }

    /// Gets one of the curves.
    pub fn lane(&self, idx: usize) -> Result<&LaneCurve> {
        self.lanes.get(idx).ok_or(Error::LaneOutOfRange {
            lane: idx,
            count: self.lanes.len(),
        })
    }

    /// A snapshot of the committed and tail segments of one curve.
    pub fn curve(&self, idx: usize) -> Result<CompositeCurve> {
        self.lane(idx).map(LaneCurve::curve)
    }

    pub fn iter_lanes(&self) -> impl Iterator<Item = &LaneCurve> {
        self.lanes.iter()
    }

    /// Every knot on every curve.
    pub fn knots(&self) -> impl Iterator<Item = Point2d> + '_ {
        self.lanes.iter().flat_map(|l| l.knots.iter().copied())
    }

    /// The knots on one curve.
    pub fn lane_knots(&self, idx: usize) -> Result<&[Point2d]> {
        self.lane(idx).map(LaneCurve::knots)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::centerline::Centerline;
    use crate::math::distance_to_segment;
    use assert_approx_eq::assert_approx_eq;

    fn p(x: f64, y: f64) -> Point2d {
        Point2d::new(x, y)
    }

    fn feed(set: &mut CurveOffsetSet, samples: &[Point2d]) {
        let mut line = Centerline::new();
        for sample in samples {
            if let Some(s) = line.add_point(*sample).unwrap() {
                set.append_segment(s.start(), s.ctrl(), s.end()).unwrap();
            }
        }
        if let Some(s) = line.finish().unwrap() {
            set.append_segment(s.start(), s.ctrl(), s.end()).unwrap();
        }
    }

    /// A sharp left turn with a 60 degree interior angle at (200, 0).
    fn sharp_v() -> Vec<Point2d> {
        let mut samples = (0..=10).map(|i| p(20.0 * i as f64, 0.0)).collect::<Vec<_>>();
        let dir = cgmath::vec2(-0.5, 0.75f64.sqrt());
        samples.extend((1..=10).map(|i| p(200.0, 0.0) + 20.0 * i as f64 * dir));
        samples
    }

    #[test]
    fn offsets_are_centred() {
        let set = CurveOffsetSet::new(3, 50.0).unwrap();
        let offsets = set.iter_lanes().map(|l| l.offset()).collect::<Vec<_>>();
        assert_eq!(offsets, vec![-50.0, 0.0, 50.0]);
        let set = CurveOffsetSet::new(2, 50.0).unwrap();
        assert_eq!(set.lane(0).unwrap().offset(), -25.0);
        assert_eq!(set.lane(1).unwrap().offset(), 25.0);
    }

    #[test]
    fn invalid_arguments() {
        assert!(matches!(
            CurveOffsetSet::new(0, 50.0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            CurveOffsetSet::new(2, f64::NAN),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            CurveOffsetSet::with_offsets(&[]),
            Err(Error::InvalidArgument(_))
        ));

        let mut set = CurveOffsetSet::new(2, 50.0).unwrap();
        let q = p(5.0, 5.0);
        assert!(matches!(
            set.append_segment(q, q, q),
            Err(Error::InvalidArgument(_))
        ));
        assert!(set.curve(0).unwrap().is_empty());
        assert_eq!(
            set.curve(2),
            Err(Error::LaneOutOfRange { lane: 2, count: 2 })
        );
    }

    #[test]
    fn finalized_set_is_immutable() {
        let mut set = CurveOffsetSet::new(1, 50.0).unwrap();
        set.append_segment(p(0.0, 0.0), p(50.0, 0.0), p(100.0, 0.0))
            .unwrap();
        set.finalize().unwrap();
        assert_eq!(
            set.append_segment(p(100.0, 0.0), p(150.0, 0.0), p(200.0, 0.0)),
            Err(Error::AlreadyFinalized)
        );
        assert_eq!(set.finalize(), Err(Error::AlreadyFinalized));
        assert_eq!(set.curve(0).unwrap().len(), 1);
    }

    #[test]
    fn straight_offsets_are_parallel() {
        let mut set = CurveOffsetSet::new(2, 50.0).unwrap();
        feed(&mut set, &[p(0.0, 0.0), p(100.0, 0.0), p(200.0, 0.0)]);
        set.finalize().unwrap();
        for (idx, expected_y) in [(0, -25.0), (1, 25.0)] {
            let points = set.curve(idx).unwrap().flatten(FLATNESS);
            for point in &points {
                assert_approx_eq!(point.y, expected_y);
            }
            assert_approx_eq!(points.first().unwrap().x, 0.0);
            assert_approx_eq!(points.last().unwrap().x, 200.0);
        }
        assert_eq!(set.knots().count(), 0);
    }

    #[test]
    fn gentle_arc_offsets_keep_their_distance() {
        let radius = 500.0;
        let samples = (0..=20)
            .map(|i| {
                let a = i as f64 * 0.04;
                p(radius * a.sin(), radius * (1.0 - a.cos()))
            })
            .collect::<Vec<_>>();
        let mut centre = CurveOffsetSet::with_offsets(&[0.0]).unwrap();
        let mut set = CurveOffsetSet::with_offsets(&[-25.0, 25.0]).unwrap();
        feed(&mut centre, &samples);
        feed(&mut set, &samples);
        set.finalize().unwrap();
        centre.finalize().unwrap();

        let centre = centre.curve(0).unwrap().flatten(FLATNESS);
        for lane in 0..2 {
            for point in set.curve(lane).unwrap().flatten(FLATNESS) {
                let dist = centre
                    .windows(2)
                    .map(|e| distance_to_segment(point, e[0], e[1]))
                    .fold(f64::INFINITY, f64::min);
                assert!((dist - 25.0).abs() < 2.0, "distance {}", dist);
            }
        }
    }

    #[test]
    fn sharp_turn_cuts_knot_on_inside_lane() {
        let mut set = CurveOffsetSet::with_offsets(&[25.0]).unwrap();
        feed(&mut set, &sharp_v());
        set.finalize().unwrap();

        let knots = set.lane_knots(0).unwrap();
        assert!(!knots.is_empty());
        assert_approx_eq!(knots[0].x, 156.7, 1.0);
        assert_approx_eq!(knots[0].y, 25.0, 1.0);

        // The curve passes through the knot exactly once and stays continuous.
        let curve = set.curve(0).unwrap();
        for pair in curve.segments().windows(2) {
            assert_approx_eq!(pair[0].end().distance(pair[1].start()), 0.0, 1e-9);
        }
        let through = curve
            .segments()
            .iter()
            .filter(|s| s.end().distance(knots[0]) < 1e-9)
            .count();
        assert_eq!(through, 1);
    }

    #[test]
    fn outside_lane_has_no_knots() {
        let mut set = CurveOffsetSet::with_offsets(&[-25.0]).unwrap();
        feed(&mut set, &sharp_v());
        assert_eq!(set.knots().count(), 0);
    }

    #[test]
    fn tail_is_bounded_by_knot_test_distance() {
        let mut set = CurveOffsetSet::new(1, 10.0).unwrap();
        let samples = (0..=50).map(|i| p(10.0 * i as f64, 0.0)).collect::<Vec<_>>();
        feed(&mut set, &samples);
        let lane = set.lane(0).unwrap();
        assert!(!lane.committed().is_empty());
        let oldest_tail = lane.tail().next().unwrap().chord_length();
        assert!(lane.tail_length() - oldest_tail <= set.knot_test_distance());
        assert_approx_eq!(lane.curve().length(FLATNESS), 500.0);
    }
}
