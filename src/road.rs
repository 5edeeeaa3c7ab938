use crate::centerline::Centerline;
use crate::curve::{CompositeCurve, FLATNESS};
use crate::error::{Error, Result};
use crate::math::{polyline_length, rot90, try_normalize, Point2d, QuadraticBezier2d};
use crate::offset::CurveOffsetSet;
use crate::tracer::ArcLengthTracer;
use cgmath::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Distance between the points tested when mapping a position onto another lane.
const ADJACENT_STEP: f64 = 1.0;

/// Distance travelled past a position to find the lane direction there.
const TANGENT_STEP: f64 = 1.0;

/// A drawn road: a centre line, the lanes either side of it and the lines between them.
///
/// Lane `i` lies `lane_width * (i - (lane_count - 1) / 2)` units along the left-hand
/// normal of the centre line. A road is drawn point by point and then finished;
/// only finished roads can carry traffic.
#[derive(Clone, Debug)]
pub struct Road {
    lane_width: f64,
    centerline: Centerline,
    lanes: CurveOffsetSet,
    /// The lines between adjacent lanes, if there is more than one lane.
    separators: Option<CurveOffsetSet>,
    /// Flattened lanes, cached when the road is finished.
    polylines: Vec<Rc<[Point2d]>>,
}

/// The attributes of a road.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoadAttributes {
    /// The number of lanes, at least one.
    pub lane_count: usize,
    /// The distance between the centres of adjacent lanes.
    pub lane_width: f64,
}

impl Default for RoadAttributes {
    fn default() -> Self {
        Self {
            lane_count: 2,
            lane_width: crate::offset::DEFAULT_LANE_WIDTH,
        }
    }
}

impl Road {
    /// Creates a new road with no points.
    pub fn new(attributes: &RoadAttributes) -> Result<Self> {
        let RoadAttributes {
            lane_count,
            lane_width,
        } = *attributes;
        let lanes = CurveOffsetSet::new(lane_count, lane_width)?;
        let separators = match lane_count {
            1 => None,
            n => Some(CurveOffsetSet::new(n - 1, lane_width)?),
        };
        Ok(Self {
            lane_width,
            centerline: Centerline::new(),
            lanes,
            separators,
            polylines: vec![],
        })
    }

    /// Extends the road to a new pointer sample.
    ///
    /// The road is left unchanged if the sample is rejected.
    pub fn add_point(&mut self, point: Point2d) -> Result<()> {
        if let Some(segment) = self.centerline.segment_to(point)? {
            self.append_to_lanes(&segment)?;
        }
        self.centerline.add_point(point)?;
        Ok(())
    }

    /// Ends drawing. The lane geometry is fixed from here on.
    pub fn finish(&mut self) -> Result<()> {
        if self.is_finished() {
            return Err(Error::AlreadyFinalized);
        }
        if let Some(segment) = self.centerline.closing_segment() {
            self.append_to_lanes(&segment)?;
        }
        self.centerline.finish()?;
        self.lanes.finalize()?;
        if let Some(separators) = &mut self.separators {
            separators.finalize()?;
        }
        self.polylines = self
            .lanes
            .iter_lanes()
            .map(|lane| Rc::from(lane.curve().flatten(FLATNESS)))
            .collect();
        log::debug!(
            "finished road with {} lanes and {} knots",
            self.lane_count(),
            self.knots().count()
        );
        Ok(())
    }

    /// Offsets a centre line segment onto the lanes and separators.
    ///
    /// Both sets reject exactly the same segments, so either both change or neither does.
    fn append_to_lanes(&mut self, segment: &QuadraticBezier2d) -> Result<()> {
        let [start, ctrl, end] = *segment.points();
        self.lanes.append_segment(start, ctrl, end)?;
        if let Some(separators) = &mut self.separators {
            separators.append_segment(start, ctrl, end)?;
        }
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.centerline.is_finished()
    }

    /// The number of lanes.
    pub fn lane_count(&self) -> usize {
        self.lanes.count()
    }

    /// The distance between the centres of adjacent lanes.
    pub fn lane_width(&self) -> f64 {
        self.lane_width
    }

    pub fn centerline(&self) -> &Centerline {
        &self.centerline
    }

    /// The lane curves.
    pub fn lanes(&self) -> &CurveOffsetSet {
        &self.lanes
    }

    /// A snapshot of one lane's curve.
    pub fn lane_curve(&self, lane: usize) -> Result<CompositeCurve> {
        self.lanes.curve(lane)
    }

    /// The number of lines drawn between lanes.
    pub fn separator_count(&self) -> usize {
        self.separators.as_ref().map_or(0, |s| s.count())
    }

    /// A snapshot of the line between lanes `idx` and `idx + 1`.
    pub fn separator_curve(&self, idx: usize) -> Result<CompositeCurve> {
        match &self.separators {
            Some(separators) => separators.curve(idx),
            None => Err(Error::LaneOutOfRange {
                lane: idx,
                count: 0,
            }),
        }
    }

    /// Points where loops were cut out of the lanes.
    pub fn knots(&self) -> impl Iterator<Item = Point2d> + '_ {
        self.lanes.knots()
    }

    /// The direction of travel at the start of the road, in radians.
    pub fn start_angle(&self) -> f64 {
        self.centerline.start_angle()
    }

    /// The direction of travel at the end of the road, in radians.
    pub fn end_angle(&self) -> f64 {
        self.centerline.end_angle()
    }

    fn check_lane(&self, lane: usize) -> Result<()> {
        self.lanes.lane(lane).map(|_| ())
    }

    /// The flattened polyline of a lane.
    pub fn lane_polyline(&self, lane: usize) -> Result<Rc<[Point2d]>> {
        self.check_lane(lane)?;
        match self.polylines.get(lane) {
            Some(points) => Ok(points.clone()),
            None => Ok(Rc::from(self.lanes.curve(lane)?.flatten(FLATNESS))),
        }
    }

    /// The length of a lane. Lanes of the same road generally differ in length.
    pub fn lane_length(&self, lane: usize) -> Result<f64> {
        Ok(polyline_length(&self.lane_polyline(lane)?))
    }

    /// Creates a tracer positioned `at` units along a lane.
    pub fn tracer_for(&self, lane: usize, at: f64) -> Result<ArcLengthTracer> {
        let mut tracer = ArcLengthTracer::new(self.lane_polyline(lane)?).ok_or(Error::EmptyLane(lane))?;
        tracer.advance(at);
        Ok(tracer)
    }

    /// Maps a distance along lane `src` to the equivalent distance along lane `dst`.
    ///
    /// The equivalent position is the point on `dst` closest to where `dst` would be
    /// if it ran exactly parallel to `src` at that point. Returns `None` if either
    /// lane has no extent.
    pub fn adjacent_distance(&self, src: usize, src_dist: f64, dst: usize) -> Result<Option<f64>> {
        self.check_lane(dst)?;
        let mut tracer = match ArcLengthTracer::new(self.lane_polyline(src)?) {
            Some(tracer) => tracer,
            None => return Ok(None),
        };
        tracer.advance(src_dist);
        let point = tracer.current_point();
        let fallback = tracer.heading();
        tracer.advance(TANGENT_STEP);
        let tangent = match try_normalize(tracer.current_point() - point).or(fallback) {
            Some(tangent) => tangent,
            None => return Ok(None),
        };

        let lanes_across = dst as f64 - src as f64;
        let target = point + self.lane_width * lanes_across * rot90(tangent);

        let dst_tracer = match ArcLengthTracer::new(self.lane_polyline(dst)?) {
            Some(tracer) => tracer,
            None => return Ok(None),
        };
        let closest = dst_tracer
            .into_steps(ADJACENT_STEP)
            .min_by(|a, b| a.1.distance2(target).total_cmp(&b.1.distance2(target)));
        Ok(closest.map(|(dist, _)| dist))
    }
}
