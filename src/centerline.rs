//! Turns a stream of pointer samples into a smooth chain of quadratic segments.

use crate::curve::{CompositeCurve, FLATNESS};
use crate::error::{Error, Result};
use crate::math::{
    heading_angle, intersect_curves, IgnoreZone, Point2d, QuadraticBezier2d, DIRECTION_EPSILON,
};
use cgmath::prelude::*;

/// Crossings within this distance of the newest segment's start are the joint itself.
const CROSSING_IGNORE_RADIUS: f64 = 1.0;

/// How far centerline segments are extended at their ends when looking for crossings.
const CROSSING_SLACK: f64 = 1.0;

/// How much of the sample polyline is used to measure the start and end angles.
const ANGLE_SPAN: f64 = 32.0;

/// The drawn centre line of a road.
///
/// Each sample after the first emits one segment ending at the midpoint between
/// it and the previous sample, with the previous sample as control point.
/// The very first segment is straight.
#[derive(Clone, Debug, Default)]
pub struct Centerline {
    samples: Vec<Point2d>,
    segments: Vec<QuadraticBezier2d>,
    crossings: Vec<Point2d>,
    finished: bool,
}

impl Centerline {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a pointer sample, returning the segment it produced.
    ///
    /// Samples coincident with the previous one produce nothing.
    pub fn add_point(&mut self, point: Point2d) -> Result<Option<QuadraticBezier2d>> {
        let segment = self.segment_to(point)?;
        if self.samples.is_empty() {
            self.samples.push(point);
        } else if let Some(segment) = segment {
            self.samples.push(point);
            self.push_segment(segment);
        }
        Ok(segment)
    }

    /// The segment [Self::add_point] would produce for `point`, without adding it.
    pub fn segment_to(&self, point: Point2d) -> Result<Option<QuadraticBezier2d>> {
        if self.finished {
            return Err(Error::AlreadyFinalized);
        }
        if !(point.x.is_finite() && point.y.is_finite()) {
            return Err(Error::invalid("sample coordinates must be finite"));
        }

        let prev = match self.samples.last() {
            Some(prev) => *prev,
            None => return Ok(None),
        };
        if prev.distance(point) <= DIRECTION_EPSILON {
            return Ok(None);
        }

        let mid = prev.midpoint(point);
        Ok(Some(match self.segments.last() {
            None => QuadraticBezier2d::new(&[prev, prev.midpoint(mid), mid]),
            Some(last) => QuadraticBezier2d::new(&[last.end(), prev, mid]),
        }))
    }

    /// Ends drawing, returning the closing segment that runs to the last sample.
    pub fn finish(&mut self) -> Result<Option<QuadraticBezier2d>> {
        if self.finished {
            return Err(Error::AlreadyFinalized);
        }
        let segment = self.closing_segment();
        self.finished = true;
        if let Some(segment) = segment {
            self.push_segment(segment);
        }
        Ok(segment)
    }

    /// The segment [Self::finish] would add.
    ///
    /// There is none when the last segment already ends at (or within a hair of) the last sample.
    pub fn closing_segment(&self) -> Option<QuadraticBezier2d> {
        if self.finished {
            return None;
        }
        let last_end = self.segments.last()?.end();
        let last_sample = *self.samples.last()?;
        Some(QuadraticBezier2d::line(last_end, last_sample))
            .filter(|segment| !segment.is_degenerate(DIRECTION_EPSILON))
    }

    fn push_segment(&mut self, segment: QuadraticBezier2d) {
        let ignore = IgnoreZone {
            centre: segment.start(),
            radius: CROSSING_IGNORE_RADIUS,
        };
        let crossings = self.segments.iter().filter_map(|existing| {
            intersect_curves(existing, &segment, FLATNESS, CROSSING_SLACK, Some(ignore))
        });
        for hit in crossings {
            log::trace!("centerline crosses itself at {:?}", hit.point);
            self.crossings.push(hit.point);
        }
        self.segments.push(segment);
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The pointer samples that were accepted.
    pub fn samples(&self) -> &[Point2d] {
        &self.samples
    }

    pub fn segments(&self) -> &[QuadraticBezier2d] {
        &self.segments
    }

    /// Points where the centre line crosses over itself.
    pub fn crossings(&self) -> &[Point2d] {
        &self.crossings
    }

    /// A snapshot of the centre line as a single curve.
    pub fn curve(&self) -> CompositeCurve {
        CompositeCurve::new(self.segments.clone())
    }

    /// The direction of travel at the start of the road, in radians.
    pub fn start_angle(&self) -> f64 {
        terminal_angle(self.samples.iter().copied())
    }

    /// The direction of travel at the end of the road, in radians.
    pub fn end_angle(&self) -> f64 {
        // Walking backwards gives the reverse direction
        let reversed = terminal_angle(self.samples.iter().rev().copied());
        if self.samples.len() < 2 {
            reversed
        } else {
            crate::util::wrap_angle(reversed + std::f64::consts::PI)
        }
    }
}

/// The angle from the first point to the first point at least [ANGLE_SPAN] along the polyline.
fn terminal_angle(mut points: impl Iterator<Item = Point2d>) -> f64 {
    let first = match points.next() {
        Some(first) => first,
        None => return 0.0,
    };
    let mut travelled = 0.0;
    let mut prev = first;
    let mut far = first;
    for point in points {
        travelled += prev.distance(point);
        prev = point;
        far = point;
        if travelled >= ANGLE_SPAN {
            break;
        }
    }
    if far == first {
        0.0
    } else {
        heading_angle(far - first)
    }
}
