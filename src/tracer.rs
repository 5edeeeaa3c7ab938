use crate::math::{polyline_length, try_normalize, Point2d, Vector2d};
use cgmath::prelude::*;
use std::rc::Rc;

/// Walks along a polyline by distance.
///
/// The polyline is shared and never modified, so any number of tracers can
/// walk the same lane independently.
#[derive(Clone, Debug)]
pub struct ArcLengthTracer {
    /// The polyline being traced.
    points: Rc<[Point2d]>,
    /// Index of the vertex the tracer is heading towards.
    next: usize,
    /// The current position, somewhere on the edge ending at `next`.
    current: Point2d,
    /// Distance travelled from the first vertex.
    travelled: f64,
    done: bool,
}

impl ArcLengthTracer {
    /// Creates a tracer at the first vertex of the polyline.
    ///
    /// Returns `None` for an empty polyline. A single vertex is already done.
    pub fn new(points: Rc<[Point2d]>) -> Option<Self> {
        let first = *points.first()?;
        let done = points.len() < 2;
        Some(Self {
            points,
            next: 1,
            current: first,
            travelled: 0.0,
            done,
        })
    }

    /// Moves `distance` units forward, stopping at the final vertex.
    pub fn advance(&mut self, mut distance: f64) {
        if self.done || distance.is_nan() || distance <= 0.0 {
            return;
        }
        while let Some(target) = self.points.get(self.next).copied() {
            let remaining = self.current.distance(target);
            if distance < remaining {
                self.current += (target - self.current) * (distance / remaining);
                self.travelled += distance;
                return;
            }
            distance -= remaining;
            self.travelled += remaining;
            self.current = target;
            self.next += 1;
        }
        self.done = true;
    }

    pub fn current_point(&self) -> Point2d {
        self.current
    }

    /// Whether the final vertex has been reached.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Distance travelled along the polyline.
    pub fn travelled(&self) -> f64 {
        self.travelled
    }

    /// The unit direction of the edge being traced.
    ///
    /// Zero-length edges are skipped. Once done, this is the direction of the last edge.
    pub fn heading(&self) -> Option<Vector2d> {
        let len = self.points.len();
        let idx = self.next.min(len.saturating_sub(1)).max(1);
        (idx..len)
            .chain((1..idx).rev())
            .find_map(|i| try_normalize(self.points[i] - self.points[i - 1]))
    }

    /// The polyline being traced.
    pub fn points(&self) -> &Rc<[Point2d]> {
        &self.points
    }

    /// The total length of the polyline.
    pub fn length(&self) -> f64 {
        polyline_length(&self.points)
    }

    /// Walks the rest of the polyline in fixed steps, yielding `(travelled, point)`.
    ///
    /// The first item is the current position and the last is the final vertex.
    pub fn into_steps(self, step: f64) -> Steps {
        let step = if step > 0.0 { step } else { f64::INFINITY };
        Steps {
            tracer: self,
            step,
            finished: false,
        }
    }
}

/// Iterator returned by [ArcLengthTracer::into_steps].
pub struct Steps {
    tracer: ArcLengthTracer,
    step: f64,
    finished: bool,
}

impl Iterator for Steps {
    type Item = (f64, Point2d);

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let item = (self.tracer.travelled, self.tracer.current);
        if self.tracer.done {
            self.finished = true;
        } else {
            self.tracer.advance(self.step);
        }
        Some(item)
    }
}
