//! Tests that build the geometry of a single road.

use assert_approx_eq::assert_approx_eq;
use cgmath::MetricSpace;
use rand::prelude::*;
use traffic_sketch::{
    math::{LineSegment2d, Point2d, QuadraticBezier2d},
    offset_segment, Centerline, CompositeCurve, CurveOffsetSet, Error, Road, RoadAttributes,
    FLATNESS,
};

fn p(x: f64, y: f64) -> Point2d {
    Point2d::new(x, y)
}

fn draw(attributes: RoadAttributes, samples: &[Point2d]) -> Road {
    let mut road = Road::new(&attributes).unwrap();
    for sample in samples {
        road.add_point(*sample).unwrap();
    }
    road.finish().unwrap();
    road
}

/// Whether any two non-adjacent edges of a polyline cross.
fn self_crosses(points: &[Point2d]) -> bool {
    let edges = points
        .windows(2)
        .map(|e| LineSegment2d::from_ends(e[0], e[1]))
        .collect::<Vec<_>>();
    edges.iter().enumerate().any(|(i, a)| {
        edges
            .iter()
            .skip(i + 2)
            .any(|b| a.intersect(b, 0.0).is_some())
    })
}

fn append(set: &mut CurveOffsetSet, s: &QuadraticBezier2d) -> usize {
    set.append_segment(s.start(), s.ctrl(), s.end()).unwrap()
}

/// Every point where two non-adjacent edges of a polyline cross.
fn crossings(points: &[Point2d]) -> Vec<Point2d> {
    let edges = points
        .windows(2)
        .map(|e| LineSegment2d::from_ends(e[0], e[1]))
        .collect::<Vec<_>>();
    let mut found = vec![];
    for (i, a) in edges.iter().enumerate() {
        for b in edges.iter().skip(i + 2) {
            if let Some((t, _)) = a.intersect(b, 0.0) {
                found.push(a.start + t * a.delta());
            }
        }
    }
    found
}

/// A sharp left turn with a 60 degree interior angle at (200, 0).
fn sharp_v() -> Vec<Point2d> {
    let mut samples = (0..=10).map(|i| p(20.0 * i as f64, 0.0)).collect::<Vec<_>>();
    let dir = cgmath::vec2(-0.5, 0.75f64.sqrt());
    samples.extend((1..=10).map(|i| p(200.0, 0.0) + 20.0 * i as f64 * dir));
    samples
}

/// Test that a straight road drawn from three points has the full length.
#[test]
fn straight_road_length() {
    let road = draw(
        RoadAttributes {
            lane_count: 1,
            lane_width: 50.0,
        },
        &[p(0.0, 0.0), p(100.0, 0.0), p(200.0, 0.0)],
    );
    assert_approx_eq!(road.lane_length(0).unwrap(), 200.0, 1.0);
    assert_approx_eq!(road.start_angle(), 0.0);
    assert_approx_eq!(road.end_angle(), 0.0);
}

/// Test that the inside lane of a sharp turn loses its loop.
#[test]
fn sharp_turn_produces_knot() {
    let samples = sharp_v();
    let road = draw(RoadAttributes::default(), &samples);

    let inside = road.lanes().lane(1).unwrap();
    assert_eq!(inside.offset(), 25.0);
    assert!(!inside.knots().is_empty());
    assert!(road.lanes().lane(0).unwrap().knots().is_empty());

    let naive: f64 = road
        .centerline()
        .segments()
        .iter()
        .map(|s| CompositeCurve::new(vec![offset_segment(s, 25.0)]).length(FLATNESS))
        .sum();
    let length = road.lane_length(1).unwrap();
    assert!(length < naive - 10.0, "{} vs {}", length, naive);
    assert!(!self_crosses(&road.lane_polyline(1).unwrap()));

    // The outside lane is longer than the inside lane.
    assert!(road.lane_length(0).unwrap() > length);
}

/// Test that lanes of gently curving roads never fold over themselves.
#[test]
fn gentle_roads_have_simple_lanes() {
    let mut rng = StdRng::from_seed([3; 32]);
    for _ in 0..20 {
        let mut heading: f64 = rng.gen_range(-3.0..3.0);
        let mut point = p(0.0, 0.0);
        let mut samples = vec![point];
        for _ in 0..12 {
            heading += rng.gen_range(-0.2..0.2);
            point += 40.0 * cgmath::vec2(heading.cos(), heading.sin());
            samples.push(point);
        }
        let road = draw(
            RoadAttributes {
                lane_count: 3,
                lane_width: 50.0,
            },
            &samples,
        );
        assert_eq!(road.knots().count(), 0);
        for lane in 0..3 {
            let polyline = road.lane_polyline(lane).unwrap();
            assert!(!self_crosses(&polyline));
            let start = polyline.first().unwrap();
            let expected = samples[0] + road.lanes().lane(lane).unwrap().offset() * {
                let d = samples[1] - samples[0];
                cgmath::vec2(-d.y, d.x) / 40.0
            };
            assert_approx_eq!(start.x, expected.x, 1e-6);
            assert_approx_eq!(start.y, expected.y, 1e-6);
        }
    }
}

/// Test that lanes of tightly winding roads are left with no loops.
///
/// The tail is never committed here, so the only crossings left are the ones
/// right next to a joint between two segments.
#[test]
fn winding_roads_have_their_loops_cut() {
    let mut rng = StdRng::from_seed([7; 32]);
    let mut knots = 0;
    for _ in 0..100 {
        let mut heading: f64 = rng.gen_range(-3.0..3.0);
        let mut point = p(0.0, 0.0);
        let mut line = Centerline::new();
        let mut set = CurveOffsetSet::new(3, 50.0)
            .unwrap()
            .with_knot_test_distance(f64::INFINITY);
        line.add_point(point).unwrap();
        for _ in 0..25 {
            heading += rng.gen_range(-1.2..1.2);
            point += rng.gen_range(10.0..40.0) * cgmath::vec2(heading.cos(), heading.sin());
            if let Some(segment) = line.add_point(point).unwrap() {
                knots += append(&mut set, &segment);
            }
        }
        if let Some(segment) = line.finish().unwrap() {
            knots += append(&mut set, &segment);
        }
        set.finalize().unwrap();

        for lane in 0..3 {
            let curve = set.curve(lane).unwrap();
            let joints = curve
                .segments()
                .iter()
                .flat_map(|s| [s.start(), s.end()])
                .collect::<Vec<_>>();
            for crossing in crossings(&curve.flatten(FLATNESS)) {
                let nearest = joints
                    .iter()
                    .map(|j| j.distance(crossing))
                    .fold(f64::INFINITY, f64::min);
                assert!(nearest <= 1.0 + 1e-6, "crossing at {:?}", crossing);
            }
        }
    }
    assert!(knots > 0);
}

/// Test mapping positions between the lanes of a straight road and back.
#[test]
fn adjacency_round_trip() {
    let road = draw(
        RoadAttributes {
            lane_count: 2,
            lane_width: 50.0,
        },
        &[p(0.0, 0.0), p(150.0, 0.0), p(300.0, 0.0)],
    );
    let mut rng = StdRng::from_seed([11; 32]);
    for _ in 0..50 {
        let dist = rng.gen_range(0.0..300.0);
        let there = road.adjacent_distance(0, dist, 1).unwrap().unwrap();
        let back = road.adjacent_distance(1, there, 0).unwrap().unwrap();
        assert!((back - dist).abs() <= 1.0, "{} -> {} -> {}", dist, there, back);
    }
}

/// Test that lanes on the outside of a curve are longer.
#[test]
fn outside_lanes_are_longer() {
    let samples = (0..=16)
        .map(|i| {
            let a = i as f64 * std::f64::consts::PI / 32.0;
            p(300.0 * a.sin(), 300.0 * (1.0 - a.cos()))
        })
        .collect::<Vec<_>>();
    let road = draw(
        RoadAttributes {
            lane_count: 3,
            lane_width: 40.0,
        },
        &samples,
    );
    // Turning left, so lane 2 is on the inside.
    let lengths = (0..3)
        .map(|lane| road.lane_length(lane).unwrap())
        .collect::<Vec<_>>();
    assert!(lengths[0] > lengths[1]);
    assert!(lengths[1] > lengths[2]);
    assert_approx_eq!(lengths[0] - lengths[1], 40.0 * std::f64::consts::FRAC_PI_2, 8.0);
}

/// Test that drawing errors are reported.
#[test]
fn drawing_errors() {
    let mut road = Road::new(&RoadAttributes::default()).unwrap();
    assert!(matches!(
        road.add_point(p(f64::NAN, 0.0)),
        Err(Error::InvalidArgument(_))
    ));
    road.add_point(p(0.0, 0.0)).unwrap();
    road.add_point(p(50.0, 0.0)).unwrap();
    road.finish().unwrap();
    assert_eq!(road.add_point(p(60.0, 0.0)), Err(Error::AlreadyFinalized));
    assert_eq!(
        road.lane_length(7),
        Err(Error::LaneOutOfRange { lane: 7, count: 2 })
    );
    assert!(matches!(
        Road::new(&RoadAttributes {
            lane_count: 1,
            lane_width: -1.0
        }),
        Err(Error::InvalidArgument(_))
    ));
}
