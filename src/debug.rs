//! Per-frame debug shapes, recorded only with the `debug` feature.

use crate::math::Point2d;
#[cfg(feature = "debug")]
use serde_json::{json, Value};

#[cfg(feature = "debug")]
thread_local!(
    static SHAPES: std::cell::RefCell<Vec<Value>> = Default::default();
);

#[cfg(feature = "debug")]
fn record(kind: &str, name: &str, mut shape: Value) {
    shape["type"] = kind.into();
    shape["name"] = name.into();
    SHAPES.with(|shapes| shapes.borrow_mut().push(shape));
}

/// Marks a point, such as a knot cut out of a lane.
#[allow(unused)]
pub fn debug_point(name: &str, point: Point2d) {
    #[cfg(feature = "debug")]
    record("point", name, json!({ "point": [point.x, point.y] }));
}

#[allow(unused)]
pub fn debug_line(name: &str, from: Point2d, to: Point2d) {
    #[cfg(feature = "debug")]
    record(
        "line",
        name,
        json!({ "p1": [from.x, from.y], "p2": [to.x, to.y] }),
    );
}

#[allow(unused)]
pub fn debug_circle(name: &str, centre: Point2d, radius: f64) {
    #[cfg(feature = "debug")]
    record(
        "circle",
        name,
        json!({ "centre": [centre.x, centre.y], "radius": radius }),
    );
}

/// Takes every shape recorded on this thread since the last call, as a JSON array.
#[cfg(feature = "debug")]
pub fn take_debug_frame() -> Value {
    Value::Array(SHAPES.with(|shapes| shapes.take()))
}
