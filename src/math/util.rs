use super::{Point2d, Vector2d};
use cgmath::prelude::*;

/// Vectors shorter than this are treated as having no direction.
pub const DIRECTION_EPSILON: f64 = 1e-9;

/// Projects a point onto a local coordinate system.
///
/// # Parameters
/// * `point` - The point to project
/// * `origin` - The origin of the coordinate system
/// * `x_axis` - The basis vector pointing in the positive x-axis.
/// * `y_axis` - The basis vector pointing in the positive y-axis.
pub fn project_local(
    point: Point2d,
    origin: Point2d,
    x_axis: Vector2d,
    y_axis: Vector2d,
) -> Point2d {
    let point = point - origin;
    Point2d::new(point.dot(x_axis), point.dot(y_axis))
}

/// Rotates a vector 90 degrees counter-clockwise, giving the left-hand normal of a direction.
pub fn rot90(vec: Vector2d) -> Vector2d {
    Vector2d::new(-vec.y, vec.x)
}

/// The 2D cross product (z component of the 3D cross product).
pub fn cross(a: Vector2d, b: Vector2d) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Normalises a vector, or returns `None` if it is too short to have a direction.
pub fn try_normalize(vec: Vector2d) -> Option<Vector2d> {
    let mag = vec.magnitude();
    (mag > DIRECTION_EPSILON).then(|| vec / mag)
}

/// The unit left-hand normal of the direction from `from` to `to`, if the points are distinct.
pub fn edge_normal(from: Point2d, to: Point2d) -> Option<Vector2d> {
    try_normalize(to - from).map(rot90)
}

/// The angle of a vector in radians, measured counter-clockwise from the positive x-axis.
pub fn heading_angle(vec: Vector2d) -> f64 {
    vec.y.atan2(vec.x)
}

/// The distance from `point` to the closest point on the segment `a`-`b`.
pub fn distance_to_segment(point: Point2d, a: Point2d, b: Point2d) -> f64 {
    let ab = b - a;
    let len2 = ab.magnitude2();
    if len2 < DIRECTION_EPSILON * DIRECTION_EPSILON {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / len2).clamp(0.0, 1.0);
    point.distance(a + t * ab)
}
