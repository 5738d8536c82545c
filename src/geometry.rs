// src/geometry.rs
use nalgebra::Vector2;

use crate::error::GeometryError;

/// Interior angle at `b`, in degrees within `[0, 180]`, between the rays
/// `b→a` and `b→c`.
///
/// Uses the difference of the two ray headings, so the result does not
/// depend on ray length. A zero-length ray has no heading and is reported
/// as [`GeometryError::DegenerateAngle`].
pub fn joint_angle(
    a: Vector2<f64>,
    b: Vector2<f64>,
    c: Vector2<f64>,
) -> Result<f64, GeometryError> {
    let ba = a - b;
    let bc = c - b;

    if ba.norm_squared() == 0.0 || bc.norm_squared() == 0.0 {
        return Err(GeometryError::DegenerateAngle);
    }

    let radians = bc.y.atan2(bc.x) - ba.y.atan2(ba.x);
    let angle = radians.to_degrees().abs();

    Ok(if angle > 180.0 { 360.0 - angle } else { angle })
}

/// Rotate `v` by `degrees` (counter-clockwise in a y-up frame).
pub fn rotate(v: Vector2<f64>, degrees: f64) -> Vector2<f64> {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Vector2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}
