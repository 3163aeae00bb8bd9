//! Joint geometry

use super::landmarks::Landmark;

/// Angle in degrees at vertex `b` formed by `b→a` and `b→c`, in `[0, 180]`.
///
/// Coincident points (noisy low-confidence landmarks collapse onto each
/// other) and non-finite input yield `0.0` instead of NaN.
pub fn angle_between(a: Landmark, b: Landmark, c: Landmark) -> f32 {
    if !(a.is_finite() && b.is_finite() && c.is_finite()) {
        return 0.0;
    }
    if coincident(a, b) || coincident(c, b) {
        return 0.0;
    }

    let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let mut angle = radians.to_degrees().abs();

    if angle > 180.0 {
        angle = 360.0 - angle;
    }

    angle.clamp(0.0, 180.0)
}

fn coincident(p: Landmark, q: Landmark) -> bool {
    (p.x - q.x).abs() <= f32::EPSILON && (p.y - q.y).abs() <= f32::EPSILON
}
