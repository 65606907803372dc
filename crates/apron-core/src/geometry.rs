//! Ground-plane geometry helpers.
//!
//! World frame: x east, y up, z north, meters. Headings are degrees in
//! `[0, 360)` with 0 toward +z, increasing clockwise seen from above.

use glam::{DQuat, DVec3};

pub const METERS_PER_FOOT: f64 = 0.3048;
pub const MPS_PER_KNOT: f64 = 0.514_444_4;

/// Drop the vertical component.
pub fn flatten(v: DVec3) -> DVec3 {
    DVec3::new(v.x, 0.0, v.z)
}

/// Horizontal distance between two points.
pub fn ground_distance(a: DVec3, b: DVec3) -> f64 {
    flatten(a - b).length()
}

pub fn normalize_heading(deg: f64) -> f64 {
    deg.rem_euclid(360.0)
}

/// Heading of a direction vector.
pub fn heading_of(v: DVec3) -> f64 {
    normalize_heading(v.x.atan2(v.z).to_degrees())
}

/// Unit ground vector pointing along `heading_deg`.
pub fn direction_from_heading(heading_deg: f64) -> DVec3 {
    let rad = heading_deg.to_radians();
    DVec3::new(rad.sin(), 0.0, rad.cos())
}

/// Unit ground vector pointing to the right of `heading_deg`.
pub fn right_of(heading_deg: f64) -> DVec3 {
    let rad = heading_deg.to_radians();
    DVec3::new(rad.cos(), 0.0, -rad.sin())
}

/// Rotate a direction clockwise (seen from above) by `deg`.
pub fn rotate_heading(v: DVec3, deg: f64) -> DVec3 {
    DQuat::from_rotation_y(deg.to_radians()) * v
}

/// Angle from `from` to `to` on the ground plane, positive when `to` lies
/// clockwise of `from`.
pub fn signed_angle_deg(from: DVec3, to: DVec3) -> f64 {
    let a = flatten(from);
    let b = flatten(to);
    if a.length_squared() < 1e-12 || b.length_squared() < 1e-12 {
        return 0.0;
    }
    let angle = a.angle_between(b).to_degrees();
    // y of (a x b) is positive when b is clockwise of a
    if a.cross(b).y < 0.0 {
        -angle
    } else {
        angle
    }
}

/// Signed cross-track offset of `point` from the line through `origin`
/// along `direction`; positive to the right.
pub fn cross_track(origin: DVec3, direction: DVec3, point: DVec3) -> f64 {
    let dir = flatten(direction).normalize_or_zero();
    let right = DVec3::new(dir.z, 0.0, -dir.x);
    flatten(point - origin).dot(right)
}
