//! Ray queries against triangle soups

use boxworld_math::Vec3;

/// A triangle given by its three world-space vertices
pub type Triangle = [Vec3; 3];

/// Determinant magnitude below which a ray is treated as parallel to a triangle
const PARALLEL_EPSILON: f32 = 1e-8;

/// Result of a successful raycast
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaycastHit {
    /// World-space hit point
    pub point: Vec3,
    /// Unit surface normal, facing back toward the ray origin
    pub normal: Vec3,
    /// Distance from the ray origin along the (normalized) direction
    pub distance: f32,
    /// Index of the triangle that was hit
    pub triangle: usize,
}

/// Möller-Trumbore ray/triangle intersection
///
/// `direction` must be normalized for the returned value to be a distance.
/// Returns `None` for misses, hits behind the origin, and degenerate
/// (zero-area) triangles.
pub fn ray_triangle(origin: Vec3, direction: Vec3, triangle: &Triangle) -> Option<f32> {
    let [v0, v1, v2] = *triangle;
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let h = direction.cross(edge2);
    let a = edge1.dot(h);
    if a.abs() < PARALLEL_EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = origin - v0;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * direction.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);
    if t > PARALLEL_EPSILON {
        Some(t)
    } else {
        None
    }
}

/// Cast a ray against a set of triangles and return the nearest hit
///
/// Hits farther than `max_distance` are ignored. A zero direction never hits.
pub fn raycast_triangles(
    origin: Vec3,
    direction: Vec3,
    triangles: &[Triangle],
    max_distance: f32,
) -> Option<RaycastHit> {
    let direction = direction.normalized();
    if direction == Vec3::ZERO {
        return None;
    }

    let mut nearest: Option<(usize, f32)> = None;
    for (index, triangle) in triangles.iter().enumerate() {
        if let Some(t) = ray_triangle(origin, direction, triangle) {
            if t <= max_distance && nearest.map_or(true, |(_, best)| t < best) {
                nearest = Some((index, t));
            }
        }
    }

    nearest.map(|(index, distance)| {
        let [v0, v1, v2] = triangles[index];
        let mut normal = (v1 - v0).cross(v2 - v0).normalized();
        if normal.dot(direction) > 0.0 {
            normal = -normal;
        }
        RaycastHit {
            point: origin + direction * distance,
            normal,
            distance,
            triangle: index,
        }
    })
}
