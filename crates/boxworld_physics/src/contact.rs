//! Contact records produced by narrow-phase collision

use boxworld_math::Vec3;

use crate::body::RigidBody;

/// A single point of a contact manifold
///
/// The normal points from the second box toward the first, so pushing the
/// first body along `normal` separates the pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactPoint {
    /// World-space contact point
    pub point: Vec3,
    /// Unit contact normal (from the second box toward the first)
    pub normal: Vec3,
    /// Penetration depth at this point (positive = overlapping)
    pub depth: f32,
}

impl ContactPoint {
    pub fn new(point: Vec3, normal: Vec3, depth: f32) -> Self {
        Self { point, normal, depth }
    }
}

/// All contact points produced by one overlapping box pair
#[derive(Clone, Debug, PartialEq)]
pub struct Manifold {
    /// Collision normal shared by all points (from the second box toward the first)
    pub normal: Vec3,
    /// Penetration depth along the normal (the smallest SAT overlap)
    pub depth: f32,
    /// Contact points, never empty
    pub points: Vec<ContactPoint>,
}

impl Manifold {
    /// Collapse the manifold to one averaged point, normal and depth
    pub fn single_point(&self) -> ContactPoint {
        let count = self.points.len().max(1) as f32;
        let (point_sum, normal_sum, depth_sum) = self.points.iter().fold(
            (Vec3::ZERO, Vec3::ZERO, 0.0),
            |(p, n, d), c| (p + c.point, n + c.normal, d + c.depth),
        );
        ContactPoint {
            point: point_sum / count,
            normal: normal_sum.normalized(),
            depth: depth_sum / count,
        }
    }

    /// Number of contact points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Per-tick solver record for one contact point between two bodies
///
/// Captures the relative normal velocity at collection time; the impulse
/// pass uses this captured value rather than re-reading velocities.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    /// World-space contact point
    pub point: Vec3,
    /// Unit normal from body B toward body A
    pub normal: Vec3,
    /// Penetration depth
    pub depth: f32,
    /// Lever arm from body A's centre to the contact point
    pub r_a: Vec3,
    /// Lever arm from body B's centre to the contact point
    pub r_b: Vec3,
    /// Relative velocity of A with respect to B along the normal (negative = approaching)
    pub v_norm: f32,
    /// Angular contribution to the effective mass (diagnostic only)
    pub angular_mass: f32,
    /// Normal impulse magnitude applied by the solver
    pub impulse: f32,
    /// Tangential impulse magnitude applied by the solver
    pub friction_impulse: f32,
}

impl Contact {
    /// Build a contact from a manifold point and the two bodies' current state
    pub fn new(
        point: &ContactPoint,
        body_a: &RigidBody,
        position_a: Vec3,
        body_b: &RigidBody,
        position_b: Vec3,
    ) -> Self {
        let v_norm = relative_normal_velocity(body_a, body_b, point.normal);
        Self {
            point: point.point,
            normal: point.normal,
            depth: point.depth,
            r_a: point.point - position_a,
            r_b: point.point - position_b,
            v_norm,
            angular_mass: 0.0,
            impulse: 0.0,
            friction_impulse: 0.0,
        }
    }

    /// Whether the bodies were approaching at collection time
    #[inline]
    pub fn is_approaching(&self) -> bool {
        self.v_norm < 0.0
    }
}

/// Velocity of a body's contact point
///
/// Angular contribution is ignored and kinematic bodies report zero.
#[inline]
pub fn point_velocity(body: &RigidBody) -> Vec3 {
    if body.is_kinematic {
        Vec3::ZERO
    } else {
        body.velocity
    }
}

/// Relative velocity of A with respect to B along `normal`
pub fn relative_normal_velocity(body_a: &RigidBody, body_b: &RigidBody, normal: Vec3) -> f32 {
    (point_velocity(body_a) - point_velocity(body_b)).dot(normal)
}
