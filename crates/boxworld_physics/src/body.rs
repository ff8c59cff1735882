//! Rigid body state and integration

use boxworld_math::{mat3, Mat3, Quaternion, Vec3};
use serde::{Deserialize, Serialize};

/// Inertia components below this are treated as zero when inverting
const INERTIA_EPSILON: f32 = 1e-8;

/// Material name used when none is given
pub const DEFAULT_MATERIAL: &str = "Steel";

/// Friction coefficient for material pairs missing from the friction table
pub const DEFAULT_FRICTION: f32 = 0.6;

/// Default restitution for new bodies
pub const DEFAULT_RESTITUTION: f32 = 0.6;

/// Per-node dynamical state
///
/// A body does not know where it is: position and orientation live on the
/// owning scene node and are passed in when integrating or resolving
/// contacts. Force and torque are accumulators that are cleared by
/// [`RigidBody::integrate`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigidBody {
    /// Mass of the body (must be positive unless kinematic)
    pub mass: f32,
    /// Linear velocity (units per second)
    pub velocity: Vec3,
    /// Angular velocity (radians per second, world space)
    pub angular_velocity: Vec3,
    /// Accumulated force for this tick
    pub force: Vec3,
    /// Accumulated torque for this tick
    pub torque: Vec3,
    /// Linear acceleration from the last integration step
    pub acceleration: Vec3,
    /// Angular acceleration from the last integration step
    pub angular_acceleration: Vec3,
    /// Into-contact force removed by resting contacts during the last tick
    pub normal_force: Vec3,
    /// Diagonal inertia tensor in body space
    pub inertia: Vec3,
    /// Component-wise inverse of `inertia` (zero where inertia is ~0)
    pub inverse_inertia: Vec3,
    /// Kinematic bodies have infinite mass and never receive impulses
    pub is_kinematic: bool,
    /// Whether gravity is accumulated each tick
    pub use_gravity: bool,
    /// Coefficient of restitution in [0, 1]
    pub restitution: f32,
    /// Explicit friction coefficient; `None` defers to the material table
    pub friction: Option<f32>,
    /// Material name used by the friction table
    pub material: String,
}

impl Default for RigidBody {
    fn default() -> Self {
        Self {
            mass: 1.0,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            angular_acceleration: Vec3::ZERO,
            normal_force: Vec3::ZERO,
            inertia: Vec3::ZERO,
            inverse_inertia: Vec3::ZERO,
            is_kinematic: false,
            use_gravity: true,
            restitution: DEFAULT_RESTITUTION,
            friction: None,
            material: DEFAULT_MATERIAL.to_string(),
        }
    }
}

impl RigidBody {
    /// Create a dynamic body with the given mass
    pub fn new(mass: f32) -> Self {
        Self {
            mass,
            ..Self::default()
        }
    }

    /// Create a kinematic body (infinite mass, no gravity)
    pub fn new_kinematic() -> Self {
        Self {
            is_kinematic: true,
            use_gravity: false,
            ..Self::default()
        }
    }

    /// Set the mass of this body
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    /// Set the velocity of this body
    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    /// Set the angular velocity of this body
    pub fn with_angular_velocity(mut self, angular_velocity: Vec3) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    /// Set the restitution (bounciness) of this body
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution.clamp(0.0, 1.0);
        self
    }

    /// Set the friction coefficient of this body
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = Some(friction.max(0.0));
        self
    }

    /// Set the material name used for friction lookups
    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.material = material.into();
        self
    }

    /// Set whether this body is kinematic
    pub fn kinematic(mut self, is_kinematic: bool) -> Self {
        self.is_kinematic = is_kinematic;
        self
    }

    /// Set whether this body is affected by gravity
    pub fn with_gravity(mut self, use_gravity: bool) -> Self {
        self.use_gravity = use_gravity;
        self
    }

    /// Derive the diagonal inertia tensor from the owning box's size
    ///
    /// `size` is the full extent of the box on each axis.
    pub fn attach_to_box(&mut self, size: Vec3) {
        let half = size * 0.5;
        let k = self.mass / 3.0;
        self.inertia = Vec3::new(
            k * (half.y * half.y + half.z * half.z),
            k * (half.x * half.x + half.z * half.z),
            k * (half.x * half.x + half.y * half.y),
        );
        self.inverse_inertia = Vec3::new(
            safe_inverse(self.inertia.x),
            safe_inverse(self.inertia.y),
            safe_inverse(self.inertia.z),
        );
    }

    /// Inverse mass (zero for kinematic bodies)
    #[inline]
    pub fn inverse_mass(&self) -> f32 {
        if self.is_kinematic || self.mass <= 0.0 {
            0.0
        } else {
            1.0 / self.mass
        }
    }

    /// Whether this body responds to impulses
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        !self.is_kinematic
    }

    /// Inverse inertia tensor expressed in world space for the given orientation
    pub fn world_inverse_inertia(&self, orientation: Quaternion) -> Mat3 {
        if self.is_kinematic {
            return [[0.0; 3]; 3];
        }
        let r = orientation.to_matrix3();
        mat3::rotate_tensor(&r, &mat3::from_diagonal(self.inverse_inertia))
    }

    /// Accumulate a force through the centre of mass
    pub fn add_force(&mut self, force: Vec3) {
        self.force += force;
    }

    /// Accumulate a force applied at a world-space point on a body centred at `position`
    ///
    /// Also accumulates the torque `(point - position) × force`.
    pub fn add_force_at(&mut self, force: Vec3, point: Vec3, position: Vec3) {
        self.force += force;
        self.torque += (point - position).cross(force);
    }

    /// Kinetic energy (linear part only)
    pub fn kinetic_energy(&self) -> f32 {
        if self.is_kinematic {
            return 0.0;
        }
        0.5 * self.mass * self.velocity.length_squared()
    }

    /// Advance this body by `dt` using semi-implicit Euler
    ///
    /// Velocities are updated from the accumulated force and torque first,
    /// then position and orientation are advanced with the new velocities.
    /// Force, torque and angular acceleration are zeroed afterwards.
    /// Returns the linear displacement applied to `position`.
    pub fn integrate(&mut self, position: &mut Vec3, orientation: &mut Quaternion, dt: f32) -> Vec3 {
        if self.is_kinematic {
            self.clear_accumulators();
            return Vec3::ZERO;
        }

        self.acceleration = self.force * self.inverse_mass();
        self.angular_acceleration = Vec3::new(
            divide_or_zero(self.torque.x, self.inertia.x),
            divide_or_zero(self.torque.y, self.inertia.y),
            divide_or_zero(self.torque.z, self.inertia.z),
        );

        self.velocity += self.acceleration * dt;
        self.angular_velocity += self.angular_acceleration * dt;

        let displacement = self.velocity * dt;
        *position += displacement;

        // Angular displacement is built in body space and applied on the right
        let angular_step = orientation.conjugate().rotate(self.angular_velocity * dt);
        if angular_step != Vec3::ZERO {
            *orientation = (*orientation * Quaternion::from_euler_radians(angular_step)).normalize();
        }

        self.clear_accumulators();
        displacement
    }

    fn clear_accumulators(&mut self) {
        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
        self.angular_acceleration = Vec3::ZERO;
    }
}

fn safe_inverse(value: f32) -> f32 {
    if value.abs() > INERTIA_EPSILON {
        1.0 / value
    } else {
        0.0
    }
}

fn divide_or_zero(numerator: f32, denominator: f32) -> f32 {
    if denominator != 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_defaults() {
        let body = RigidBody::default();
        assert_eq!(body.mass, 1.0);
        assert_eq!(body.restitution, 0.6);
        assert_eq!(body.friction, None);
        assert_eq!(body.material, "Steel");
        assert!(body.use_gravity);
        assert!(!body.is_kinematic);
    }

    #[test]
    fn test_builders() {
        let body = RigidBody::new(2.0)
            .with_velocity(Vec3::X)
            .with_restitution(1.5)
            .with_friction(0.3)
            .with_material("Rubber")
            .with_gravity(false);
        assert_eq!(body.mass, 2.0);
        assert_eq!(body.velocity, Vec3::X);
        assert_eq!(body.restitution, 1.0);
        assert_eq!(body.friction, Some(0.3));
        assert_eq!(body.material, "Rubber");
        assert!(!body.use_gravity);
    }

    #[test]
    fn test_kinematic_has_zero_inverse_mass() {
        let body = RigidBody::new_kinematic();
        assert_eq!(body.inverse_mass(), 0.0);
        assert!(!body.use_gravity);
        assert_eq!(RigidBody::new(4.0).inverse_mass(), 0.25);
    }

    #[test]
    fn test_attach_to_unit_cube() {
        let mut body = RigidBody::new(6.0);
        body.attach_to_box(Vec3::ONE);
        // m/12 * (1 + 1) = 1
        assert!((body.inertia.x - 1.0).abs() < EPSILON);
        assert!((body.inertia.y - 1.0).abs() < EPSILON);
        assert!((body.inverse_inertia.z - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_attach_flat_box_guards_zero_inertia() {
        let mut body = RigidBody::new(1.0);
        body.attach_to_box(Vec3::new(0.0, 0.0, 2.0));
        assert_eq!(body.inertia.z, 0.0);
        assert_eq!(body.inverse_inertia.z, 0.0);
        assert!(body.inverse_inertia.x > 0.0);
    }

    #[test]
    fn test_add_force_with_contact_point_adds_torque() {
        let mut body = RigidBody::new(1.0);
        body.add_force_at(Vec3::Y, Vec3::new(1.0, 0.0, 0.0), Vec3::ZERO);
        assert_eq!(body.force, Vec3::Y);
        // X cross Y = Z
        assert_eq!(body.torque, Vec3::Z);

        body.add_force(Vec3::Y);
        assert_eq!(body.force, Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(body.torque, Vec3::Z);
    }

    #[test]
    fn test_integrate_semi_implicit() {
        let mut body = RigidBody::new(2.0);
        body.add_force(Vec3::new(0.0, -4.0, 0.0));
        let mut pos = Vec3::ZERO;
        let mut q = Quaternion::IDENTITY;
        let moved = body.integrate(&mut pos, &mut q, 0.5);

        // a = -2, v = -1, x = v * dt = -0.5
        assert!((body.velocity.y + 1.0).abs() < EPSILON);
        assert!((pos.y + 0.5).abs() < EPSILON);
        assert_eq!(moved, pos);
        assert_eq!(body.force, Vec3::ZERO);
        assert_eq!(body.torque, Vec3::ZERO);
    }

    #[test]
    fn test_integrate_rotates_orientation() {
        let mut body = RigidBody::new(1.0).with_angular_velocity(Vec3::new(0.0, 0.0, 1.0));
        body.attach_to_box(Vec3::ONE);
        let mut pos = Vec3::ZERO;
        let mut q = Quaternion::IDENTITY;
        for _ in 0..10 {
            body.integrate(&mut pos, &mut q, 0.1);
        }
        let expected = Quaternion::from_axis_angle(Vec3::Z, 1.0);
        assert!(q.approx_eq_rotation(&expected, 1e-4));
        assert!((q.magnitude() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_integrate_kinematic_does_not_move() {
        let mut body = RigidBody::new_kinematic().with_velocity(Vec3::X);
        body.add_force(Vec3::Y);
        let mut pos = Vec3::new(1.0, 2.0, 3.0);
        let mut q = Quaternion::IDENTITY;
        let moved = body.integrate(&mut pos, &mut q, 1.0);
        assert_eq!(moved, Vec3::ZERO);
        assert_eq!(pos, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(body.velocity, Vec3::X);
        assert_eq!(body.force, Vec3::ZERO);
    }

    #[test]
    fn test_world_inverse_inertia_rotates() {
        let mut body = RigidBody::new(12.0);
        body.attach_to_box(Vec3::new(2.0, 1.0, 1.0));
        let q = Quaternion::from_axis_angle(Vec3::Z, std::f32::consts::FRAC_PI_2);
        let world = body.world_inverse_inertia(q);
        // body X maps to world Y
        assert!((world[1][1] - body.inverse_inertia.x).abs() < EPSILON);
        assert!((world[0][0] - body.inverse_inertia.y).abs() < EPSILON);
    }

    #[test]
    fn test_kinetic_energy() {
        let body = RigidBody::new(2.0).with_velocity(Vec3::new(3.0, 0.0, 4.0));
        assert!((body.kinetic_energy() - 25.0).abs() < EPSILON);
        assert_eq!(RigidBody::new_kinematic().with_velocity(Vec3::X).kinetic_energy(), 0.0);
    }
}
