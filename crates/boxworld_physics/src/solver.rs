//! Sequential impulse contact solver
//!
//! One pass over the contacts, no iterative refinement. The applied normal
//! impulse uses a purely linear effective mass; the angular mass term is
//! computed and recorded on each [`Contact`] for diagnostics but does not
//! enter the impulse.

use boxworld_math::{mat3, Quaternion, Vec3};

use crate::body::RigidBody;
use crate::contact::{point_velocity, relative_normal_velocity, Contact};
use crate::material::FrictionTable;

/// Tangential speeds below this produce no friction impulse
const TANGENT_EPSILON: f32 = 1e-6;

/// Configuration for the physics simulation
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicsConfig {
    /// Gravity acceleration
    pub gravity: Vec3,
    /// Approach speeds within `(-restitution_dead_zone, 0)` resolve without bounce
    pub restitution_dead_zone: f32,
    /// Bodies separating slower than this after a contact are treated as resting
    pub resting_speed: f32,
    /// Fraction of the penetration removed per tick by positional correction
    pub correction_factor: f32,
    /// Penetration left uncorrected to keep resting contacts alive
    pub correction_slop: f32,
    /// Pairwise material friction
    pub friction: FrictionTable,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.8, 0.0),
            restitution_dead_zone: 0.1,
            resting_speed: 0.05,
            correction_factor: 0.2,
            correction_slop: 0.005,
            friction: FrictionTable::default(),
        }
    }
}

impl PhysicsConfig {
    /// Create a new physics config with the given gravity
    pub fn new(gravity: Vec3) -> Self {
        Self {
            gravity,
            ..Self::default()
        }
    }

    /// Replace the friction table
    pub fn with_friction(mut self, friction: FrictionTable) -> Self {
        self.friction = friction;
        self
    }
}

/// A body taking part in contact resolution, with its node pose
#[derive(Debug)]
pub struct SolverBody<'a> {
    pub body: &'a mut RigidBody,
    pub position: Vec3,
    pub orientation: Quaternion,
}

impl<'a> SolverBody<'a> {
    pub fn new(body: &'a mut RigidBody, position: Vec3, orientation: Quaternion) -> Self {
        Self {
            body,
            position,
            orientation,
        }
    }
}

/// Outcome of resolving one manifold
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ManifoldResolution {
    /// Sum of normal impulse magnitudes applied
    pub normal_impulse: f32,
    /// Sum of friction impulse magnitudes applied
    pub friction_impulse: f32,
    /// Position offset to apply to body A
    pub correction_a: Vec3,
    /// Position offset to apply to body B
    pub correction_b: Vec3,
}

/// Restitution for a contact
///
/// The smaller of the two coefficients, or zero when either body is absent.
/// Slow approaches inside the dead zone never bounce.
pub fn restitution_for(
    a: Option<&RigidBody>,
    b: Option<&RigidBody>,
    v_norm: f32,
    config: &PhysicsConfig,
) -> f32 {
    if v_norm > -config.restitution_dead_zone && v_norm < 0.0 {
        return 0.0;
    }
    match (a, b) {
        (Some(a), Some(b)) => a.restitution.min(b.restitution),
        _ => 0.0,
    }
}

/// Sum of the bodies' inverse masses (kinematic bodies contribute zero)
#[inline]
pub fn linear_inverse_mass(a: &RigidBody, b: &RigidBody) -> f32 {
    a.inverse_mass() + b.inverse_mass()
}

/// Angular contribution `n · ((I⁻¹(r × n)) × r)` summed over both bodies
pub fn angular_mass_term(contact: &Contact, a: &SolverBody<'_>, b: &SolverBody<'_>) -> f32 {
    let term = |sb: &SolverBody<'_>, r: Vec3| {
        if sb.body.is_kinematic {
            return Vec3::ZERO;
        }
        let inv_inertia = sb.body.world_inverse_inertia(sb.orientation);
        mat3::transform(&inv_inertia, r.cross(contact.normal)).cross(r)
    };
    contact.normal.dot(term(a, contact.r_a) + term(b, contact.r_b))
}

/// Normal impulse magnitude `J = -(1 + e) v_norm / (Σ inverse mass)`, split over `points`
pub fn normal_impulse(v_norm: f32, restitution: f32, inverse_mass_sum: f32, points: usize) -> f32 {
    if inverse_mass_sum <= 0.0 {
        return 0.0;
    }
    let points = points.max(1) as f32;
    -(1.0 + restitution) * v_norm / (inverse_mass_sum * points)
}

/// Apply a normal impulse to two dynamic bodies
///
/// Linear velocities change by `±n·J / m`; angular velocities change by the
/// world-space inverse inertia applied to `r × n·J`. Kinematic bodies are
/// never touched.
pub fn resolve_dynamic_collision(contact: &Contact, impulse: f32, a: &mut SolverBody<'_>, b: &mut SolverBody<'_>) {
    let p = contact.normal * impulse;

    if a.body.is_dynamic() {
        a.body.velocity += p * a.body.inverse_mass();
        let inv_inertia = a.body.world_inverse_inertia(a.orientation);
        a.body.angular_velocity += mat3::transform(&inv_inertia, contact.r_a.cross(p));
    }
    if b.body.is_dynamic() {
        b.body.velocity -= p * b.body.inverse_mass();
        let inv_inertia = b.body.world_inverse_inertia(b.orientation);
        b.body.angular_velocity -= mat3::transform(&inv_inertia, contact.r_b.cross(p));
    }
}

/// Apply a normal impulse where one side is kinematic
///
/// Only linear velocity of the dynamic side changes.
pub fn resolve_kinematic_collision(contact: &Contact, impulse: f32, a: &mut RigidBody, b: &mut RigidBody) {
    let p = contact.normal * impulse;
    if a.is_dynamic() {
        a.velocity += p * a.inverse_mass();
    }
    if b.is_dynamic() {
        b.velocity -= p * b.inverse_mass();
    }
}

/// Apply Coulomb friction for a contact
///
/// The tangential impulse magnitude is clamped to `mu * normal_impulse`.
/// Friction changes linear velocity only. Returns the applied impulse on A
/// (B receives the opposite).
pub fn apply_friction_impulse(
    contact: &Contact,
    normal_impulse: f32,
    mu: f32,
    a: &mut RigidBody,
    b: &mut RigidBody,
) -> Vec3 {
    let n = contact.normal;
    let v_rel = point_velocity(a) - point_velocity(b);
    let tangent = v_rel - n * v_rel.dot(n);
    let tangent_speed = tangent.length();
    if tangent_speed < TANGENT_EPSILON {
        return Vec3::ZERO;
    }
    let tangent = tangent / tangent_speed;

    let denom = linear_inverse_mass(a, b);
    if denom == 0.0 {
        return Vec3::ZERO;
    }

    let max_friction = (mu * normal_impulse).abs();
    let magnitude = (-v_rel.dot(tangent) / denom).clamp(-max_friction, max_friction);
    let jt = tangent * magnitude;

    if a.is_dynamic() {
        a.velocity += jt * a.inverse_mass();
    }
    if b.is_dynamic() {
        b.velocity -= jt * b.inverse_mass();
    }
    jt
}

/// Remove the part of a resting body's accumulated force that pushes into a contact
///
/// `outward` points away from the contact surface toward the body. Returns
/// the magnitude of the removed force.
pub fn cancel_resting_force(body: &mut RigidBody, outward: Vec3) -> f32 {
    if body.is_kinematic {
        return 0.0;
    }
    let into = body.force.dot(outward);
    if into >= 0.0 {
        return 0.0;
    }
    let removed = outward * into;
    body.force -= removed;
    body.normal_force += removed;
    -into
}

/// Split a positional correction of `depth` along `normal` by inverse mass
///
/// Returns the offsets for A and B. Velocities are not touched.
pub fn positional_correction(
    depth: f32,
    normal: Vec3,
    a: &RigidBody,
    b: &RigidBody,
    config: &PhysicsConfig,
) -> (Vec3, Vec3) {
    let inv_sum = linear_inverse_mass(a, b);
    let amount = (depth - config.correction_slop).max(0.0) * config.correction_factor;
    if inv_sum <= 0.0 || amount <= 0.0 {
        return (Vec3::ZERO, Vec3::ZERO);
    }
    let step = normal * (amount / inv_sum);
    (step * a.inverse_mass(), -step * b.inverse_mass())
}

/// Resolve every contact of one manifold between bodies A and B
///
/// Each contact carries the relative normal velocity captured at collection
/// time. Contacts that were already separating are skipped. A manifold with
/// N points applies `J/N` at each point. After the impulses, dynamic bodies
/// that are no longer separating faster than `resting_speed` have the
/// into-contact part of their accumulated force cancelled, and the removed
/// force over `dt` becomes the normal impulse that bounds sliding friction
/// for the tick. Returns the positional correction for the manifold's `depth`.
pub fn resolve_manifold(
    contacts: &mut [Contact],
    depth: f32,
    dt: f32,
    a: &mut SolverBody<'_>,
    b: &mut SolverBody<'_>,
    config: &PhysicsConfig,
) -> ManifoldResolution {
    let mut resolution = ManifoldResolution::default();
    if contacts.is_empty() || (a.body.is_kinematic && b.body.is_kinematic) {
        return resolution;
    }

    let points = contacts.len();
    let inverse_mass_sum = linear_inverse_mass(a.body, b.body);
    let mu = config.friction.coefficient(a.body, b.body);
    let both_dynamic = a.body.is_dynamic() && b.body.is_dynamic();

    for contact in contacts.iter_mut() {
        contact.angular_mass = angular_mass_term(contact, a, b);
        if !contact.is_approaching() {
            continue;
        }

        let restitution = restitution_for(Some(&*a.body), Some(&*b.body), contact.v_norm, config);
        let j = normal_impulse(contact.v_norm, restitution, inverse_mass_sum, points);

        if both_dynamic {
            resolve_dynamic_collision(contact, j, a, b);
        } else {
            resolve_kinematic_collision(contact, j, a.body, b.body);
        }
        let jt = apply_friction_impulse(contact, j, mu, a.body, b.body);

        contact.impulse = j;
        contact.friction_impulse = jt.length();
        resolution.normal_impulse += j;
        resolution.friction_impulse += contact.friction_impulse;
    }

    let normal = contacts[0].normal;
    if relative_normal_velocity(a.body, b.body, normal) <= config.resting_speed {
        let removed = cancel_resting_force(a.body, normal) + cancel_resting_force(b.body, -normal);
        if removed > 0.0 {
            let jt = apply_friction_impulse(&contacts[0], removed * dt, mu, a.body, b.body);
            resolution.friction_impulse += jt.length();
        }
    }

    let (correction_a, correction_b) = positional_correction(depth, normal, a.body, b.body, config);
    resolution.correction_a = correction_a;
    resolution.correction_b = correction_b;
    resolution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::ContactPoint;

    const EPSILON: f32 = 1e-4;
    const DT: f32 = 1.0 / 60.0;

    fn contact_between(a: &RigidBody, pos_a: Vec3, b: &RigidBody, pos_b: Vec3, point: Vec3, normal: Vec3) -> Contact {
        Contact::new(&ContactPoint::new(point, normal, 0.01), a, pos_a, b, pos_b)
    }

    fn elastic(velocity: Vec3) -> RigidBody {
        let mut body = RigidBody::new(1.0).with_velocity(velocity).with_restitution(1.0);
        body.attach_to_box(Vec3::ONE);
        body
    }

    #[test]
    fn test_restitution_minimum_and_dead_zone() {
        let config = PhysicsConfig::default();
        let a = RigidBody::default().with_restitution(0.8);
        let b = RigidBody::default().with_restitution(0.3);
        assert_eq!(restitution_for(Some(&a), Some(&b), -2.0, &config), 0.3);
        assert_eq!(restitution_for(Some(&a), Some(&b), -0.05, &config), 0.0);
        assert_eq!(restitution_for(Some(&a), None, -2.0, &config), 0.0);
        assert_eq!(restitution_for(None, None, -2.0, &config), 0.0);
    }

    #[test]
    fn test_normal_impulse_linear_denominator() {
        // -(1 + 0.5) * -2 / (1 + 1) = 1.5, split over 3 points
        assert!((normal_impulse(-2.0, 0.5, 2.0, 1) - 1.5).abs() < EPSILON);
        assert!((normal_impulse(-2.0, 0.5, 2.0, 3) - 0.5).abs() < EPSILON);
        assert_eq!(normal_impulse(-2.0, 0.5, 0.0, 1), 0.0);
    }

    #[test]
    fn test_equal_mass_head_on_exchange() {
        let v = 3.0;
        let mut a = elastic(Vec3::new(v, 0.0, 0.0));
        let mut b = elastic(Vec3::new(-v, 0.0, 0.0));
        let pos_a = Vec3::new(-0.49, 0.0, 0.0);
        let pos_b = Vec3::new(0.49, 0.0, 0.0);
        // Normal points from B toward A
        let mut contacts = [contact_between(&a, pos_a, &b, pos_b, Vec3::ZERO, -Vec3::X)];

        let config = PhysicsConfig::default();
        let mut sa = SolverBody::new(&mut a, pos_a, Quaternion::IDENTITY);
        let mut sb = SolverBody::new(&mut b, pos_b, Quaternion::IDENTITY);
        resolve_manifold(&mut contacts, 0.02, DT, &mut sa, &mut sb, &config);

        assert!(a.velocity.approx_eq(Vec3::new(-v, 0.0, 0.0), EPSILON));
        assert!(b.velocity.approx_eq(Vec3::new(v, 0.0, 0.0), EPSILON));
        assert!(a.angular_velocity.approx_eq(Vec3::ZERO, EPSILON));
    }

    #[test]
    fn test_resting_contact_no_longer_approaching() {
        let config = PhysicsConfig::default();
        for v in [-0.001, -0.05, -0.099] {
            let mut body = RigidBody::new(2.0).with_velocity(Vec3::new(0.0, v, 0.0)).with_restitution(0.0);
            let mut floor = RigidBody::new_kinematic();
            let pos = Vec3::new(0.0, 0.5, 0.0);
            let mut contacts = [contact_between(&body, pos, &floor, Vec3::ZERO, Vec3::ZERO, Vec3::Y)];

            let mut sa = SolverBody::new(&mut body, pos, Quaternion::IDENTITY);
            let mut sb = SolverBody::new(&mut floor, Vec3::ZERO, Quaternion::IDENTITY);
            resolve_manifold(&mut contacts, 0.0, DT, &mut sa, &mut sb, &config);

            let after = relative_normal_velocity(&body, &floor, Vec3::Y);
            assert!(after >= -1e-6, "still approaching at {} after {}", after, v);
        }
    }

    #[test]
    fn test_kinematic_body_never_altered() {
        let config = PhysicsConfig::default();
        let samples = [
            (Vec3::new(1.0, -4.0, 0.5), Vec3::Y),
            (Vec3::new(-3.0, 0.2, 2.0), Vec3::new(0.6, 0.8, 0.0)),
            (Vec3::new(0.0, -0.05, 0.0), -Vec3::Z),
        ];
        for (velocity, normal) in samples {
            let mut body = RigidBody::new(1.0).with_velocity(velocity);
            body.attach_to_box(Vec3::ONE);
            let mut kinematic = RigidBody::new_kinematic().with_velocity(Vec3::new(0.3, 0.0, -0.7));
            kinematic.force = Vec3::new(0.0, -1.0, 0.0);
            let before = kinematic.clone();

            let mut contacts = [
                contact_between(&body, Vec3::ONE, &kinematic, Vec3::ZERO, Vec3::splat(0.5), normal),
                contact_between(&kinematic, Vec3::ZERO, &body, Vec3::ONE, Vec3::splat(0.5), -normal),
            ];
            let c0 = contacts[0];
            let c1 = contacts[1];

            resolve_kinematic_collision(&c0, 5.0, &mut body, &mut kinematic);
            resolve_kinematic_collision(&c1, 5.0, &mut kinematic, &mut body);
            apply_friction_impulse(&c0, 5.0, 0.6, &mut body, &mut kinematic);
            {
                let mut sa = SolverBody::new(&mut body, Vec3::ONE, Quaternion::IDENTITY);
                let mut sb = SolverBody::new(&mut kinematic, Vec3::ZERO, Quaternion::IDENTITY);
                resolve_dynamic_collision(&c0, 5.0, &mut sa, &mut sb);
                resolve_manifold(&mut contacts[..1], 0.5, DT, &mut sa, &mut sb, &config);
            }
            let (_, correction) = positional_correction(0.5, normal, &body, &kinematic, &config);

            assert_eq!(kinematic, before);
            assert_eq!(correction, Vec3::ZERO);
        }
    }

    #[test]
    fn test_friction_bounded_by_normal_impulse() {
        let mu = 0.4;
        let jn = 0.5;
        for tangential in [0.01, 0.5, 3.0, 40.0, -25.0] {
            let mut a = RigidBody::new(1.0).with_velocity(Vec3::new(tangential, -1.0, tangential * 0.3));
            let mut b = RigidBody::new(3.0);
            let contact = contact_between(&a, Vec3::Y, &b, Vec3::ZERO, Vec3::ZERO, Vec3::Y);
            let jt = apply_friction_impulse(&contact, jn, mu, &mut a, &mut b);
            assert!(jt.length() <= mu * jn + EPSILON, "{} exceeds bound", jt.length());
            assert!(jt.dot(Vec3::Y).abs() < EPSILON);
        }
    }

    #[test]
    fn test_friction_stops_slow_sliding() {
        // Small tangential speed is fully cancelled when within the cone
        let mut a = RigidBody::new(1.0).with_velocity(Vec3::new(0.1, 0.0, 0.0));
        let mut floor = RigidBody::new_kinematic();
        let contact = contact_between(&a, Vec3::Y, &floor, Vec3::ZERO, Vec3::ZERO, Vec3::Y);
        apply_friction_impulse(&contact, 1.0, 0.6, &mut a, &mut floor);
        assert!(a.velocity.approx_eq(Vec3::ZERO, EPSILON));
    }

    #[test]
    fn test_manifold_splits_impulse() {
        let config = PhysicsConfig::default();
        let mut body = RigidBody::new(1.0).with_velocity(Vec3::new(0.0, -2.0, 0.0)).with_restitution(0.0);
        let mut floor = RigidBody::new_kinematic();
        let pos = Vec3::new(0.0, 0.5, 0.0);
        let mut contacts: Vec<Contact> = [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)]
            .iter()
            .map(|&(x, z)| contact_between(&body, pos, &floor, Vec3::ZERO, Vec3::new(x, 0.0, z), Vec3::Y))
            .collect();

        let mut sa = SolverBody::new(&mut body, pos, Quaternion::IDENTITY);
        let mut sb = SolverBody::new(&mut floor, Vec3::ZERO, Quaternion::IDENTITY);
        let result = resolve_manifold(&mut contacts, 0.0, DT, &mut sa, &mut sb, &config);

        assert!((result.normal_impulse - 2.0).abs() < EPSILON);
        for c in &contacts {
            assert!((c.impulse - 0.5).abs() < EPSILON);
        }
        assert!(body.velocity.approx_eq(Vec3::ZERO, EPSILON));
    }

    #[test]
    fn test_resting_force_cancelled() {
        let config = PhysicsConfig::default();
        let mut body = RigidBody::new(1.0).with_velocity(Vec3::new(0.0, -0.05, 0.0));
        body.force = Vec3::new(1.0, -9.8, 0.0);
        let mut floor = RigidBody::new_kinematic();
        let pos = Vec3::new(0.0, 0.5, 0.0);
        let mut contacts = [contact_between(&body, pos, &floor, Vec3::ZERO, Vec3::ZERO, Vec3::Y)];

        let mut sa = SolverBody::new(&mut body, pos, Quaternion::IDENTITY);
        let mut sb = SolverBody::new(&mut floor, Vec3::ZERO, Quaternion::IDENTITY);
        resolve_manifold(&mut contacts, 0.0, DT, &mut sa, &mut sb, &config);

        assert!(body.force.approx_eq(Vec3::new(1.0, 0.0, 0.0), EPSILON));
        assert!(body.normal_force.approx_eq(Vec3::new(0.0, -9.8, 0.0), EPSILON));
    }

    #[test]
    fn test_resting_contact_slows_sliding() {
        let config = PhysicsConfig::default();
        let mut body = RigidBody::new(2.0).with_velocity(Vec3::new(3.0, 0.0, 0.0)).with_material("Rubber");
        body.force = Vec3::new(0.0, -19.6, 0.0);
        let mut floor = RigidBody::new_kinematic().with_material("Concrete");
        let pos = Vec3::new(0.0, 0.5, 0.0);
        let mut contacts = [contact_between(&body, pos, &floor, Vec3::ZERO, Vec3::ZERO, Vec3::Y)];

        let mut sa = SolverBody::new(&mut body, pos, Quaternion::IDENTITY);
        let mut sb = SolverBody::new(&mut floor, Vec3::ZERO, Quaternion::IDENTITY);
        let result = resolve_manifold(&mut contacts, 0.0, DT, &mut sa, &mut sb, &config);

        // Rubber on concrete: 0.9 * 19.6 * dt of impulse on a 2 kg body
        let expected = 3.0 - 0.9 * 9.8 * DT;
        assert!((body.velocity.x - expected).abs() < EPSILON, "{}", body.velocity.x);
        assert!((result.friction_impulse - 0.9 * 19.6 * DT).abs() < EPSILON);
        assert_eq!(body.velocity.y, 0.0);
    }

    #[test]
    fn test_resting_friction_does_not_reverse_motion() {
        let config = PhysicsConfig::default();
        let mut body = RigidBody::new(1.0).with_velocity(Vec3::new(0.0, 0.0, 0.02));
        body.force = Vec3::new(0.0, -9.8, 0.0);
        let mut floor = RigidBody::new_kinematic();
        let pos = Vec3::new(0.0, 0.5, 0.0);
        let mut contacts = [contact_between(&body, pos, &floor, Vec3::ZERO, Vec3::ZERO, Vec3::Y)];

        let mut sa = SolverBody::new(&mut body, pos, Quaternion::IDENTITY);
        let mut sb = SolverBody::new(&mut floor, Vec3::ZERO, Quaternion::IDENTITY);
        resolve_manifold(&mut contacts, 0.0, DT, &mut sa, &mut sb, &config);

        assert!(body.velocity.approx_eq(Vec3::ZERO, EPSILON));
        assert_eq!(floor, RigidBody::new_kinematic());
    }

    #[test]
    fn test_positional_correction_split_by_inverse_mass() {
        let config = PhysicsConfig::default();
        let light = RigidBody::new(1.0);
        let heavy = RigidBody::new(3.0);
        let (ca, cb) = positional_correction(0.105, Vec3::Y, &light, &heavy, &config);
        // 0.2 * (0.105 - 0.005) = 0.02 total, split 3:1
        assert!(ca.approx_eq(Vec3::new(0.0, 0.015, 0.0), EPSILON));
        assert!(cb.approx_eq(Vec3::new(0.0, -0.005, 0.0), EPSILON));

        let (ca, cb) = positional_correction(0.004, Vec3::Y, &light, &heavy, &config);
        assert_eq!(ca, Vec3::ZERO);
        assert_eq!(cb, Vec3::ZERO);
    }

    #[test]
    fn test_angular_mass_term_is_diagnostic() {
        let config = PhysicsConfig::default();
        let mut a = elastic(Vec3::new(0.0, -1.0, 0.0));
        let mut b = elastic(Vec3::ZERO);
        let pos_a = Vec3::new(0.3, 0.99, 0.0);
        let mut contacts = [contact_between(&a, pos_a, &b, Vec3::ZERO, Vec3::new(0.5, 0.5, 0.0), Vec3::Y)];

        let mut sa = SolverBody::new(&mut a, pos_a, Quaternion::IDENTITY);
        let mut sb = SolverBody::new(&mut b, Vec3::ZERO, Quaternion::IDENTITY);
        resolve_manifold(&mut contacts, 0.0, DT, &mut sa, &mut sb, &config);

        assert!(contacts[0].angular_mass > 0.0);
        // Linear-only denominator: J = -(1 + 1)(-1) / 2
        assert!((contacts[0].impulse - 1.0).abs() < EPSILON);
    }
}
