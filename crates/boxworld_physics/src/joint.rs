//! Fixed joint between two rigid bodies

use boxworld_math::{Quaternion, Vec3};

use crate::body::RigidBody;

/// Configuration error raised when a joint is attached
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JointError {
    /// One of the joined nodes has no rigid body
    MissingRigidBody,
    /// The jointed (second) body is kinematic and cannot be driven by the joint
    KinematicTarget,
}

impl std::fmt::Display for JointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JointError::MissingRigidBody => {
                write!(f, "Fixed joint requires both objects to have rigid bodies")
            }
            JointError::KinematicTarget => write!(f, "Cannot joint a kinematic body"),
        }
    }
}

impl std::error::Error for JointError {}

/// The state a joint reads from one side of the constraint
#[derive(Clone, Copy, Debug)]
pub struct JointAnchor<'a> {
    pub body: Option<&'a RigidBody>,
    pub position: Vec3,
    pub orientation: Quaternion,
}

/// Holds body B at a fixed offset from body A
///
/// The offset and both orientations are captured at attach time. Each solve
/// cancels the relative linear velocity with an effective-mass weighted
/// impulse; when A is kinematic, B is additionally snapped onto the target
/// position.
#[derive(Clone, Debug, PartialEq)]
pub struct FixedJoint {
    /// Offset from A to B at attach time (world space)
    pub local_offset: Vec3,
    /// Orientation of A at attach time
    pub default_a: Quaternion,
    /// Orientation of B at attach time
    pub default_b: Quaternion,
}

impl FixedJoint {
    /// Capture the current relative placement of two bodies
    pub fn attach(a: JointAnchor<'_>, b: JointAnchor<'_>) -> Result<Self, JointError> {
        let body_b = match (a.body, b.body) {
            (Some(_), Some(body_b)) => body_b,
            _ => return Err(JointError::MissingRigidBody),
        };
        if body_b.is_kinematic {
            return Err(JointError::KinematicTarget);
        }

        Ok(Self {
            local_offset: b.position - a.position,
            default_a: a.orientation,
            default_b: b.orientation,
        })
    }

    /// Current target offset of B, following A's rotation since attach
    pub fn current_offset(&self, orientation_a: Quaternion) -> Vec3 {
        let delta = orientation_a * self.default_a.conjugate();
        delta.rotate(self.local_offset)
    }

    /// Apply one solver step
    ///
    /// Velocities at the anchors ignore angular motion.
    pub fn solve(
        &self,
        body_a: &mut RigidBody,
        position_a: Vec3,
        orientation_a: Quaternion,
        body_b: &mut RigidBody,
        position_b: &mut Vec3,
    ) {
        let inv_mass_a = body_a.inverse_mass();
        let inv_mass_b = body_b.inverse_mass();
        let inv_sum = inv_mass_a + inv_mass_b;
        if inv_sum <= 0.0 {
            log::warn!("fixed joint between two immovable bodies has no effect");
            return;
        }
        let effective_mass = 1.0 / inv_sum;

        let v_rel = body_b.velocity - body_a.velocity;
        let impulse = v_rel * -effective_mass;

        if body_a.is_dynamic() && body_b.is_dynamic() {
            body_a.velocity -= impulse * inv_mass_a;
            body_b.velocity += impulse * inv_mass_b;
        } else if body_b.is_dynamic() {
            body_b.velocity += impulse * inv_mass_b;
            *position_b = position_a + self.current_offset(orientation_a);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn anchor(body: Option<&RigidBody>, position: Vec3) -> JointAnchor<'_> {
        JointAnchor {
            body,
            position,
            orientation: Quaternion::IDENTITY,
        }
    }

    #[test]
    fn test_attach_captures_offset() {
        let a = RigidBody::new(1.0);
        let b = RigidBody::new(1.0);
        let joint = FixedJoint::attach(anchor(Some(&a), Vec3::ZERO), anchor(Some(&b), Vec3::new(0.0, 2.0, 0.0)))
            .expect("valid joint");
        assert_eq!(joint.local_offset, Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_attach_requires_rigid_bodies() {
        let a = RigidBody::new(1.0);
        let err = FixedJoint::attach(anchor(Some(&a), Vec3::ZERO), anchor(None, Vec3::X)).unwrap_err();
        assert_eq!(err, JointError::MissingRigidBody);
        let err = FixedJoint::attach(anchor(None, Vec3::ZERO), anchor(Some(&a), Vec3::X)).unwrap_err();
        assert_eq!(err, JointError::MissingRigidBody);
    }

    #[test]
    fn test_attach_rejects_kinematic_target() {
        let a = RigidBody::new_kinematic();
        let b = RigidBody::new_kinematic();
        let err = FixedJoint::attach(anchor(Some(&a), Vec3::ZERO), anchor(Some(&b), Vec3::X)).unwrap_err();
        assert_eq!(err, JointError::KinematicTarget);
        assert!(err.to_string().contains("kinematic"));
    }

    #[test]
    fn test_solve_dynamic_pair_matches_velocities() {
        let mut a = RigidBody::new(1.0).with_velocity(Vec3::new(2.0, 0.0, 0.0));
        let mut b = RigidBody::new(1.0);
        let joint = FixedJoint::attach(anchor(Some(&a), Vec3::ZERO), anchor(Some(&b), Vec3::X)).expect("valid");

        let mut pos_b = Vec3::X;
        joint.solve(&mut a, Vec3::ZERO, Quaternion::IDENTITY, &mut b, &mut pos_b);

        assert!(a.velocity.approx_eq(b.velocity, EPSILON));
        // Momentum is conserved for equal masses
        assert!((a.velocity + b.velocity).approx_eq(Vec3::new(2.0, 0.0, 0.0), EPSILON));
        assert_eq!(pos_b, Vec3::X);
    }

    #[test]
    fn test_solve_kinematic_anchor_snaps_position() {
        let mut a = RigidBody::new_kinematic();
        let mut b = RigidBody::new(1.0).with_velocity(Vec3::new(0.0, -3.0, 0.0));
        let joint = FixedJoint::attach(anchor(Some(&a), Vec3::ZERO), anchor(Some(&b), Vec3::new(0.0, -1.0, 0.0)))
            .expect("valid");

        let mut pos_b = Vec3::new(0.0, -1.4, 0.0);
        joint.solve(&mut a, Vec3::ZERO, Quaternion::IDENTITY, &mut b, &mut pos_b);

        assert!(b.velocity.approx_eq(Vec3::ZERO, EPSILON));
        assert!(pos_b.approx_eq(Vec3::new(0.0, -1.0, 0.0), EPSILON));
        assert_eq!(a.velocity, Vec3::ZERO);
    }

    #[test]
    fn test_offset_follows_anchor_rotation() {
        let a = RigidBody::new_kinematic();
        let b = RigidBody::new(1.0);
        let joint = FixedJoint::attach(anchor(Some(&a), Vec3::ZERO), anchor(Some(&b), Vec3::X)).expect("valid");
        let turned = Quaternion::from_axis_angle(Vec3::Z, std::f32::consts::FRAC_PI_2);
        assert!(joint.current_offset(turned).approx_eq(Vec3::Y, EPSILON));
    }
}
