//! Rigid body physics for Boxworld
//!
//! This crate provides the per-body dynamics and the narrow phase, independent
//! of any scene graph:
//! - Rigid body state and semi-implicit Euler integration
//! - Oriented box colliders with separating axis tests and face-clipped contacts
//! - A single-pass sequential impulse solver with Coulomb friction
//! - Fixed joints
//! - Ray/triangle queries
//!
//! Callers own positions and orientations and pass them in with each query.

pub mod body;
pub mod collider;
pub mod contact;
pub mod joint;
pub mod material;
pub mod raycast;
pub mod solver;

// Re-export commonly used types
pub use body::{RigidBody, DEFAULT_FRICTION, DEFAULT_MATERIAL, DEFAULT_RESTITUTION};
pub use collider::{collide_boxes, Aabb, BoxCollider, BoxPose};
pub use contact::{Contact, ContactPoint, Manifold};
pub use joint::{FixedJoint, JointAnchor, JointError};
pub use material::FrictionTable;
pub use raycast::{ray_triangle, raycast_triangles, RaycastHit, Triangle};
pub use solver::{
    apply_friction_impulse, resolve_dynamic_collision, resolve_kinematic_collision, resolve_manifold,
    ManifoldResolution, PhysicsConfig, SolverBody,
};
