//! Scene graph and simulation loop for Boxworld
//!
//! This crate ties the physics crate to a hierarchy of named nodes:
//!
//! - [`Scene`] - Arena of [`Node`]s addressed by [`NodeKey`]
//! - [`Node`] - Named transform with keyed components
//! - [`Component`] - Rigid body, collider, joint or user [`Behavior`]
//! - [`World`] - Owns a scene and advances it one tick at a time
//! - [`SceneError`] - Failures of scene mutations

mod behavior;
mod component;
mod error;
mod node;
mod scene;
mod world;

pub use behavior::{Behavior, HookContext, HookResult};
pub use component::{Collider, Component, Joint, COLLIDER_KEY, JOINT_KEY, RIGID_BODY_KEY};
pub use error::SceneError;
pub use node::{Node, NodeFlags};
pub use scene::{NodeKey, Scene};
pub use world::{TickStats, World};

// Re-export commonly used types from the lower crates for convenience
pub use boxworld_math::{Quaternion, Vec3};
pub use boxworld_physics::{BoxCollider, FixedJoint, FrictionTable, PhysicsConfig, RaycastHit, RigidBody};
