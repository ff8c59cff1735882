//! Components attachable to scene nodes
//!
//! Components are stored on a node under a string key. The built-in physics
//! components always register under their canonical keys; behaviors register
//! under their type name unless an explicit key is given.

use std::collections::HashSet;
use std::fmt;

use boxworld_math::{Quaternion, Vec3};
use boxworld_physics::{BoxCollider, BoxPose, FixedJoint, RigidBody};

use crate::behavior::Behavior;
use crate::node::NodeFlags;
use crate::scene::NodeKey;

/// Storage key of a node's rigid body
pub const RIGID_BODY_KEY: &str = "Rigidbody";
/// Storage key of a node's box collider
pub const COLLIDER_KEY: &str = "collider";
/// Storage key of a node's joint
pub const JOINT_KEY: &str = "joint";

/// Box collider attached to a node, with per-pair contact bookkeeping
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Collider {
    /// Collision shape; its size mirrors the node's size at attach time
    pub shape: BoxCollider,
    pub(crate) touching: HashSet<NodeKey>,
}

impl Collider {
    /// Solid box collider of the given size
    pub fn new(size: Vec3) -> Self {
        Self::from(BoxCollider::new(size))
    }

    /// Trigger volume of the given size
    pub fn trigger(size: Vec3) -> Self {
        Self::from(BoxCollider::new(size).with_trigger(true))
    }

    pub fn is_trigger(&self) -> bool {
        self.shape.is_trigger
    }

    /// Whether this collider overlapped `other` on the last tick
    pub fn is_touching(&self, other: NodeKey) -> bool {
        self.touching.contains(&other)
    }

    /// Whether this collider overlapped anything on the last tick
    pub fn is_touching_any(&self) -> bool {
        !self.touching.is_empty()
    }

    /// Nodes this collider overlapped on the last tick
    pub fn touching(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.touching.iter().copied()
    }

    /// World-space box for a node at `position` with `orientation`
    pub fn pose(&self, position: Vec3, orientation: Quaternion) -> BoxPose {
        self.shape.pose(position, orientation)
    }
}

impl From<BoxCollider> for Collider {
    fn from(shape: BoxCollider) -> Self {
        Self {
            shape,
            touching: HashSet::new(),
        }
    }
}

/// Fixed joint from the owning node (body A) to a target node (body B)
///
/// The constraint is captured when the joint is attached to its owner.
#[derive(Clone, Debug, PartialEq)]
pub struct Joint {
    /// Node held at a fixed offset from the owner
    pub target: NodeKey,
    pub(crate) constraint: Option<FixedJoint>,
}

impl Joint {
    /// Joint to `target`, captured when added to a node
    pub fn fixed(target: NodeKey) -> Self {
        Self {
            target,
            constraint: None,
        }
    }

    /// The captured constraint, once attached
    pub fn constraint(&self) -> Option<&FixedJoint> {
        self.constraint.as_ref()
    }
}

/// A module attached to a scene node
pub enum Component {
    RigidBody(RigidBody),
    Collider(Collider),
    Joint(Joint),
    Behavior(Box<dyn Behavior>),
}

impl Component {
    /// Wrap a behavior
    pub fn behavior<B: Behavior + 'static>(behavior: B) -> Self {
        Component::Behavior(Box::new(behavior))
    }

    /// Key the component registers under when none is given
    pub fn default_key(&self) -> String {
        match self {
            Component::RigidBody(_) => RIGID_BODY_KEY.to_string(),
            Component::Collider(_) => COLLIDER_KEY.to_string(),
            Component::Joint(_) => JOINT_KEY.to_string(),
            Component::Behavior(behavior) => behavior.name().to_string(),
        }
    }

    /// Capability flag contributed when stored under `key`
    pub(crate) fn flag(&self, key: &str) -> NodeFlags {
        match self {
            Component::RigidBody(_) if key == RIGID_BODY_KEY => NodeFlags::RIGID_BODY,
            Component::Collider(_) if key == COLLIDER_KEY => NodeFlags::COLLIDER,
            Component::Joint(_) if key == JOINT_KEY => NodeFlags::JOINT,
            Component::Behavior(_) => NodeFlags::BEHAVIOR,
            _ => NodeFlags::NONE,
        }
    }

    pub fn as_rigid_body(&self) -> Option<&RigidBody> {
        match self {
            Component::RigidBody(body) => Some(body),
            _ => None,
        }
    }

    pub fn as_rigid_body_mut(&mut self) -> Option<&mut RigidBody> {
        match self {
            Component::RigidBody(body) => Some(body),
            _ => None,
        }
    }

    pub fn as_collider(&self) -> Option<&Collider> {
        match self {
            Component::Collider(collider) => Some(collider),
            _ => None,
        }
    }

    pub fn as_collider_mut(&mut self) -> Option<&mut Collider> {
        match self {
            Component::Collider(collider) => Some(collider),
            _ => None,
        }
    }

    pub fn as_joint(&self) -> Option<&Joint> {
        match self {
            Component::Joint(joint) => Some(joint),
            _ => None,
        }
    }

    pub fn as_behavior(&self) -> Option<&dyn Behavior> {
        match self {
            Component::Behavior(behavior) => Some(behavior.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::RigidBody(body) => f.debug_tuple("RigidBody").field(body).finish(),
            Component::Collider(collider) => f.debug_tuple("Collider").field(collider).finish(),
            Component::Joint(joint) => f.debug_tuple("Joint").field(joint).finish(),
            Component::Behavior(behavior) => f.debug_tuple("Behavior").field(&behavior.name()).finish(),
        }
    }
}

impl From<RigidBody> for Component {
    fn from(body: RigidBody) -> Self {
        Component::RigidBody(body)
    }
}

impl From<Collider> for Component {
    fn from(collider: Collider) -> Self {
        Component::Collider(collider)
    }
}

impl From<BoxCollider> for Component {
    fn from(shape: BoxCollider) -> Self {
        Component::Collider(Collider::from(shape))
    }
}

impl From<Joint> for Component {
    fn from(joint: Joint) -> Self {
        Component::Joint(joint)
    }
}
