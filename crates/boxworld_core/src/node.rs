//! Scene nodes
//!
//! A node owns its transform and its components. Hierarchy links are keys
//! into the owning [`Scene`](crate::Scene): children are owned through the
//! arena, the parent link is a plain back-reference.

use bitflags::bitflags;
use boxworld_math::{Quaternion, Vec3};
use boxworld_physics::{Aabb, BoxPose, RigidBody, Triangle};

use crate::component::{Collider, Component, Joint, COLLIDER_KEY, JOINT_KEY, RIGID_BODY_KEY};
use crate::scene::NodeKey;

bitflags! {
    /// Capabilities currently attached to a node
    ///
    /// Kept in sync with the component registry so pipeline queries do not
    /// have to scan every node's components.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        /// Nothing attached
        const NONE = 0;
        /// A rigid body under the "Rigidbody" key
        const RIGID_BODY = 1 << 0;
        /// A box collider under the "collider" key
        const COLLIDER = 1 << 1;
        /// A joint under the "joint" key
        const JOINT = 1 << 2;
        /// At least one behavior
        const BEHAVIOR = 1 << 3;
        /// Takes part in the physics pipeline
        const PHYSICS = Self::RIGID_BODY.bits() | Self::COLLIDER.bits();
    }
}

/// A node in the scene graph
#[derive(Debug)]
pub struct Node {
    /// Name used by searches and same-name child replacement
    pub name: String,
    /// World-space position
    pub position: Vec3,
    /// Full extent on each axis, the basis for box colliders and inertia
    pub size: Vec3,
    rotation: Vec3,
    quaternion: Quaternion,
    default_position: Vec3,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,
    pub(crate) components: Vec<(String, Component)>,
    flags: NodeFlags,
}

impl Default for Node {
    fn default() -> Self {
        Self::new("")
    }
}

impl Node {
    /// Create a unit-sized node at the origin
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: Vec3::ZERO,
            size: Vec3::ONE,
            rotation: Vec3::ZERO,
            quaternion: Quaternion::IDENTITY,
            default_position: Vec3::ZERO,
            parent: None,
            children: Vec::new(),
            components: Vec::new(),
            flags: NodeFlags::NONE,
        }
    }

    /// Set the position, which also becomes the default position
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self.default_position = position;
        self
    }

    /// Set the rotation from Euler angles in degrees
    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.set_rotation(rotation);
        self
    }

    pub fn with_size(mut self, size: Vec3) -> Self {
        self.size = size;
        self
    }

    /// Euler rotation in degrees (roll, pitch, yaw), derived from the quaternion after each tick
    #[inline]
    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    #[inline]
    pub fn quaternion(&self) -> Quaternion {
        self.quaternion
    }

    /// Set the rotation from Euler angles in degrees
    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.rotation = rotation;
        self.quaternion = Quaternion::from_euler(rotation);
    }

    /// Add Euler angles in degrees to the current rotation
    pub fn add_rotation(&mut self, delta: Vec3) {
        self.set_rotation(self.rotation + delta);
    }

    /// Set the orientation directly (normalized); the Euler view follows
    pub fn set_quaternion(&mut self, quaternion: Quaternion) {
        self.quaternion = quaternion.normalize();
        self.sync_rotation();
    }

    /// Re-derive the Euler view from the quaternion
    pub(crate) fn sync_rotation(&mut self) {
        self.rotation = self.quaternion.to_euler();
    }

    /// Position restored by [`Scene::reset_to_default`](crate::Scene::reset_to_default)
    pub fn default_position(&self) -> Vec3 {
        self.default_position
    }

    pub(crate) fn capture_default_position(&mut self) {
        self.default_position = self.position;
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    /// Whether the node has both a rigid body and a collider
    pub fn is_physics(&self) -> bool {
        self.flags.contains(NodeFlags::PHYSICS)
    }

    /// Look up a component by its storage key
    pub fn get_component(&self, key: &str) -> Option<&Component> {
        self.components
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, component)| component)
    }

    pub fn get_component_mut(&mut self, key: &str) -> Option<&mut Component> {
        self.components
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, component)| component)
    }

    pub fn has_component(&self, key: &str) -> bool {
        self.get_component(key).is_some()
    }

    /// Storage keys in attach order
    pub fn component_keys(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|(k, _)| k.as_str())
    }

    /// Keys of the attached behaviors, in attach order
    pub fn behavior_keys(&self) -> Vec<String> {
        self.components
            .iter()
            .filter(|(_, c)| matches!(c, Component::Behavior(_)))
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn rigid_body(&self) -> Option<&RigidBody> {
        self.get_component(RIGID_BODY_KEY)?.as_rigid_body()
    }

    pub fn rigid_body_mut(&mut self) -> Option<&mut RigidBody> {
        self.get_component_mut(RIGID_BODY_KEY)?.as_rigid_body_mut()
    }

    pub fn collider(&self) -> Option<&Collider> {
        self.get_component(COLLIDER_KEY)?.as_collider()
    }

    pub fn collider_mut(&mut self) -> Option<&mut Collider> {
        self.get_component_mut(COLLIDER_KEY)?.as_collider_mut()
    }

    pub fn joint(&self) -> Option<&Joint> {
        self.get_component(JOINT_KEY)?.as_joint()
    }

    /// Apply a force to the rigid body, optionally at a world-space point
    ///
    /// A point off the centre also produces torque. Returns `false` if the
    /// node has no rigid body.
    pub fn add_force(&mut self, force: Vec3, point: Option<Vec3>) -> bool {
        let position = self.position;
        match (self.rigid_body_mut(), point) {
            (Some(body), Some(point)) => {
                body.add_force_at(force, point, position);
                true
            }
            (Some(body), None) => {
                body.add_force(force);
                true
            }
            (None, _) => false,
        }
    }

    /// World-space box of the collider at the node's current transform
    pub fn collider_pose(&self) -> Option<BoxPose> {
        self.collider()
            .map(|collider| collider.pose(self.position, self.quaternion))
    }

    pub fn world_corners(&self) -> Option<[Vec3; 8]> {
        self.collider_pose().map(|pose| pose.corners())
    }

    pub fn world_aabb(&self) -> Option<Aabb> {
        self.collider_pose().map(|pose| pose.aabb())
    }

    /// The 12 surface triangles of the collider box
    pub fn world_triangles(&self) -> Option<[Triangle; 12]> {
        self.collider_pose().map(|pose| pose.triangles())
    }

    /// Rigid body together with the transform it drives
    pub(crate) fn body_and_transform_mut(&mut self) -> Option<(&mut RigidBody, &mut Vec3, &mut Quaternion)> {
        let Self {
            position,
            quaternion,
            components,
            ..
        } = self;
        let body = components
            .iter_mut()
            .find(|(k, _)| k == RIGID_BODY_KEY)
            .and_then(|(_, c)| c.as_rigid_body_mut())?;
        Some((body, position, quaternion))
    }

    /// Store a component, replacing any component under the same key in place
    pub(crate) fn insert_component(&mut self, key: String, component: Component) -> Option<Component> {
        let previous = match self.components.iter().position(|(k, _)| *k == key) {
            Some(index) => Some(std::mem::replace(&mut self.components[index].1, component)),
            None => {
                self.components.push((key, component));
                None
            }
        };
        self.refresh_flags();
        previous
    }

    /// Store a component at `index`, or at the end if the list has shrunk
    pub(crate) fn restore_component(&mut self, index: usize, key: String, component: Component) {
        let index = index.min(self.components.len());
        self.components.insert(index, (key, component));
        self.refresh_flags();
    }

    /// Take a component out without updating the flags
    pub(crate) fn take_component(&mut self, key: &str) -> Option<(usize, Component)> {
        let index = self.components.iter().position(|(k, _)| k == key)?;
        let (_, component) = self.components.remove(index);
        Some((index, component))
    }

    pub(crate) fn remove_component(&mut self, key: &str) -> Option<Component> {
        let (_, component) = self.take_component(key)?;
        self.refresh_flags();
        Some(component)
    }

    fn refresh_flags(&mut self) {
        self.flags = self
            .components
            .iter()
            .fold(NodeFlags::NONE, |flags, (key, component)| flags | component.flag(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    #[test]
    fn test_new_node_defaults() {
        let node = Node::new("crate");
        assert_eq!(node.name, "crate");
        assert_eq!(node.size, Vec3::ONE);
        assert_eq!(node.quaternion(), Quaternion::IDENTITY);
        assert!(node.parent().is_none());
        assert_eq!(node.flags(), NodeFlags::NONE);
    }

    #[test]
    fn test_rotation_keeps_quaternion_in_sync() {
        let mut node = Node::new("spinner").with_rotation(Vec3::new(0.0, 0.0, 30.0));
        node.add_rotation(Vec3::new(0.0, 0.0, 15.0));
        assert!(node.rotation().approx_eq(Vec3::new(0.0, 0.0, 45.0), EPSILON));

        let expected = Quaternion::from_axis_angle(Vec3::Z, 45f32.to_radians());
        assert!(node.quaternion().approx_eq_rotation(&expected, EPSILON));
    }

    #[test]
    fn test_set_quaternion_updates_euler() {
        let mut node = Node::new("n");
        node.set_quaternion(Quaternion::from_axis_angle(Vec3::Y, 20f32.to_radians()) * 2.0);
        assert!((node.quaternion().magnitude() - 1.0).abs() < EPSILON);
        assert!(node.rotation().approx_eq(Vec3::new(0.0, 20.0, 0.0), EPSILON));
    }

    #[test]
    fn test_insert_replaces_in_place_and_tracks_flags() {
        let mut node = Node::new("n");
        node.insert_component(RIGID_BODY_KEY.to_string(), RigidBody::new(1.0).into());
        node.insert_component(COLLIDER_KEY.to_string(), Collider::new(Vec3::ONE).into());
        assert!(node.is_physics());

        let replaced = node.insert_component(RIGID_BODY_KEY.to_string(), RigidBody::new(5.0).into());
        assert!(replaced.is_some());
        assert_eq!(node.component_keys().collect::<Vec<_>>(), vec!["Rigidbody", "collider"]);
        assert_eq!(node.rigid_body().map(|b| b.mass), Some(5.0));

        node.remove_component(COLLIDER_KEY);
        assert!(!node.is_physics());
        assert!(node.flags().contains(NodeFlags::RIGID_BODY));
    }

    #[test]
    fn test_get_component_missing_is_none() {
        let node = Node::new("n");
        assert!(node.get_component("Rigidbody").is_none());
        assert!(node.rigid_body().is_none());
        assert!(node.collider_pose().is_none());
    }

    #[test]
    fn test_add_force_at_point_adds_torque() {
        let mut node = Node::new("n").with_position(Vec3::new(0.0, 1.0, 0.0));
        assert!(!node.add_force(Vec3::X, None));

        node.insert_component(RIGID_BODY_KEY.to_string(), RigidBody::new(1.0).into());
        assert!(node.add_force(Vec3::X, Some(Vec3::new(0.0, 2.0, 0.0))));
        let body = node.rigid_body().expect("body");
        assert_eq!(body.force, Vec3::X);
        // (point - position) × F = Y × X = -Z
        assert!(body.torque.approx_eq(-Vec3::Z, EPSILON));
    }

    #[test]
    fn test_world_bounds_follow_transform() {
        let mut node = Node::new("box")
            .with_position(Vec3::new(2.0, 0.0, 0.0))
            .with_size(Vec3::new(2.0, 2.0, 2.0));
        node.insert_component(COLLIDER_KEY.to_string(), Collider::new(node.size).into());

        let aabb = node.world_aabb().expect("collider");
        assert!(aabb.min.approx_eq(Vec3::new(1.0, -1.0, -1.0), EPSILON));
        assert!(aabb.max.approx_eq(Vec3::new(3.0, 1.0, 1.0), EPSILON));
        assert_eq!(node.world_triangles().map(|t| t.len()), Some(12));
        assert_eq!(node.world_corners().map(|c| c.len()), Some(8));
    }
}
