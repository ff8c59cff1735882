//! Scene graph arena
//!
//! Nodes live in a generational arena and refer to each other by [`NodeKey`].
//! Children are owned through their parent's child list; removing a node
//! removes its whole subtree, and stale keys simply stop resolving.

use boxworld_math::Vec3;
use boxworld_physics::{FixedJoint, JointAnchor};
use slotmap::{new_key_type, SlotMap};

use crate::behavior::{call_guarded, run_hook, Hook};
use crate::component::{Component, COLLIDER_KEY};
use crate::error::SceneError;
use crate::node::{Node, NodeFlags};

new_key_type! {
    /// Key to a node in the scene
    ///
    /// Generational: once a node is destroyed its key never resolves again,
    /// even if the slot is reused.
    pub struct NodeKey;
}

/// Hierarchy of nodes and their components
#[derive(Debug, Default)]
pub struct Scene {
    nodes: SlotMap<NodeKey, Node>,
    roots: Vec<NodeKey>,
    started: bool,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node at the top level
    pub fn add_root(&mut self, mut node: Node) -> NodeKey {
        node.parent = None;
        node.children.clear();
        let key = self.nodes.insert(node);
        self.roots.push(key);
        key
    }

    /// Add a node under `parent`
    ///
    /// A child of `parent` with the same name is destroyed and replaced in
    /// place; otherwise the node is appended.
    pub fn add_child(&mut self, parent: NodeKey, mut node: Node) -> Result<NodeKey, SceneError> {
        if !self.nodes.contains_key(parent) {
            return Err(SceneError::NodeNotFound(parent));
        }
        node.parent = None;
        node.children.clear();
        let key = self.nodes.insert(node);
        self.link_child(parent, key);
        Ok(key)
    }

    /// Move an existing node (and its subtree) under `parent`
    pub fn attach_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), SceneError> {
        if !self.nodes.contains_key(parent) {
            return Err(SceneError::NodeNotFound(parent));
        }
        if !self.nodes.contains_key(child) {
            return Err(SceneError::NodeNotFound(child));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(SceneError::CyclicHierarchy {
                parent: self.nodes[parent].name.clone(),
                child: self.nodes[child].name.clone(),
            });
        }
        self.unlink(child);
        self.link_child(parent, child);
        Ok(())
    }

    fn link_child(&mut self, parent: NodeKey, child: NodeKey) {
        let name = self.nodes[child].name.clone();
        let existing = self.nodes[parent]
            .children
            .iter()
            .position(|&k| k != child && self.nodes.get(k).map_or(false, |n| n.name == name));

        match existing {
            Some(index) => {
                let replaced = std::mem::replace(&mut self.nodes[parent].children[index], child);
                if let Some(old) = self.nodes.get_mut(replaced) {
                    old.parent = None;
                }
                self.remove_subtree(replaced);
            }
            None => self.nodes[parent].children.push(child),
        }
        self.nodes[child].parent = Some(parent);
    }

    /// Detach a node from its parent's child list (or the root list)
    fn unlink(&mut self, key: NodeKey) {
        match self.nodes.get(key).and_then(|n| n.parent) {
            Some(parent) => {
                if let Some(p) = self.nodes.get_mut(parent) {
                    p.children.retain(|&k| k != key);
                }
            }
            None => self.roots.retain(|&k| k != key),
        }
        if let Some(node) = self.nodes.get_mut(key) {
            node.parent = None;
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeKey, mut key: NodeKey) -> bool {
        loop {
            if key == ancestor {
                return true;
            }
            match self.nodes.get(key).and_then(|n| n.parent) {
                Some(parent) => key = parent,
                None => return false,
            }
        }
    }

    fn remove_subtree(&mut self, key: NodeKey) -> Option<Node> {
        let mut node = self.nodes.remove(key)?;
        for child in std::mem::take(&mut node.children) {
            self.remove_subtree(child);
        }
        Some(node)
    }

    /// Remove a node and its whole subtree
    ///
    /// Returns the removed node (with an empty child list).
    pub fn destroy(&mut self, key: NodeKey) -> Option<Node> {
        if !self.nodes.contains_key(key) {
            return None;
        }
        self.unlink(key);
        self.remove_subtree(key)
    }

    /// Remove `child` from `parent`'s child list, destroying it
    pub fn remove_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<Node, SceneError> {
        if self.parent(child) != Some(parent) {
            return Err(SceneError::NodeNotFound(child));
        }
        self.destroy(child).ok_or(SceneError::NodeNotFound(child))
    }

    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }

    /// Two distinct nodes at once
    pub fn get_pair_mut(&mut self, a: NodeKey, b: NodeKey) -> Option<[&mut Node; 2]> {
        self.nodes.get_disjoint_mut([a, b])
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[NodeKey] {
        &self.roots
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(key).and_then(|n| n.parent)
    }

    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes
            .get(key)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    /// Whether [`World::start`](crate::World::start) has run
    pub fn is_started(&self) -> bool {
        self.started
    }

    pub(crate) fn mark_started(&mut self) {
        self.started = true;
    }

    // --- Queries ---

    fn first_in_subtree(&self, root: NodeKey, matches: &dyn Fn(&Node) -> bool) -> Option<NodeKey> {
        let node = self.nodes.get(root)?;
        if matches(node) {
            return Some(root);
        }
        node.children
            .iter()
            .find_map(|&child| self.first_in_subtree(child, matches))
    }

    /// Depth-first search of `root`'s subtree (including `root`) by name
    pub fn search(&self, root: NodeKey, name: &str) -> Option<NodeKey> {
        self.first_in_subtree(root, &|n: &Node| n.name == name)
    }

    /// Depth-first search of `root`'s subtree for a node holding component `key`
    pub fn search_by_component(&self, root: NodeKey, key: &str) -> Option<NodeKey> {
        self.first_in_subtree(root, &|n: &Node| n.has_component(key))
    }

    /// Search every root's subtree by name
    pub fn find(&self, name: &str) -> Option<NodeKey> {
        self.roots.iter().find_map(|&root| self.search(root, name))
    }

    /// Search every root's subtree for a node holding component `key`
    pub fn find_by_component(&self, key: &str) -> Option<NodeKey> {
        self.roots
            .iter()
            .find_map(|&root| self.search_by_component(root, key))
    }

    fn collect_descendants(&self, key: NodeKey, out: &mut Vec<NodeKey>) {
        for &child in self.children(key) {
            out.push(child);
            self.collect_descendants(child, out);
        }
    }

    /// All descendants of `root` in depth-first pre-order (excluding `root`)
    pub fn get_all_children(&self, root: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        self.collect_descendants(root, &mut out);
        out
    }

    /// Descendants of `root` holding both a rigid body and a collider
    pub fn get_all_children_physics(&self, root: NodeKey) -> Vec<NodeKey> {
        self.get_all_children(root)
            .into_iter()
            .filter(|&k| self.nodes[k].is_physics())
            .collect()
    }

    /// `root` and its descendants that hold a collider
    pub fn get_all_colliders(&self, root: NodeKey) -> Vec<NodeKey> {
        let mut out = vec![root];
        self.collect_descendants(root, &mut out);
        out.retain(|&k| self.nodes.get(k).map_or(false, |n| n.has_component(COLLIDER_KEY)));
        out
    }

    /// Every node in depth-first pre-order, root by root
    pub fn all_nodes(&self) -> Vec<NodeKey> {
        let mut out = Vec::with_capacity(self.nodes.len());
        for &root in &self.roots {
            out.push(root);
            self.collect_descendants(root, &mut out);
        }
        out
    }

    /// Descendants of `root` that follow it rigidly
    ///
    /// Stops at physics nodes, which move on their own.
    pub fn non_physics_descendants(&self, root: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeKey> = self.children(root).iter().rev().copied().collect();
        while let Some(key) = stack.pop() {
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            if node.is_physics() {
                continue;
            }
            out.push(key);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Iterate over every live node
    pub fn iter(&self) -> impl Iterator<Item = (NodeKey, &Node)> {
        self.nodes.iter()
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    /// Every physics node in depth-first pre-order
    pub fn physics_nodes(&self) -> Vec<NodeKey> {
        self.nodes_with(NodeFlags::PHYSICS)
    }

    pub(crate) fn nodes_with(&self, flags: NodeFlags) -> Vec<NodeKey> {
        let mut keys = self.all_nodes();
        keys.retain(|&k| self.nodes[k].flags().contains(flags));
        keys
    }

    // --- Components ---

    /// Attach a component under its default key
    ///
    /// Returns the key it was stored under. See [`Scene::add_component_named`].
    pub fn add_component(&mut self, node: NodeKey, component: impl Into<Component>) -> Result<String, SceneError> {
        self.attach_component(node, None, component.into())
    }

    /// Attach a component under an explicit key
    ///
    /// Attaching runs the component's attach step against the node:
    /// - a rigid body derives its inertia from the node size (and must have
    ///   positive mass unless kinematic)
    /// - a collider takes the node size
    /// - a joint captures its offset to the target, failing if either side
    ///   lacks a rigid body or the target is kinematic
    /// - a behavior runs `on_attach`, and `start` if the world has started
    ///
    /// A component already stored under the same key is replaced.
    pub fn add_component_named(
        &mut self,
        node: NodeKey,
        key: &str,
        component: impl Into<Component>,
    ) -> Result<String, SceneError> {
        self.attach_component(node, Some(key), component.into())
    }

    fn attach_component(
        &mut self,
        node: NodeKey,
        explicit_key: Option<&str>,
        component: Component,
    ) -> Result<String, SceneError> {
        let owner = self.nodes.get(node).ok_or(SceneError::NodeNotFound(node))?;
        let key = explicit_key.map_or_else(|| component.default_key(), str::to_string);

        let component = match component {
            Component::RigidBody(mut body) => {
                if !body.is_kinematic && !(body.mass > 0.0) {
                    return Err(SceneError::InvalidMass {
                        node: owner.name.clone(),
                        mass: body.mass,
                    });
                }
                body.attach_to_box(owner.size);
                Component::RigidBody(body)
            }
            Component::Collider(mut collider) => {
                collider.shape.size = owner.size;
                collider.touching.clear();
                Component::Collider(collider)
            }
            Component::Joint(mut joint) => {
                if joint.target == node {
                    return Err(SceneError::Attach {
                        node: owner.name.clone(),
                        component: key,
                        message: "a joint cannot target its own node".to_string(),
                    });
                }
                let target = self
                    .nodes
                    .get(joint.target)
                    .ok_or(SceneError::NodeNotFound(joint.target))?;
                let fixed = FixedJoint::attach(anchor_of(owner), anchor_of(target))?;
                joint.constraint = Some(fixed);
                Component::Joint(joint)
            }
            Component::Behavior(mut behavior) => {
                let node_name = owner.name.clone();
                if let Err(message) = call_guarded(behavior.as_mut(), self, node, Hook::Attach) {
                    return Err(SceneError::Attach {
                        node: node_name,
                        component: key,
                        message,
                    });
                }
                let owner = self.nodes.get_mut(node).ok_or(SceneError::NodeNotFound(node))?;
                owner.insert_component(key.clone(), Component::Behavior(behavior));
                if self.started {
                    run_hook(self, node, &key, Hook::Start);
                }
                return Ok(key);
            }
        };

        if let Some(owner) = self.nodes.get_mut(node) {
            owner.insert_component(key.clone(), component);
        }
        Ok(key)
    }

    /// Detach and return the component stored under `key`
    pub fn remove_component(&mut self, node: NodeKey, key: &str) -> Option<Component> {
        self.nodes.get_mut(node)?.remove_component(key)
    }

    // --- Transforms ---

    /// Capture the current position of `root` and its subtree as the default
    pub fn set_default_position(&mut self, root: NodeKey) {
        let mut keys = vec![root];
        self.collect_descendants(root, &mut keys);
        for key in keys {
            if let Some(node) = self.nodes.get_mut(key) {
                node.capture_default_position();
            }
        }
    }

    /// Restore default positions in `root`'s subtree and stop every rigid body in it
    pub fn reset_to_default(&mut self, root: NodeKey) {
        let mut keys = vec![root];
        self.collect_descendants(root, &mut keys);
        for key in keys {
            let Some(node) = self.nodes.get_mut(key) else {
                continue;
            };
            node.position = node.default_position();
            if let Some(body) = node.rigid_body_mut() {
                body.velocity = Vec3::ZERO;
                body.acceleration = Vec3::ZERO;
                body.angular_velocity = Vec3::ZERO;
                body.angular_acceleration = Vec3::ZERO;
            }
        }
    }

    /// Position relative to the parent, in the parent's rotated frame
    pub fn local_position(&self, key: NodeKey) -> Option<Vec3> {
        let node = self.nodes.get(key)?;
        match node.parent.and_then(|p| self.nodes.get(p)) {
            Some(parent) => Some(parent.quaternion().conjugate().rotate(node.position - parent.position)),
            None => Some(node.position),
        }
    }

    /// Place a node at `local` in its parent's frame
    pub fn set_local_position(&mut self, key: NodeKey, local: Vec3) -> Result<(), SceneError> {
        let world = match self.parent(key).and_then(|p| self.nodes.get(p)) {
            Some(parent) => parent.position + parent.quaternion().rotate(local),
            None => local,
        };
        let node = self.nodes.get_mut(key).ok_or(SceneError::NodeNotFound(key))?;
        node.position = world;
        Ok(())
    }

    /// Mass-weighted mean position of the rigid bodies below `root`
    ///
    /// `None` if no descendant carries mass.
    pub fn find_center_of_gravity(&self, root: NodeKey) -> Option<Vec3> {
        let (weighted, total) = self
            .get_all_children(root)
            .into_iter()
            .filter_map(|k| {
                let node = &self.nodes[k];
                node.rigid_body().map(|body| (node.position, body.mass))
            })
            .filter(|&(_, mass)| mass > 0.0)
            .fold((Vec3::ZERO, 0.0), |(sum, total), (position, mass)| {
                (sum + position * mass, total + mass)
            });
        if total > 0.0 {
            Some(weighted / total)
        } else {
            None
        }
    }
}

fn anchor_of(node: &Node) -> JointAnchor<'_> {
    JointAnchor {
        body: node.rigid_body(),
        position: node.position,
        orientation: node.quaternion(),
    }
}
