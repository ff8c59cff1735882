//! Simulation world
//!
//! The world owns the scene and drives one tick of the simulation per call to
//! [`World::update`]:
//!
//! 1. behavior `update` hooks (when script hooks are enabled)
//! 2. gravity on every physics body
//! 3. contact collection over all physics node pairs
//! 4. collision and trigger events
//! 5. impulse resolution of non-trigger manifolds
//! 6. joints
//! 7. integration, with non-physics descendants following their body
//! 8. Euler rotations re-derived from the integrated quaternions

use std::collections::{HashMap, HashSet};

use boxworld_math::Vec3;
use boxworld_physics::{collide_boxes, raycast_triangles, resolve_manifold, Contact, PhysicsConfig, RaycastHit, SolverBody};

use crate::behavior::{run_hook, run_hooks, Hook};
use crate::node::NodeFlags;
use crate::scene::{NodeKey, Scene};

/// Counters for one tick
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Overlapping physics pairs found
    pub manifolds: usize,
    /// Contact points across all manifolds
    pub contacts: usize,
    /// Collision and trigger events raised
    pub events: usize,
}

/// Contacts collected for one overlapping pair
struct PairContacts {
    a: NodeKey,
    b: NodeKey,
    depth: f32,
    contacts: Vec<Contact>,
    trigger_a: bool,
    trigger_b: bool,
}

impl PairContacts {
    fn is_trigger(&self) -> bool {
        self.trigger_a || self.trigger_b
    }
}

/// A scene together with the physics settings that drive it
#[derive(Debug, Default)]
pub struct World {
    scene: Scene,
    config: PhysicsConfig,
    ticks: u64,
}

impl World {
    /// Create an empty world
    pub fn new(config: PhysicsConfig) -> Self {
        Self {
            scene: Scene::new(),
            config,
            ticks: 0,
        }
    }

    /// Replace the scene
    pub fn with_scene(mut self, scene: Scene) -> Self {
        self.scene = scene;
        self
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut PhysicsConfig {
        &mut self.config
    }

    /// Number of completed ticks
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run every behavior's `start` hook once
    ///
    /// Behaviors attached after this call are started as they are attached.
    /// Calling it again does nothing.
    pub fn start(&mut self) {
        if self.scene.is_started() {
            log::debug!("world already started");
            return;
        }

        let pending: Vec<(NodeKey, String)> = self
            .scene
            .all_nodes()
            .into_iter()
            .flat_map(|key| {
                let keys = self.scene.get(key).map(|n| n.behavior_keys()).unwrap_or_default();
                keys.into_iter().map(move |k| (key, k))
            })
            .collect();

        self.scene.mark_started();
        for (node, key) in pending {
            run_hook(&mut self.scene, node, &key, Hook::Start);
        }
    }

    /// Advance the simulation by `dt` seconds
    pub fn update(&mut self, dt: f32, run_script_hooks: bool) -> TickStats {
        if run_script_hooks {
            for node in self.scene.all_nodes() {
                run_hooks(&mut self.scene, node, Hook::Update(dt));
            }
        }

        let bodies = self.scene.physics_nodes();
        self.apply_gravity(&bodies);

        let mut pairs = self.collect_contacts(&bodies);
        let mut stats = TickStats {
            manifolds: pairs.len(),
            contacts: pairs.iter().map(|p| p.contacts.len()).sum(),
            events: 0,
        };
        stats.events = self.dispatch_collision_events(&pairs);

        let mut moved: HashMap<NodeKey, Vec3> = HashMap::new();
        self.resolve_contacts(&mut pairs, dt, &mut moved);
        self.solve_joints(&bodies, &mut moved);
        self.integrate(&bodies, dt, &mut moved);
        self.move_followers(&bodies, &moved);

        for node in self.scene.nodes_mut() {
            node.sync_rotation();
        }

        self.ticks += 1;
        log::debug!(
            "tick {}: {} bodies, {} manifolds, {} contacts, {} events",
            self.ticks,
            bodies.len(),
            stats.manifolds,
            stats.contacts,
            stats.events
        );
        stats
    }

    fn apply_gravity(&mut self, bodies: &[NodeKey]) {
        let gravity = self.config.gravity;
        for &key in bodies {
            let Some(body) = self.scene.get_mut(key).and_then(|n| n.rigid_body_mut()) else {
                continue;
            };
            body.normal_force = Vec3::ZERO;
            if body.use_gravity && body.is_dynamic() {
                body.add_force(gravity * body.mass);
            }
        }
    }

    fn collect_contacts(&self, bodies: &[NodeKey]) -> Vec<PairContacts> {
        let mut pairs = Vec::new();
        for (i, &a) in bodies.iter().enumerate() {
            for &b in &bodies[i + 1..] {
                let (Some(node_a), Some(node_b)) = (self.scene.get(a), self.scene.get(b)) else {
                    continue;
                };
                let (Some(body_a), Some(body_b)) = (node_a.rigid_body(), node_b.rigid_body()) else {
                    continue;
                };
                if body_a.is_kinematic && body_b.is_kinematic {
                    continue;
                }
                let (Some(collider_a), Some(collider_b)) = (node_a.collider(), node_b.collider()) else {
                    continue;
                };

                let pose_a = collider_a.pose(node_a.position, node_a.quaternion());
                let pose_b = collider_b.pose(node_b.position, node_b.quaternion());
                let Some(manifold) = collide_boxes(&pose_a, &pose_b) else {
                    continue;
                };

                let contacts = manifold
                    .points
                    .iter()
                    .map(|point| Contact::new(point, body_a, node_a.position, body_b, node_b.position))
                    .collect();
                pairs.push(PairContacts {
                    a,
                    b,
                    depth: manifold.depth,
                    contacts,
                    trigger_a: collider_a.is_trigger(),
                    trigger_b: collider_b.is_trigger(),
                });
            }
        }
        pairs
    }

    /// Update each collider's touching set and run the matching hooks
    ///
    /// Returns the number of events raised.
    fn dispatch_collision_events(&mut self, pairs: &[PairContacts]) -> usize {
        let mut current: HashMap<NodeKey, HashSet<NodeKey>> = HashMap::new();
        let mut events: Vec<(NodeKey, Hook)> = Vec::new();

        for pair in pairs {
            for (me, other, is_trigger) in [(pair.a, pair.b, pair.trigger_a), (pair.b, pair.a, pair.trigger_b)] {
                current.entry(me).or_default().insert(other);
                let was_touching = self
                    .scene
                    .get(me)
                    .and_then(|n| n.collider())
                    .map_or(false, |c| c.is_touching(other));
                if was_touching {
                    events.push((me, Hook::CollisionStay(other)));
                } else {
                    events.push((me, Hook::CollisionEnter(other)));
                    if is_trigger {
                        events.push((me, Hook::TriggerEnter(other)));
                    }
                }
            }
        }

        for key in self.scene.nodes_with(NodeFlags::COLLIDER) {
            let now = current.remove(&key).unwrap_or_default();
            let Some(collider) = self.scene.get_mut(key).and_then(|n| n.collider_mut()) else {
                continue;
            };
            let mut gone: Vec<NodeKey> = collider.touching.difference(&now).copied().collect();
            gone.sort();
            collider.touching = now;
            events.extend(gone.into_iter().map(|other| (key, Hook::CollisionExit(other))));
        }

        let count = events.len();
        for (node, hook) in events {
            run_hooks(&mut self.scene, node, hook);
        }
        count
    }

    fn resolve_contacts(&mut self, pairs: &mut [PairContacts], dt: f32, moved: &mut HashMap<NodeKey, Vec3>) {
        for pair in pairs.iter_mut().filter(|p| !p.is_trigger()) {
            // Hooks may have removed either node since collection
            let Some([node_a, node_b]) = self.scene.get_pair_mut(pair.a, pair.b) else {
                continue;
            };
            let (Some((body_a, position_a, orientation_a)), Some((body_b, position_b, orientation_b))) =
                (node_a.body_and_transform_mut(), node_b.body_and_transform_mut())
            else {
                continue;
            };

            let mut a = SolverBody::new(body_a, *position_a, *orientation_a);
            let mut b = SolverBody::new(body_b, *position_b, *orientation_b);
            let resolution = resolve_manifold(&mut pair.contacts, pair.depth, dt, &mut a, &mut b, &self.config);

            *position_a += resolution.correction_a;
            *position_b += resolution.correction_b;
            accumulate(moved, pair.a, resolution.correction_a);
            accumulate(moved, pair.b, resolution.correction_b);
        }
    }

    fn solve_joints(&mut self, bodies: &[NodeKey], moved: &mut HashMap<NodeKey, Vec3>) {
        for &owner in bodies {
            let Some((target, joint)) = self
                .scene
                .get(owner)
                .and_then(|n| n.joint())
                .and_then(|j| Some((j.target, j.constraint()?.clone())))
            else {
                continue;
            };

            let Some([node_a, node_b]) = self.scene.get_pair_mut(owner, target) else {
                log::debug!("joint target of {:?} no longer exists", owner);
                continue;
            };
            let position_a = node_a.position;
            let orientation_a = node_a.quaternion();
            let (Some(body_a), Some((body_b, position_b, _))) =
                (node_a.rigid_body_mut(), node_b.body_and_transform_mut())
            else {
                continue;
            };

            let before = *position_b;
            joint.solve(body_a, position_a, orientation_a, body_b, position_b);
            accumulate(moved, target, *position_b - before);
        }
    }

    fn integrate(&mut self, bodies: &[NodeKey], dt: f32, moved: &mut HashMap<NodeKey, Vec3>) {
        for &key in bodies {
            let Some((body, position, orientation)) = self.scene.get_mut(key).and_then(|n| n.body_and_transform_mut())
            else {
                continue;
            };
            let displacement = body.integrate(position, orientation, dt);
            accumulate(moved, key, displacement);
        }
    }

    /// Carry non-physics descendants along with their body
    fn move_followers(&mut self, bodies: &[NodeKey], moved: &HashMap<NodeKey, Vec3>) {
        for key in bodies {
            let Some(&delta) = moved.get(key) else {
                continue;
            };
            for follower in self.scene.non_physics_descendants(*key) {
                if let Some(node) = self.scene.get_mut(follower) {
                    node.position += delta;
                }
            }
        }
    }

    /// Cast a ray against every solid collider and return the nearest hit
    ///
    /// Trigger volumes are ignored. Read-only.
    pub fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<(NodeKey, RaycastHit)> {
        let mut nearest: Option<(NodeKey, RaycastHit)> = None;
        for key in self.scene.nodes_with(NodeFlags::COLLIDER) {
            let Some(node) = self.scene.get(key) else {
                continue;
            };
            if node.collider().map_or(true, |c| c.is_trigger()) {
                continue;
            }
            let Some(triangles) = node.world_triangles() else {
                continue;
            };
            if let Some(hit) = raycast_triangles(origin, direction, &triangles, max_distance) {
                if nearest.as_ref().map_or(true, |(_, best)| hit.distance < best.distance) {
                    nearest = Some((key, hit));
                }
            }
        }
        nearest
    }
}

fn accumulate(moved: &mut HashMap<NodeKey, Vec3>, key: NodeKey, delta: Vec3) {
    if delta != Vec3::ZERO {
        *moved.entry(key).or_insert(Vec3::ZERO) += delta;
    }
}
