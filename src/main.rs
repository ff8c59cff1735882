//! Boxworld - headless rigid body demo
//!
//! Builds a small scene, runs a fixed number of ticks without wall-clock
//! pacing and logs where every body came to rest.

use std::error::Error;

use boxworld::config::AppConfig;
use boxworld_core::{
    Behavior, Collider, Component, HookContext, HookResult, Joint, Node, NodeKey, RigidBody, Scene, SceneError, Vec3,
    World,
};

/// Logs every body that falls into the volume it is attached to
struct Sensor {
    entered: usize,
}

impl Behavior for Sensor {
    fn on_trigger_enter(&mut self, ctx: &mut HookContext<'_>, other: NodeKey) -> HookResult {
        self.entered += 1;
        let other = ctx.scene.get(other).map(|n| n.name.as_str()).unwrap_or("?");
        log::info!("sensor: '{}' entered ({} so far)", other, self.entered);
        Ok(())
    }
}

/// Logs each node its owner starts touching
struct LandingReporter;

impl Behavior for LandingReporter {
    fn on_collision_enter(&mut self, ctx: &mut HookContext<'_>, other: NodeKey) -> HookResult {
        let me = ctx.node().map(|n| n.name.clone()).unwrap_or_default();
        let other = ctx.scene.get(other).map(|n| n.name.clone()).unwrap_or_default();
        log::info!("'{}' touched '{}'", me, other);
        Ok(())
    }
}

/// Adds a box with a rigid body and a collider under `parent`
fn spawn_box(scene: &mut Scene, parent: NodeKey, node: Node, body: RigidBody) -> Result<NodeKey, SceneError> {
    let key = scene.add_child(parent, node)?;
    scene.add_component(key, body)?;
    scene.add_component(key, Collider::new(Vec3::ONE))?;
    Ok(key)
}

fn build_demo_scene(scene: &mut Scene) -> Result<(), SceneError> {
    let root = scene.add_root(Node::new("demo"));

    spawn_box(
        scene,
        root,
        Node::new("floor")
            .with_position(Vec3::new(0.0, -0.5, 0.0))
            .with_size(Vec3::new(20.0, 1.0, 20.0)),
        RigidBody::new_kinematic().with_material("Concrete"),
    )?;

    let dropped = spawn_box(
        scene,
        root,
        Node::new("dropped").with_position(Vec3::new(0.0, 4.0, 0.0)),
        RigidBody::new(1.0).with_restitution(0.2),
    )?;
    scene.add_component(dropped, Component::behavior(LandingReporter))?;

    spawn_box(
        scene,
        root,
        Node::new("stacked").with_position(Vec3::new(0.0, 6.0, 0.0)),
        RigidBody::new(1.0).with_restitution(0.0).with_material("Wood"),
    )?;

    // A rubber block dragging a smaller weight at a fixed offset
    let tug = spawn_box(
        scene,
        root,
        Node::new("tug").with_position(Vec3::new(4.0, 0.5, 0.0)),
        RigidBody::new(2.0).with_material("Rubber").with_velocity(Vec3::new(2.0, 0.0, 0.0)),
    )?;
    let weight = spawn_box(
        scene,
        root,
        Node::new("weight")
            .with_position(Vec3::new(2.0, 0.25, 0.0))
            .with_size(Vec3::splat(0.5)),
        RigidBody::new(0.5),
    )?;
    scene.add_component(tug, Joint::fixed(weight))?;

    let sensor = scene.add_child(
        root,
        Node::new("sensor")
            .with_position(Vec3::new(0.0, 2.0, 0.0))
            .with_size(Vec3::new(3.0, 0.5, 3.0)),
    )?;
    scene.add_component(sensor, RigidBody::new_kinematic())?;
    scene.add_component(sensor, Collider::trigger(Vec3::ONE))?;
    scene.add_component(sensor, Component::behavior(Sensor { entered: 0 }))?;
    // A marker riding on the dropped box
    scene.add_child(dropped, Node::new("marker").with_position(Vec3::new(0.0, 4.6, 0.0)))?;

    scene.set_default_position(root);
    Ok(())
}

fn report(world: &World) {
    let scene = world.scene();
    for key in scene.physics_nodes() {
        let Some(node) = scene.get(key) else {
            continue;
        };
        let Some(body) = node.rigid_body() else {
            continue;
        };
        if body.is_kinematic {
            continue;
        }
        let p = node.position;
        let r = node.rotation();
        log::info!(
            "{:>8}: position ({:.3}, {:.3}, {:.3}) rotation ({:.1}, {:.1}, {:.1}) speed {:.4}",
            node.name,
            p.x,
            p.y,
            p.z,
            r.x,
            r.y,
            r.z,
            body.velocity.length()
        );
    }
    if let Some(marker) = scene.find("marker").and_then(|k| scene.get(k)) {
        log::info!("  marker: height {:.3}", marker.position.y);
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let (config, config_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.debug.log_level.as_str())).init();
    if let Some(e) = config_error {
        log::warn!("Failed to load config: {}. Using defaults.", e);
    }
    log::info!("Starting Boxworld");

    let mut world = World::new(config.physics.to_physics_config());
    build_demo_scene(world.scene_mut())?;
    log::info!("Scene ready with {} nodes", world.scene().len());

    world.start();

    let sim = &config.simulation;
    let mut contacts = 0;
    for tick in 0..sim.ticks {
        let stats = world.update(sim.dt, sim.runs_scripts(tick));
        contacts += stats.contacts;
    }
    log::info!(
        "Ran {} ticks of {:.4}s ({} contact points in total)",
        world.ticks(),
        sim.dt,
        contacts
    );

    report(&world);
    Ok(())
}
