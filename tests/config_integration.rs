//! Integration tests for configuration loading
//!
//! Tests that verify config loading from files and environment variables.

use std::fs;
use std::path::PathBuf;

use boxworld::config::AppConfig;
use boxworld_core::{Collider, Node, RigidBody, Vec3, World};
use serial_test::serial;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("boxworld-config-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
#[serial]
fn test_repository_defaults_load() {
    let config = AppConfig::load().unwrap();
    assert_eq!(config.physics.gravity, [0.0, -9.8, 0.0]);
    assert!(config.simulation.dt > 0.0);
    assert!(config
        .physics
        .friction
        .iter()
        .any(|entry| entry.a == "Wood" && entry.b == "Concrete"));
}

#[test]
#[serial]
fn test_env_override() {
    std::env::set_var("BW_SIMULATION__TICKS", "42");
    std::env::set_var("BW_DEBUG__LOG_LEVEL", "trace");
    let config = AppConfig::load();
    std::env::remove_var("BW_SIMULATION__TICKS");
    std::env::remove_var("BW_DEBUG__LOG_LEVEL");

    let config = config.unwrap();
    assert_eq!(config.simulation.ticks, 42);
    assert_eq!(config.debug.log_level, "trace");
}

#[test]
#[serial]
fn test_user_file_overrides_default() {
    let dir = scratch_dir("user");
    fs::write(dir.join("default.toml"), "[physics]\nresting_speed = 0.05\ncorrection_factor = 0.2\n").unwrap();
    fs::write(dir.join("user.toml"), "[physics]\ncorrection_factor = 0.4\n").unwrap();

    let config = AppConfig::load_from(&dir).unwrap();
    assert_eq!(config.physics.correction_factor, 0.4);
    assert_eq!(config.physics.resting_speed, 0.05);
    // Missing sections fall back to defaults
    assert_eq!(config.simulation.script_refresh, 1);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
#[serial]
fn test_missing_directory_uses_defaults() {
    let config = AppConfig::load_from("does/not/exist").unwrap();
    let solver = config.physics.to_physics_config();
    assert_eq!(solver.correction_slop, 0.005);
    assert_eq!(solver.friction.get("Rubber", "Concrete"), Some(0.9));
}

#[test]
#[serial]
fn test_malformed_value_is_an_error() {
    let dir = scratch_dir("malformed");
    fs::write(dir.join("default.toml"), "[simulation]\nticks = \"lots\"\n").unwrap();

    let err = AppConfig::load_from(&dir).unwrap_err();
    assert!(err.to_string().starts_with("Configuration error"));

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
#[serial]
fn test_friction_from_config_file() {
    let dir = scratch_dir("friction");
    fs::write(
        dir.join("default.toml"),
        "[physics]\ndefault_friction = 0.5\n\n[[physics.friction]]\na = \"Ice\"\nb = \"Steel\"\ncoefficient = 0.0\n",
    )
    .unwrap();
    let config = AppConfig::load_from(&dir).unwrap();
    fs::remove_dir_all(&dir).unwrap();

    let solver = config.physics.to_physics_config();
    let rubber = RigidBody::new(1.0).with_material("Rubber");
    let concrete = RigidBody::new_kinematic().with_material("Concrete");
    let gold = RigidBody::new(1.0).with_material("Gold");
    // Built-in pairs still apply when the fallback changes
    assert_eq!(solver.friction.coefficient(&rubber, &concrete), 0.9);
    assert_eq!(solver.friction.coefficient(&gold, &concrete), 0.5);

    // A frictionless pair keeps a steel box sliding across ice
    let mut world = World::new(solver);
    let scene = world.scene_mut();
    let rink = scene.add_root(
        Node::new("rink")
            .with_position(Vec3::new(0.0, -0.5, 0.0))
            .with_size(Vec3::new(20.0, 1.0, 20.0)),
    );
    scene.add_component(rink, RigidBody::new_kinematic().with_material("Ice")).unwrap();
    scene.add_component(rink, Collider::new(Vec3::ONE)).unwrap();
    let puck = scene.add_root(Node::new("puck").with_position(Vec3::new(0.0, 0.5, 0.0)));
    scene
        .add_component(puck, RigidBody::new(1.0).with_restitution(0.0).with_velocity(Vec3::new(1.0, 0.0, 0.0)))
        .unwrap();
    scene.add_component(puck, Collider::new(Vec3::ONE)).unwrap();

    for _ in 0..60 {
        world.update(config.simulation.dt, true);
    }
    let node = world.scene().get(puck).unwrap();
    let speed = node.rigid_body().map(|b| b.velocity.x).unwrap();
    assert!((speed - 1.0).abs() < 1e-3, "puck lost speed: {}", speed);
    assert!((node.position.y - 0.5).abs() < 0.02);
}

#[test]
fn test_round_trip_through_toml() {
    let config = AppConfig::default();
    let text = toml::to_string(&config).unwrap();
    let parsed: AppConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed.simulation.ticks, config.simulation.ticks);
    assert_eq!(parsed.physics.gravity, config.physics.gravity);
}
