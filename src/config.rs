//! Application configuration
//!
//! Configuration is loaded from multiple sources with the following priority (lowest to highest):
//! 1. `config/default.toml` (version controlled)
//! 2. `config/user.toml` (gitignored, user overrides)
//! 3. Environment variables (`BW_SECTION__KEY`)

use boxworld_math::Vec3;
use boxworld_physics::{FrictionTable, PhysicsConfig as SolverConfig, DEFAULT_FRICTION};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Physics configuration
    #[serde(default)]
    pub physics: PhysicsConfig,
    /// Fixed-step simulation settings
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Debug configuration
    #[serde(default)]
    pub debug: DebugConfig,
}

impl AppConfig {
    /// Load configuration from default locations
    ///
    /// Priority (lowest to highest):
    /// 1. `config/default.toml`
    /// 2. `config/user.toml`
    /// 3. Environment variables (`BW_*`)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific config directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let default_path = config_dir.join("default.toml");
        let user_path = config_dir.join("user.toml");

        let mut figment = Figment::new();

        if default_path.exists() {
            figment = figment.merge(Toml::file(&default_path));
        }

        // Load user config (optional)
        if user_path.exists() {
            figment = figment.merge(Toml::file(&user_path));
        }

        // Environment variables override everything
        // BW_PHYSICS__RESTING_SPEED=0.1 -> physics.resting_speed = 0.1
        figment = figment.merge(Env::prefixed("BW_").split("__"));

        figment.extract().map_err(ConfigError::from)
    }
}

/// One entry of the material friction table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrictionEntry {
    pub a: String,
    pub b: String,
    pub coefficient: f32,
}

/// Physics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravity acceleration [x, y, z]
    pub gravity: [f32; 3],
    /// Approach speeds slower than this never bounce
    pub restitution_dead_zone: f32,
    /// Separation speed below which a contact counts as resting
    pub resting_speed: f32,
    /// Fraction of the penetration removed per tick
    pub correction_factor: f32,
    /// Penetration tolerated without correction
    pub correction_slop: f32,
    /// Friction for material pairs missing from the table
    pub default_friction: f32,
    /// Extra or replacement material pairs, applied over the built-in table
    pub friction: Vec<FrictionEntry>,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        let solver = SolverConfig::default();
        Self {
            gravity: solver.gravity.to_array(),
            restitution_dead_zone: solver.restitution_dead_zone,
            resting_speed: solver.resting_speed,
            correction_factor: solver.correction_factor,
            correction_slop: solver.correction_slop,
            default_friction: DEFAULT_FRICTION,
            friction: Vec::new(),
        }
    }
}

impl PhysicsConfig {
    /// Convert to the solver's settings
    pub fn to_physics_config(&self) -> SolverConfig {
        let mut friction = FrictionTable::default();
        friction.default_friction = self.default_friction;
        for entry in &self.friction {
            friction.insert(&entry.a, &entry.b, entry.coefficient);
        }

        let [x, y, z] = self.gravity;
        SolverConfig {
            gravity: Vec3::new(x, y, z),
            restitution_dead_zone: self.restitution_dead_zone,
            resting_speed: self.resting_speed,
            correction_factor: self.correction_factor,
            correction_slop: self.correction_slop,
            friction,
        }
    }
}

/// Fixed-step simulation settings for the demo run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Tick length in seconds
    pub dt: f32,
    /// Number of ticks to run
    pub ticks: u32,
    /// Run behavior update hooks every this many ticks
    pub script_refresh: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: 1.0 / 60.0,
            ticks: 600,
            script_refresh: 1,
        }
    }
}

impl SimulationConfig {
    /// Whether script hooks run on the given (zero-based) tick
    pub fn runs_scripts(&self, tick: u32) -> bool {
        self.script_refresh != 0 && tick % self.script_refresh == 0
    }
}

/// Debug configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Configuration error
#[derive(Debug)]
pub struct ConfigError {
    message: String,
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError {
            message: e.to_string(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use boxworld_physics::RigidBody;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.physics.gravity, [0.0, -9.8, 0.0]);
        assert_eq!(config.simulation.script_refresh, 1);
        assert_eq!(config.debug.log_level, "info");
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml = toml::to_string(&config).unwrap();
        assert!(toml.contains("gravity"));
        assert!(toml.contains("script_refresh"));
    }

    #[test]
    fn test_to_physics_config() {
        let mut physics = PhysicsConfig {
            gravity: [0.0, -20.0, 0.0],
            correction_factor: 0.5,
            ..PhysicsConfig::default()
        };
        physics.friction.push(FrictionEntry {
            a: "Ice".to_string(),
            b: "Steel".to_string(),
            coefficient: 0.05,
        });

        let solver = physics.to_physics_config();
        assert_eq!(solver.gravity, Vec3::new(0.0, -20.0, 0.0));
        assert_eq!(solver.correction_factor, 0.5);
        assert_eq!(solver.friction.get("Steel", "Ice"), Some(0.05));
        // Built-in pairs survive
        assert_eq!(solver.friction.get("Concrete", "Steel"), Some(0.6));

        let ice = RigidBody::new(1.0).with_material("Ice");
        let steel = RigidBody::new(1.0);
        assert_eq!(solver.friction.coefficient(&ice, &steel), 0.05);
    }

    #[test]
    fn test_default_friction_only_covers_unknown_pairs() {
        let physics = PhysicsConfig {
            default_friction: 0.5,
            ..PhysicsConfig::default()
        };
        let solver = physics.to_physics_config();

        let steel = RigidBody::new(1.0);
        let concrete = RigidBody::new_kinematic().with_material("Concrete");
        let glass = RigidBody::new(1.0).with_material("Glass");
        assert_eq!(solver.friction.coefficient(&steel, &concrete), 0.6);
        assert_eq!(solver.friction.coefficient(&glass, &concrete), 0.5);
    }

    #[test]
    fn test_runs_scripts() {
        let every_third = SimulationConfig {
            script_refresh: 3,
            ..SimulationConfig::default()
        };
        assert!(every_third.runs_scripts(0));
        assert!(!every_third.runs_scripts(1));
        assert!(every_third.runs_scripts(3));

        let never = SimulationConfig {
            script_refresh: 0,
            ..SimulationConfig::default()
        };
        assert!(!never.runs_scripts(0));
    }
}
