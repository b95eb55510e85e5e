// src/config.rs
//! Tunables for the demo, loadable from JSON.
//!
//! Every default matches the values the demo ships with; a config file only needs the fields it
//! wants to change (`#[serde(default)]` on every section).

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::ensure;
use crate::error::{Error, Result};

/// Environment variable naming an optional JSON config file.
pub const CONFIG_ENV_VAR: &str = "ANCHOR_DROP_CONFIG";

/// Global simulation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsSettings {
    pub gravity: [f32; 3],
    /// Nominal internal step (seconds).
    pub fixed_step: f32,
    /// Upper bound on internal steps per tick. Lag beyond this is dropped.
    pub max_sub_steps: u32,
    pub allow_sleep: bool,
    /// Contact rule for any pair without a more specific material pairing.
    pub default_friction: f32,
    pub default_restitution: f32,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.82, 0.0],
            fixed_step: 1.0 / 60.0,
            max_sub_steps: 3,
            allow_sleep: true,
            default_friction: 0.1,
            default_restitution: 0.3,
        }
    }
}

impl PhysicsSettings {
    pub fn gravity(&self) -> Vec3 {
        Vec3::from(self.gravity)
    }
}

/// Spawn cadence and the random shape policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnSettings {
    /// Seconds between spawns while spawning is active.
    pub interval: f32,
    /// Seconds a spawned body lives before it is disposed.
    pub lifetime: f32,
    pub mass: f32,
    /// Height above the ground new bodies start at.
    pub drop_height: f32,
    /// Each scale component is `(random() + scale_bias) * scale_factor`.
    pub scale_bias: f32,
    pub scale_factor: f32,
    /// x is drawn from `random() + x_offset`, z from `random()`.
    pub x_offset: f32,
    pub roughness: f32,
    pub metalness: f32,
}

impl Default for SpawnSettings {
    fn default() -> Self {
        Self {
            interval: 0.25,
            lifetime: 2.0,
            mass: 5.0,
            drop_height: 5.0,
            scale_bias: 0.2,
            scale_factor: 0.5,
            x_offset: -0.2,
            roughness: 0.4,
            metalness: 0.3,
        }
    }
}

/// Where the preview anchor sits relative to the camera before placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorSettings {
    pub camera_offset: [f32; 3],
}

impl Default for AnchorSettings {
    fn default() -> Self {
        Self { camera_offset: [0.0, 0.0, -7.0] }
    }
}

impl AnchorSettings {
    pub fn camera_offset(&self) -> Vec3 {
        Vec3::from(self.camera_offset)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub physics: PhysicsSettings,
    pub spawn: SpawnSettings,
    pub anchor: AnchorSettings,
    /// Fixed RNG seed for reproducible runs; entropy when absent.
    pub seed: Option<u64>,
}

impl DemoConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: DemoConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Config from `ANCHOR_DROP_CONFIG` if set, defaults otherwise.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => {
                log::info!("Loading config from {:?}", path);
                Self::load(path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.physics;
        ensure!(
            p.fixed_step > 0.0 && p.fixed_step.is_finite(),
            Error::config(format!("physics.fixed_step must be positive, got {}", p.fixed_step))
        );
        ensure!(p.max_sub_steps > 0, Error::config("physics.max_sub_steps must be at least 1"));
        ensure!(
            p.default_friction >= 0.0 && p.default_restitution >= 0.0,
            Error::config("physics contact rule must be non-negative")
        );

        let s = &self.spawn;
        ensure!(s.interval > 0.0, Error::config(format!("spawn.interval must be positive, got {}", s.interval)));
        ensure!(s.lifetime > 0.0, Error::config(format!("spawn.lifetime must be positive, got {}", s.lifetime)));
        ensure!(s.mass > 0.0, Error::config(format!("spawn.mass must be positive, got {}", s.mass)));
        ensure!(
            s.scale_factor > 0.0 && s.scale_bias >= 0.0,
            Error::config("spawn scale policy must produce positive sizes")
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipping_values() {
        let cfg = DemoConfig::default();
        assert_eq!(cfg.physics.gravity(), Vec3::new(0.0, -9.82, 0.0));
        assert_eq!(cfg.physics.max_sub_steps, 3);
        assert_eq!(cfg.physics.default_friction, 0.1);
        assert_eq!(cfg.physics.default_restitution, 0.3);
        assert_eq!(cfg.spawn.interval, 0.25);
        assert_eq!(cfg.spawn.lifetime, 2.0);
        assert_eq!(cfg.anchor.camera_offset(), Vec3::new(0.0, 0.0, -7.0));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let cfg = DemoConfig::from_json_str(r#"{ "spawn": { "interval": 0.5 }, "seed": 7 }"#).unwrap();
        assert_eq!(cfg.spawn.interval, 0.5);
        assert_eq!(cfg.spawn.lifetime, 2.0);
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.physics, PhysicsSettings::default());
    }

    #[test]
    fn rejects_non_positive_interval() {
        let err = DemoConfig::from_json_str(r#"{ "spawn": { "interval": 0.0 } }"#).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn rejects_zero_sub_steps() {
        let err = DemoConfig::from_json_str(r#"{ "physics": { "max_sub_steps": 0 } }"#).unwrap_err();
        assert!(err.to_string().contains("max_sub_steps"));
    }

    #[test]
    fn every_failed_check_is_a_config_error() {
        let bad = [
            r#"{ "physics": { "fixed_step": -0.1 } }"#,
            r#"{ "physics": { "default_restitution": -1.0 } }"#,
            r#"{ "spawn": { "lifetime": 0.0 } }"#,
            r#"{ "spawn": { "mass": -5.0 } }"#,
            r#"{ "spawn": { "scale_factor": 0.0 } }"#,
        ];
        for raw in bad {
            let err = DemoConfig::from_json_str(raw).unwrap_err();
            assert!(err.is_config(), "{} gave {:?}", raw, err);
        }
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(DemoConfig::from_json_str("{ not json").unwrap_err().is_config());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.json");
        std::fs::write(&path, r#"{ "anchor": { "camera_offset": [0.0, -1.0, -4.0] } }"#).unwrap();
        let cfg = DemoConfig::load(&path).unwrap();
        assert_eq!(cfg.anchor.camera_offset(), Vec3::new(0.0, -1.0, -4.0));
    }
}
