//! Physics configuration

use crate::error::{PhysicsError, Result};
use crate::ownership::ParticipantId;
use serde::{Deserialize, Serialize};

/// Physics world configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravity vector (default: -9.81 in Y)
    pub gravity: [f32; 3],

    /// Fixed timestep of one simulation tick
    pub timestep: f32,

    /// Enable continuous collision detection
    pub ccd_enabled: bool,

    /// Default friction coefficient
    pub default_friction: f32,

    /// Default restitution (bounciness)
    pub default_restitution: f32,

    /// Solver iterations for velocity
    pub velocity_iterations: usize,

    /// Enable sleeping for inactive bodies
    pub sleeping_enabled: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.81, 0.0],
            timestep: 1.0 / 60.0,
            ccd_enabled: true,
            default_friction: 0.5,
            default_restitution: 0.0,
            velocity_iterations: 4,
            sleeping_enabled: true,
        }
    }
}

impl PhysicsConfig {
    /// Create a configuration for high-precision simulation
    pub fn high_precision() -> Self {
        Self {
            velocity_iterations: 8,
            ..Default::default()
        }
    }

    /// Create a configuration for fast simulation (lower quality)
    pub fn fast() -> Self {
        Self {
            velocity_iterations: 2,
            ccd_enabled: false,
            ..Default::default()
        }
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(source: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(source)
            .map_err(|e| PhysicsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot step with
    pub fn validate(&self) -> Result<()> {
        if !(self.timestep.is_finite() && self.timestep > 0.0) {
            return Err(PhysicsError::InvalidConfig(format!(
                "timestep must be positive and finite, got {}",
                self.timestep
            )));
        }
        if self.velocity_iterations == 0 {
            return Err(PhysicsError::InvalidConfig(
                "velocity_iterations must be at least 1".into(),
            ));
        }
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(PhysicsError::InvalidConfig("gravity must be finite".into()));
        }
        Ok(())
    }

    /// Set gravity
    pub fn with_gravity(mut self, x: f32, y: f32, z: f32) -> Self {
        self.gravity = [x, y, z];
        self
    }

    /// Set timestep
    pub fn with_timestep(mut self, timestep: f32) -> Self {
        self.timestep = timestep;
        self
    }
}

/// Per-session pipeline settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// The participant this process simulates for
    pub local_participant: ParticipantId,

    /// Editor mode: transforms drive every body instead of the simulation
    #[serde(default)]
    pub editor: bool,
}

impl PipelineConfig {
    pub fn new(local_participant: ParticipantId) -> Self {
        Self {
            local_participant,
            editor: false,
        }
    }

    pub fn with_editor(mut self, editor: bool) -> Self {
        self.editor = editor;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_fills_defaults() {
        let config = PhysicsConfig::from_json(r#"{ "gravity": [0.0, 0.0, 0.0] }"#).unwrap();
        assert_eq!(config.gravity, [0.0, 0.0, 0.0]);
        assert_eq!(config.timestep, PhysicsConfig::default().timestep);
    }

    #[test]
    fn test_invalid_timestep_rejected() {
        let err = PhysicsConfig::from_json(r#"{ "timestep": 0.0 }"#).unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidConfig(_)));

        assert!(PhysicsConfig::default().with_timestep(f32::NAN).validate().is_err());
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            PhysicsConfig::from_json("{ gravity"),
            Err(PhysicsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(PhysicsConfig::high_precision().validate().is_ok());
        assert!(PhysicsConfig::fast().validate().is_ok());
    }
}
