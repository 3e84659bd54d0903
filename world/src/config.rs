//! Declarative world setup loaded from TOML.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wanderers_core::Bounds;
use wanderers_pathfinding::PathfinderConfig;
use wanderers_system_behavior::BehaviorConfig;

/// Errors raised while loading or validating a [`WorldConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// World dimensions must be positive and finite.
    #[error("world dimensions must be positive and finite, got {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: f64,
        /// Requested height.
        height: f64,
    },
    /// Spatial cell size must be positive and finite.
    #[error("spatial cell size must be positive and finite, got {0}")]
    InvalidCellSize(f64),
    /// Pathfinding step must be positive and finite.
    #[error("pathfinder step must be positive and finite, got {0}")]
    InvalidStep(f64),
    /// The TOML document could not be parsed.
    #[error("failed to parse world configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Rectangular obstacle as written in a configuration file.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObstacleConfig {
    /// Smallest X coordinate.
    pub min_x: f64,
    /// Smallest Z coordinate.
    pub min_z: f64,
    /// Largest X coordinate.
    pub max_x: f64,
    /// Largest Z coordinate.
    pub max_z: f64,
}

impl ObstacleConfig {
    /// Rectangle covered by the obstacle.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.min_x, self.min_z, self.max_x, self.max_z)
    }
}

/// Everything needed to build a [`World`](crate::World).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Arena width.
    pub width: f64,
    /// Arena height.
    pub height: f64,
    /// World seed; per-agent random streams derive from it.
    pub seed: i64,
    /// Agents spawned when the world is built.
    pub agents: usize,
    /// Side of a spatial index cell.
    pub spatial_cell_size: f64,
    /// Runs agent updates on the rayon pool when set.
    pub parallel: bool,
    /// Static obstacles inserted before the first tick.
    pub obstacles: Vec<ObstacleConfig>,
    /// Wandering behavior tuning.
    pub behavior: BehaviorConfig,
    /// A* tuning.
    pub pathfinder: PathfinderConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 100.0,
            height: 100.0,
            seed: 42,
            agents: 100,
            spatial_cell_size: 1.0,
            parallel: true,
            obstacles: Vec::new(),
            behavior: BehaviorConfig::default(),
            pathfinder: PathfinderConfig::default(),
        }
    }
}

impl WorldConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the numeric parameters the engine cannot operate without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dimension_ok = |value: f64| value.is_finite() && value > 0.0;

        if !dimension_ok(self.width) || !dimension_ok(self.height) {
            return Err(ConfigError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if !dimension_ok(self.spatial_cell_size) {
            return Err(ConfigError::InvalidCellSize(self.spatial_cell_size));
        }
        if !dimension_ok(self.pathfinder.step) {
            return Err(ConfigError::InvalidStep(self.pathfinder.step));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = WorldConfig::from_toml_str("").expect("defaults");
        assert_eq!(config, WorldConfig::default());
    }

    #[test]
    fn nested_tables_override_defaults() {
        let config = WorldConfig::from_toml_str(
            r#"
            width = 50.0
            height = 40.0
            seed = -3
            agents = 5

            [[obstacles]]
            min_x = 10.0
            min_z = 10.0
            max_x = 20.0
            max_z = 20.0

            [behavior]
            stuck_threshold = 20

            [pathfinder]
            step = 1.0
            "#,
        )
        .expect("valid configuration");

        assert_eq!(config.seed, -3);
        assert_eq!(config.obstacles.len(), 1);
        assert_eq!(config.obstacles[0].bounds(), Bounds::new(10.0, 10.0, 20.0, 20.0));
        assert_eq!(config.behavior.stuck_threshold, 20);
        assert_eq!(config.behavior.reach_distance, 0.5);
        assert_eq!(config.pathfinder.step, 1.0);
        assert_eq!(config.pathfinder.max_expansions, 1_000);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let error = WorldConfig::from_toml_str("wdith = 10.0").expect_err("typo");
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        assert!(matches!(
            WorldConfig::from_toml_str("width = 0.0"),
            Err(ConfigError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            WorldConfig::from_toml_str("spatial_cell_size = -1.0"),
            Err(ConfigError::InvalidCellSize(_))
        ));
        assert!(matches!(
            WorldConfig::from_toml_str("[pathfinder]\nstep = 0.0"),
            Err(ConfigError::InvalidStep(_))
        ));
    }
}
