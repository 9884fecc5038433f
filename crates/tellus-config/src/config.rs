//! Terrain tuning parameters with sensible defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tuning parameters for the globe terrain mesh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    /// Minimum leaf generation; the tree is driven down to at least this
    /// depth everywhere at construction and after every update pass.
    pub min_generations: u32,
    /// Maximum leaf generation; no split ever exceeds this depth.
    pub max_generations: u32,
    /// Projected size, in pixels, above which an in-view triangle splits.
    pub split_pixel_threshold: f64,
    /// Hysteresis between split and merge: a node only merges if it would
    /// not re-split even with its view size scaled by this factor.
    pub merge_hysteresis: f64,
    /// View-driven splitting stops beyond this absolute latitude, degrees,
    /// bounding triangle explosion near the poles.
    pub polar_split_limit_deg: f64,
    /// A petrifying provider's bounding box is quartered until the quadrant
    /// diagonal divided by the provider resolution drops below this factor.
    pub petrify_quarter_factor: f64,
    /// Fallback minimum-variance threshold for nodes spanning multiple
    /// providers (normalized midpoint plane distance).
    pub default_min_variance: f64,
    /// Fallback resolution hint, meters, for nodes with no provider.
    pub default_resolution_hint_m: f64,
    /// Build petrified vertex blocks around the region's own local origin
    /// instead of the global origin, trading a transform for precision.
    pub high_accuracy_blocks: bool,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            min_generations: 4,
            max_generations: 30,
            split_pixel_threshold: 160.0,
            merge_hysteresis: 1.5,
            polar_split_limit_deg: 75.0,
            petrify_quarter_factor: 500.0,
            default_min_variance: 0.002,
            default_resolution_hint_m: f64::MAX,
            high_accuracy_blocks: false,
        }
    }
}

impl TerrainConfig {
    /// Load configuration from a RON file.
    pub fn from_ron_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        let config: Self = ron::from_str(&text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a RON file, pretty-printed.
    pub fn to_ron_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(ConfigError::Serialize)?;
        std::fs::write(path, text).map_err(ConfigError::Write)
    }

    /// Reject parameter combinations the mesh cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_generations < 1 {
            return Err(ConfigError::Invalid(
                "min_generations must be at least 1 (the base pole split)".into(),
            ));
        }
        if self.max_generations < self.min_generations {
            return Err(ConfigError::Invalid(format!(
                "max_generations ({}) below min_generations ({})",
                self.max_generations, self.min_generations
            )));
        }
        if self.merge_hysteresis < 1.0 {
            return Err(ConfigError::Invalid(
                "merge_hysteresis below 1.0 would oscillate".into(),
            ));
        }
        if !(self.split_pixel_threshold > 0.0) {
            return Err(ConfigError::Invalid(
                "split_pixel_threshold must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TerrainConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.merge_hysteresis, 1.5);
        assert_eq!(config.polar_split_limit_deg, 75.0);
        assert_eq!(config.petrify_quarter_factor, 500.0);
    }

    #[test]
    fn test_ron_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terrain.ron");

        let mut config = TerrainConfig::default();
        config.min_generations = 2;
        config.split_pixel_threshold = 96.0;
        config.to_ron_file(&path).unwrap();

        let loaded = TerrainConfig::from_ron_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: TerrainConfig = ron::from_str("(min_generations: 2)").unwrap();
        assert_eq!(config.min_generations, 2);
        assert_eq!(
            config.max_generations,
            TerrainConfig::default().max_generations
        );
    }

    #[test]
    fn test_invalid_generation_order_rejected() {
        let mut config = TerrainConfig::default();
        config.max_generations = 2;
        config.min_generations = 5;
        assert!(config.validate().is_err());
    }
}
