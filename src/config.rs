use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::adherence::AdherenceConfig;
use crate::burnout::BurnoutConfig;
use crate::error::HabitError;
use crate::features::FeatureConfig;
use crate::logging::LogConfig;
use crate::models::SimulationParams;
use crate::recommendation::RecommendationConfig;

/// Main engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default simulator parameters used when none are given
    pub simulator: SimulationParams,

    /// Rolling window and baseline settings for feature building
    pub features: FeatureConfig,

    /// Adherence classifier hyperparameters
    pub adherence: AdherenceConfig,

    /// Burnout event definition and survival model hyperparameters
    pub burnout: BurnoutConfig,

    /// Decision table and rationale thresholds
    pub recommendation: RecommendationConfig,

    /// Logging setup for the CLI
    pub logging: LogConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            simulator: SimulationParams::default(),
            features: FeatureConfig::default(),
            adherence: AdherenceConfig::default(),
            burnout: BurnoutConfig::default(),
            recommendation: RecommendationConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

/// Configuration management implementation
impl EngineConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: EngineConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".habitrs")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::debug!(
                    path = %config_path.display(),
                    error = %err,
                    "Config file not usable, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> std::result::Result<(), HabitError> {
        self.features.validate()?;
        self.adherence.validate()?;
        self.burnout.validate()?;
        self.recommendation.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: EngineConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [burnout]
            sleep_floor_minutes = 360.0
            "#,
        )
        .unwrap();

        assert_eq!(config.burnout.sleep_floor_minutes, 360.0);
        assert_eq!(config.burnout.steps_floor, BurnoutConfig::default().steps_floor);
        assert_eq!(config.features, FeatureConfig::default());
    }

    #[test]
    fn test_config_file_io() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original_config = EngineConfig::default();
        original_config.adherence.holdout_fraction = 0.25;

        original_config.save_to_file(&config_path).unwrap();
        let loaded_config = EngineConfig::load_from_file(&config_path).unwrap();

        assert_eq!(loaded_config.adherence.holdout_fraction, 0.25);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[adherence]\nholdout_fraction = 1.5\n").unwrap();

        assert!(EngineConfig::load_from_file(&config_path).is_err());
    }
}
