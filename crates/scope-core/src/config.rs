//! Sampler configuration
//!
//! Loaded from TOML or built in code with `with_*` methods. Missing fields
//! take their defaults, so an empty file is a valid configuration.

use crate::types::Category;
use indexmap::IndexMap;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that failed
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for [`SamplerConfig`]
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parse but make no sense
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Extra diagnostics during goal filtering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugMode {
    /// No extra sampling
    #[default]
    Off,
    /// Re-sample emptied roles against their unfiltered candidates and log why
    Verbose,
}

/// Placement search parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Trials per placement call
    pub max_trials: usize,
    /// Lift above the sampled surface point before the collision check
    pub z_offset: f64,
    /// Simulated seconds of free fall after a successful placement
    pub settle_duration_secs: f64,
    /// Where the object waits while surfaces are sampled
    pub parking_position: Vector3<f64>,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            max_trials: 100,
            z_offset: 0.01,
            settle_duration_secs: 0.1,
            parking_position: Vector3::new(100.0, 100.0, 100.0),
        }
    }
}

/// How sampleable roles get their objects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstantiationPolicy {
    /// Concrete category to prefer when a taxonomy node expands to several
    pub preferred_categories: Vec<Category>,
    /// Model to use for a concrete category when importing
    pub pinned_models: IndexMap<Category, String>,
    /// Position of the first imported object; later ones step along x
    pub spawn_origin: Vector3<f64>,
}

impl Default for InstantiationPolicy {
    fn default() -> Self {
        Self {
            preferred_categories: vec![Category::new("pop")],
            pinned_models: IndexMap::from([(Category::new("bag"), "bag_001".to_string())]),
            spawn_origin: Vector3::new(100.0, 100.0, -100.0),
        }
    }
}

/// Top-level configuration of a [`TaskSampler`](crate::controller::TaskSampler)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Goal-condition sets tried per attempt
    pub max_goal_condition_sets: usize,
    /// Trials per non-sampleable condition during final enforcement
    pub max_resample_trials: usize,
    /// Placement search
    pub placement: PlacementConfig,
    /// Diagnostics
    pub debug: DebugMode,
    /// Sampleable roles
    pub instantiation: InstantiationPolicy,
    /// Seed for callers that build their own rng from the config
    pub seed: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            max_goal_condition_sets: 10,
            max_resample_trials: 10,
            placement: PlacementConfig::default(),
            debug: DebugMode::Off,
            instantiation: InstantiationPolicy::default(),
            seed: None,
        }
    }
}

impl SamplerConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// `Parse` for malformed TOML, `Invalid` for zero budgets
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SamplerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// `Io` when the file cannot be read, otherwise as [`Self::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject budgets that would make every attempt fail
    ///
    /// # Errors
    /// `Invalid` naming the offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_goal_condition_sets == 0 {
            return Err(ConfigError::Invalid("max_goal_condition_sets must be > 0".into()));
        }
        if self.max_resample_trials == 0 {
            return Err(ConfigError::Invalid("max_resample_trials must be > 0".into()));
        }
        if self.placement.max_trials == 0 {
            return Err(ConfigError::Invalid("placement.max_trials must be > 0".into()));
        }
        if self.placement.settle_duration_secs < 0.0 {
            return Err(ConfigError::Invalid("placement.settle_duration_secs must be >= 0".into()));
        }
        Ok(())
    }

    /// With goal-set budget
    #[inline]
    #[must_use]
    pub fn with_max_goal_condition_sets(mut self, max: usize) -> Self {
        self.max_goal_condition_sets = max;
        self
    }

    /// With re-sample budget
    #[inline]
    #[must_use]
    pub fn with_max_resample_trials(mut self, max: usize) -> Self {
        self.max_resample_trials = max;
        self
    }

    /// With placement trial budget
    #[inline]
    #[must_use]
    pub fn with_placement_trials(mut self, max: usize) -> Self {
        self.placement.max_trials = max;
        self
    }

    /// With settle duration; zero disables settling
    #[inline]
    #[must_use]
    pub fn with_settle_duration(mut self, secs: f64) -> Self {
        self.placement.settle_duration_secs = secs;
        self
    }

    /// With debug mode
    #[inline]
    #[must_use]
    pub fn with_debug(mut self, debug: DebugMode) -> Self {
        self.debug = debug;
        self
    }

    /// With instantiation policy
    #[inline]
    #[must_use]
    pub fn with_instantiation(mut self, policy: InstantiationPolicy) -> Self {
        self.instantiation = policy;
        self
    }

    /// With seed
    #[inline]
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = SamplerConfig::from_toml_str("").unwrap();
        assert_eq!(config, SamplerConfig::default());
        assert_eq!(config.placement.max_trials, 100);
        assert_eq!(config.max_goal_condition_sets, 10);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = SamplerConfig::from_toml_str(
            r#"
            debug = "verbose"
            seed = 7

            [placement]
            max_trials = 20
            "#,
        )
        .unwrap();
        assert_eq!(config.debug, DebugMode::Verbose);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.placement.max_trials, 20);
        assert_eq!(config.placement.z_offset, 0.01);
    }

    #[test]
    fn zero_budget_is_rejected() {
        let err = SamplerConfig::from_toml_str("max_resample_trials = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
