//! Engine configuration
//!
//! TOML-backed settings consumed by the application bootstrap. Mirrors the
//! process flags the authoring scripts accept: verbose logging, discrete-GPU
//! preference, and validation-layer toggling.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),
}

/// Engine-wide settings, all optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Emit per-stage compilation logs at debug level
    pub verbose_log: bool,

    /// Prefer a discrete GPU over an integrated one during device selection
    pub prefer_discrete_gpu: bool,

    /// Enable Vulkan validation layers
    pub enable_validation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verbose_log: false,
            prefer_discrete_gpu: false,
            enable_validation: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file is not an error: every setting has a default, so the
    /// config file is optional just like the original command-line flags.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config: EngineConfig = toml::from_str("verbose_log = true").unwrap();
        assert!(config.verbose_log);
        assert!(!config.prefer_discrete_gpu);
        assert!(config.enable_validation);
    }

    #[test]
    fn full_config_parses() {
        let config: EngineConfig = toml::from_str(
            "verbose_log = false\nprefer_discrete_gpu = true\nenable_validation = false\n",
        )
        .unwrap();
        assert!(config.prefer_discrete_gpu);
        assert!(!config.enable_validation);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = EngineConfig::load_from_file("does/not/exist.toml").unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
