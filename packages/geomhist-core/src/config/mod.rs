//! Configuration System
//!
//! Defaults cover the common case; a versioned YAML file overrides them.
//!
//! # Examples
//!
//! ```rust,ignore
//! use geomhist_core::config::GeomhistConfig;
//!
//! // Defaults
//! let config = GeomhistConfig::default();
//!
//! // From YAML
//! let config = GeomhistConfig::from_yaml("geomhist.yaml")?;
//! ```
//!
//! ```yaml
//! version: 1
//! ingest:
//!   batch_size: 5000
//! detector:
//!   max_depth: 16
//!   cycle_policy: flag
//! ```

pub mod error;
pub mod stage_configs;
pub mod validation;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use error::{ConfigError, ConfigResult};
pub use stage_configs::{CyclePolicy, DetectorConfig, IngestConfig};
pub use validation::Validatable;

const SUPPORTED_VERSIONS: [u32; 1] = [1];

/// YAML Schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFileV1 {
    /// Schema version (always 1 for v1)
    version: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    ingest: Option<IngestConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    detector: Option<DetectorConfig>,
}

/// Complete run configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeomhistConfig {
    pub ingest: IngestConfig,
    pub detector: DetectorConfig,
}

impl GeomhistConfig {
    /// Load and validate a YAML configuration file
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate YAML text
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let file: ConfigFileV1 = serde_yaml::from_str(content)?;

        let version = file.version.ok_or(ConfigError::MissingVersion)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let config = Self {
            ingest: file.ingest.unwrap_or_default(),
            detector: file.detector.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional path, falling back to defaults
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => Self::from_yaml(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        let file = ConfigFileV1 {
            version: Some(1),
            ingest: Some(self.ingest.clone()),
            detector: Some(self.detector.clone()),
        };
        serde_yaml::to_string(&file).map_err(ConfigError::Yaml)
    }

    fn sections(&self) -> [&dyn Validatable; 2] {
        [&self.ingest, &self.detector]
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for section in self.sections() {
            section.validate()?;
            debug!("{} validated", section.config_name());
        }
        Ok(())
    }
}
