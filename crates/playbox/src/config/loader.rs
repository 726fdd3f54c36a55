//! Configuration file loading for Playbox
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, File, FileFormat};

use crate::config::{Config, ConfigError};

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.grace_ms == 0 {
            return Err(ConfigError::Invalid(
                "grace_ms must be at least 1".to_string(),
            ));
        }
        if self.default_limits.wall_time_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "default_limits.wall_time_ms must not be zero".to_string(),
            ));
        }
        if self.default_limits.memory_cap_bytes == Some(0) {
            return Err(ConfigError::Invalid(
                "default_limits.memory_cap_bytes must not be zero".to_string(),
            ));
        }
        Ok(())
    }
}
