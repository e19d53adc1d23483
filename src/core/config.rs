//! Story configuration: constant defaults, optional RON overrides.

use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A story's initial configuration surface.
pub trait StoryConfig: DeserializeOwned + Default {
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Parse and validate a configuration from a RON string.
pub fn parse_ron<T: StoryConfig>(input: &str) -> Result<T, ConfigError> {
    let config: T = ron::from_str(input)?;
    config.validate()?;
    Ok(config)
}

/// Load and validate a configuration from a RON file.
pub fn load_ron<T: StoryConfig>(path: &Path) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_ron(&contents)
}

/// Reject a parameter outside `[min, max]`.
pub fn ensure_range(name: &str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{} = {} outside [{}, {}]",
            name, value, min, max
        )))
    }
}

pub fn ensure(condition: bool, message: &str) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::Invalid(message.to_string()))
    }
}
