//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ConnectorConfig;
use crate::config::validation::{validate_bind_address, validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ConnectorConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config = parse_config(&content)?;

    tracing::debug!(path = ?path, "Configuration file loaded");
    Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ConnectorConfig, ConfigError> {
    let config: ConnectorConfig = toml::from_str(content).map_err(ConfigError::Parse)?;

    let mut errors = validate_config(&config).err().unwrap_or_default();
    if let Err(e) = validate_bind_address(&config) {
        errors.push(e);
    }
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors));
    }

    Ok(config)
}
