//! Configuration loading from disk, environment and command line.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable holding the upstream target URL.
pub const TARGET_ENV: &str = "TARGET";

/// Environment variable holding the listen port.
pub const PORT_ENV: &str = "PORT";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value {value:?} for {name}")]
    Env { name: &'static str, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Values that replace whatever the file (or the defaults) said.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub target: Option<String>,
    pub port: Option<u16>,
}

impl Overrides {
    /// Read `TARGET` and `PORT` through `lookup`.
    pub fn from_env<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup(PORT_ENV) {
            Some(value) => Some(value.trim().parse::<u16>().map_err(|_| ConfigError::Env {
                name: PORT_ENV,
                value,
            })?),
            None => None,
        };

        Ok(Self {
            target: lookup(TARGET_ENV),
            port,
        })
    }

    pub fn apply(&self, config: &mut ProxyConfig) {
        if let Some(target) = &self.target {
            config.upstream.target = target.clone();
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
    }
}

/// Parse a TOML config without validating it.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Build the effective configuration.
///
/// Starts from `path` (or the defaults), applies `overrides` in order, then
/// validates the result.
pub fn load_config(path: Option<&Path>, overrides: &[Overrides]) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => ProxyConfig::default(),
    };

    for layer in overrides {
        layer.apply(&mut config);
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
