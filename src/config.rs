//! Runtime configuration for cascades.
//!
//! Values come from an optional TOML file; anything missing falls back to the
//! defaults below. Command-line flags are applied on top by the binary.
//!
//! ```toml
//! batch_size = 500
//! page_size = 2000
//! dry_run = false
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{batch::DEFAULT_BATCH_SIZE, errors::ConfigError};

pub const DEFAULT_PAGE_SIZE: usize = 5000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CascadeConfig {
    /// Maximum ids per bulk delete request.
    pub batch_size: usize,
    /// Rows fetched per page when looking up dependent records.
    pub page_size: usize,
    /// Simulate deletes instead of executing them.
    pub dry_run: bool,
    pub logging: LoggingConfig,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            dry_run: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl CascadeConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: CascadeConfig =
            toml::from_str(input).map_err(|e| ConfigError::parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size must be at least 1"));
        }
        if self.page_size == 0 {
            return Err(ConfigError::invalid("page_size must be at least 1"));
        }
        self.logging.validate()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `cascade_delete=debug`.
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(ConfigError::invalid(format!(
                "unknown log format {other}, expected pretty or json"
            ))),
        }
    }
}
