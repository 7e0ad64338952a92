//! Configuration loaded from `flowstate.toml`.
//!
//! [`FlowstateConfig`] holds every tunable. Missing keys fall back to
//! defaults. The `FLOWSTATE_LOG` environment variable takes precedence over
//! the file's log filter.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::actions::HttpDefaults;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "flowstate.toml";

/// Environment variable overriding `log.level`.
pub const LOG_ENV: &str = "FLOWSTATE_LOG";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlowstateConfig {
    #[serde(default)]
    pub log: LogConfig,

    /// Defaults for every `http_request` action.
    #[serde(default)]
    pub http: HttpDefaults,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `info` or `flowstate=debug`.
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

impl FlowstateConfig {
    /// Load from `path`, or from `flowstate.toml` in the working directory.
    ///
    /// An explicit path must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_log_override(std::env::var(LOG_ENV).ok());
        Ok(config)
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).context("invalid configuration")
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        Self::from_toml_str(&contents).with_context(|| format!("in {}", path.display()))
    }

    fn apply_log_override(&mut self, value: Option<String>) {
        if let Some(level) = value.filter(|v| !v.trim().is_empty()) {
            self.log.level = level;
        }
    }
}
