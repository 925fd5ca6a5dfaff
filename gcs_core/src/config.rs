//! Plugin manager configuration
//!
//! Loaded from a TOML file; every field is optional.
//!
//! ```toml
//! plugin_paths = ["/usr/lib/gcs/plugins", "~/.local/share/gcs/plugins"]
//! disabled_plugins = ["Welcome"]
//! enabled_experimental = ["HITL"]
//! hook_timeout_ms = 10000    # 0 runs hooks inline without a limit
//! required_plugins = ["Core"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default descriptor file extension
pub const DEFAULT_DESCRIPTOR_EXTENSION: &str = "pluginspec";

/// Default upper bound for a single hook call
pub const DEFAULT_HOOK_TIMEOUT_MS: u64 = 10_000;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML: {0}")]
    Parse(String),

    #[error("Failed to serialize TOML: {0}")]
    Serialize(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Plugin manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Directories scanned recursively for descriptors
    pub plugin_paths: Vec<PathBuf>,

    /// Descriptor file extension, without the dot
    pub descriptor_extension: String,

    /// Plugins kept at `Read`
    pub disabled_plugins: Vec<String>,

    /// Experimental plugins to enable
    pub enabled_experimental: Vec<String>,

    /// Upper bound for a single hook call; 0 runs hooks inline, unbounded
    pub hook_timeout_ms: u64,

    /// Time granted to asynchronous shutdowns
    pub shutdown_timeout_ms: u64,

    /// Plugins the host cannot run without
    pub required_plugins: Vec<String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            plugin_paths: Vec::new(),
            descriptor_extension: DEFAULT_DESCRIPTOR_EXTENSION.to_string(),
            disabled_plugins: Vec::new(),
            enabled_experimental: Vec::new(),
            hook_timeout_ms: DEFAULT_HOOK_TIMEOUT_MS,
            shutdown_timeout_ms: 5000,
            required_plugins: Vec::new(),
        }
    }
}

impl ManagerConfig {
    /// Load config from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse config from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.descriptor_extension.is_empty() {
            return Err(ConfigError::Invalid(
                "descriptor_extension must not be empty".to_string(),
            ));
        }
        if self.descriptor_extension.starts_with('.') {
            return Err(ConfigError::Invalid(format!(
                "descriptor_extension '{}' must not start with a dot",
                self.descriptor_extension
            )));
        }
        Ok(())
    }

    pub fn with_plugin_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.plugin_paths.push(path.into());
        self
    }

    /// `None` when hooks run inline
    pub fn hook_timeout(&self) -> Option<Duration> {
        match self.hook_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
