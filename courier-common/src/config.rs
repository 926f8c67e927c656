//! Configuration for the courier sender.
//!
//! ```toml
//! [resilience]
//! enabled = true
//! retries = 3
//! retry_delay_ms = 500
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "COURIER_CONFIG";

/// Configuration file looked up when [`CONFIG_ENV`] is not set.
pub const DEFAULT_CONFIG_PATH: &str = "./courier.toml";

const fn default_retries() -> u16 {
    3
}

/// Resilience (background retry) settings.
///
/// Fixed when a sender is constructed; there is no per-call override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Whether failed sends are handed to the background retry worker.
    ///
    /// Default: `false`
    #[serde(default)]
    pub enabled: bool,

    /// Retry budget given to a message after its first failure.
    ///
    /// Default: 3
    #[serde(default = "default_retries")]
    pub retries: u16,

    /// Pause taken by the worker after each retry attempt (in milliseconds).
    ///
    /// Default: 0 (no pause)
    #[serde(default)]
    pub retry_delay_ms: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            retries: default_retries(),
            retry_delay_ms: 0,
        }
    }
}

impl ResilienceConfig {
    /// Resilience switched on with the given budget and delay.
    #[must_use]
    pub fn enabled(retries: u16, retry_delay: Duration) -> Self {
        Self {
            enabled: true,
            retries,
            retry_delay_ms: u64::try_from(retry_delay.as_millis()).unwrap_or(u64::MAX),
        }
    }

    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourierConfig {
    #[serde(default)]
    pub resilience: ResilienceConfig,
}

impl CourierConfig {
    ///
    /// Parse configuration from a TOML document
    ///
    /// # Errors
    /// If the document is not valid TOML or has fields of the wrong type
    ///
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    ///
    /// Read and parse the configuration file at `path`
    ///
    /// # Errors
    /// If the file cannot be read or parsed
    ///
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&content)
    }

    ///
    /// Locate and load the configuration using the following precedence:
    /// 1. `COURIER_CONFIG` environment variable
    /// 2. `./courier.toml`
    /// 3. built-in defaults
    ///
    /// # Errors
    /// If `COURIER_CONFIG` names a missing file, or the file found cannot be parsed
    ///
    pub fn discover() -> Result<Self, ConfigError> {
        Self::discover_from(std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
    }

    fn discover_from(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::Invalid {
                    field: CONFIG_ENV.to_string(),
                    reason: format!("points to non-existent file: {}", path.display()),
                });
            }
            return Self::load(path);
        }

        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            Self::load(default_path)
        } else {
            Ok(Self::default())
        }
    }
}
