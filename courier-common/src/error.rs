//! Error types for the courier-common crate.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration is not valid TOML or does not match the expected shape.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A configuration value is invalid.
    #[error("Invalid configuration for {field}: {reason}")]
    Invalid { field: String, reason: String },
}
