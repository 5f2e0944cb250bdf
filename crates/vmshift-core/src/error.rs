//! Configuration error types.

use thiserror::Error;

/// Result type alias for config loading and validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading or validating a `RebalanceConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}
