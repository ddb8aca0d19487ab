//! Errors raised while loading or checking settings.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterGraphError {
    /// A config file or environment variable could not be read
    #[error("Failed to load configuration: {0}")]
    Source(#[from] config::ConfigError),

    /// Settings parsed but out of range
    #[error("Invalid configuration: {0}")]
    Config(String),
}
