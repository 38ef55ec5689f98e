//! Error types for configuration loading and connectors.
//!
//! None of these escape the store boundary: every loading stage logs its own
//! failures and continues. They exist so each stage can report *what* went
//! wrong before the store decides to skip it.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures raised while reading configuration sources.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Tier directory does not exist
    #[error("config directory does not exist: {}", path.display())]
    MissingDirectory { path: PathBuf },

    /// A directory or file could not be read
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File content is not valid JSON/YAML
    #[error("failed to parse '{}': {details}", path.display())]
    Parse { path: PathBuf, details: String },

    /// A connector failed during init or refresh
    #[error("connector '{name}' failed: {source}")]
    Connector {
        name: String,
        #[source]
        source: ConnectorError,
    },

    /// File watcher could not be started
    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),
}

impl ConfigError {
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, details: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.into(),
            details: details.to_string(),
        }
    }

    pub fn connector(name: impl Into<String>, source: ConnectorError) -> Self {
        Self::Connector {
            name: name.into(),
            source,
        }
    }
}

/// Failures reported by a [`Connector`](crate::config::Connector).
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The connector did not answer within the store's call timeout
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    /// The connector reported a failure of its own
    #[error("{0}")]
    Failed(String),

    /// Any other error raised by connector code
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConnectorError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Result type for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
