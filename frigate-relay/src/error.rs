//! Application-wide error types.

use std::path::PathBuf;

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Telegram API error ({method}): {description}")]
    Telegram { method: String, description: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Frigate API error: {0}")]
    Api(#[from] frigate_api::ApiError),

    #[error("MQTT error: {0}")]
    Mqtt(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error while {op} at {}: {source}", path.display())]
    IoPath {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {secs}s: {operation}")]
    Timeout { operation: &'static str, secs: u64 },

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn telegram(method: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Telegram {
            method: method.into(),
            description: description.into(),
        }
    }

    pub fn io_path(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoPath {
            op,
            path: path.into(),
            source,
        }
    }

    /// Whether this is a Telegram "query is too old" callback error.
    pub fn is_stale_callback(&self) -> bool {
        matches!(self, Self::Telegram { description, .. } if description.contains("query is too old"))
    }
}
