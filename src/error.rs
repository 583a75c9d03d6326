//! Error types for configuration, watching, and webhook delivery.

use std::path::PathBuf;
use thiserror::Error;

/// Raised while assembling [`AppConfig`](crate::config::AppConfig). Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Figment(#[from] Box<figment::Error>),
    #[error("missing required configuration key `{0}`")]
    Missing(&'static str),
    #[error("`polling` must be greater than zero")]
    ZeroPolling,
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Figment(Box::new(err))
    }
}

/// Observer failures. The process cannot do anything useful after one of these.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watch folder does not exist: {}", .0.display())]
    FolderMissing(PathBuf),
    #[error("watch folder is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("failed to create file watcher: {0}")]
    Create(#[source] notify::Error),
    #[error("failed to watch {}: {source}", path.display())]
    Register {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error("file watcher reported an error: {0}")]
    Runtime(#[source] notify::Error),
}

/// Delivery failures. Logged by the dispatcher and never retried.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to serialize webhook payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
}
