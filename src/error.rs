// ABOUTME: Application-wide error type for berth.
// ABOUTME: Wraps configuration, discovery and backend failures for the binary.

use crate::discovery::DiscoveryError;
use crate::runtime::{BackendError, RuntimeError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no container matches `{0}`")]
    UnknownContainer(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type Result<T> = std::result::Result<T, Error>;
