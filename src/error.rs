// ABOUTME: Application-wide error types for deployer.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

use crate::inspect::InspectError;
use crate::registry::RegistryError;
use crate::types::ParseRemoteHostError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("invalid remote host: {0}")]
    InvalidHost(#[from] ParseRemoteHostError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Inspect(#[from] InspectError),

    #[error("worker for {service} failed: {detail}")]
    Worker { service: String, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
