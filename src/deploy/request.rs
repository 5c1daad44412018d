// ABOUTME: The immutable input of one pipeline run.
// ABOUTME: Built from config for a single service and target host.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::RegistryConfig;
use crate::types::{ImageRef, RemoteHost, ServiceName};

/// Everything one deployment needs, resolved before the pipeline starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    /// Config key of the service, used to attribute output.
    pub key: String,
    pub service_name: ServiceName,
    /// The image the build command produces.
    pub image: ImageRef,
    pub build_command: String,
    pub remote_host: RemoteHost,
    pub working_dir: Option<PathBuf>,
    /// Deployed images are tagged `<tag_prefix>/<name>:latest` on the swarm.
    pub tag_prefix: String,
    pub registry: RegistryConfig,
    pub allocation_timeout: Duration,
}

impl DeploymentRequest {
    /// The single-node image reference the service ends up running.
    pub fn swarm_tag(&self) -> String {
        self.image.with_prefix_latest(&self.tag_prefix)
    }
}
