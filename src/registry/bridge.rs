// ABOUTME: Moves a freshly built image from this machine onto the swarm.
// ABOUTME: Local tag and push, remote pull through the tunnel, and the multi-node relay.

use std::ops::RangeInclusive;

use super::RegistryEndpoint;
use super::error::RegistryError;
use super::local::LOCAL_REGISTRY_IMAGE;
use crate::ports::{PortNegotiator, pick_unused_port};
use crate::process::{OutputMode, ProcessOutput, ProcessRunner, docker, remote_docker};
use crate::topology::{CLUSTER_REGISTRY_NAME, REGISTRY_CONTAINER_PORT, SwarmTopology, TopologyInspector};
use crate::types::{ImageRef, RemoteHost};

/// Ports the cluster registry may be published on.
pub const RELAY_PORT_RANGE: RangeInclusive<u16> = 5000..=60000;

/// Drives the docker CLI on both ends of the tunnel.
pub struct RegistryBridge<'a, R: ?Sized> {
    runner: &'a R,
    tool_output: OutputMode,
}

impl<'a, R: ProcessRunner + ?Sized> RegistryBridge<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self {
            runner,
            tool_output: OutputMode::Piped,
        }
    }

    /// Where push and pull progress goes. Tagging is always captured.
    pub fn tool_output(mut self, mode: OutputMode) -> Self {
        self.tool_output = mode;
        self
    }

    /// Tag the built image into the local registry and push it there.
    ///
    /// Returns the pushed reference, e.g. `localhost:20000/api-img:latest`.
    ///
    /// # Errors
    ///
    /// `RegistryError::TagMismatch` when the image does not exist locally,
    /// echoing `build_command`; `RegistryError::Push` when the push fails.
    pub async fn tag_and_push(
        &self,
        image: &ImageRef,
        local_registry: &RegistryEndpoint,
        build_command: &str,
    ) -> Result<ImageRef, RegistryError> {
        let target = image.in_registry(&local_registry.address());

        let tagged = self
            .runner
            .run(&docker([
                "image".to_string(),
                "tag".to_string(),
                image.to_string(),
                target.to_string(),
            ]))
            .await?;
        if !tagged.success() {
            return Err(RegistryError::TagMismatch {
                image: image.to_string(),
                build_command: build_command.to_string(),
                detail: tagged.error_text(),
            });
        }

        let pushed = self
            .runner
            .run(
                &docker(["image".to_string(), "push".to_string(), target.to_string()])
                    .output(self.tool_output),
            )
            .await?;
        log_tool_output("push", &pushed);
        if !pushed.success() {
            return Err(RegistryError::Push {
                image: target.to_string(),
                detail: pushed.error_text(),
            });
        }

        Ok(target)
    }

    /// Pull the image on the remote host through the tunnel and tag it
    /// `<tag_prefix>/<name>:latest`.
    ///
    /// `tunnel_port` is the remote end of the tunnel; the remote daemon reaches
    /// the local registry as `localhost:<tunnel_port>`.
    pub async fn pull_and_retag_on_remote(
        &self,
        image: &ImageRef,
        host: &RemoteHost,
        tunnel_port: u16,
        tag_prefix: &str,
    ) -> Result<String, RegistryError> {
        let source = image.in_registry(&format!("localhost:{}", tunnel_port));
        let pull_error = |detail: String| RegistryError::Pull {
            image: source.to_string(),
            host: host.to_string(),
            detail,
        };

        let pulled = self
            .runner
            .run(
                &remote_docker(host, ["pull".to_string(), source.to_string()])
                    .output(self.tool_output),
            )
            .await?;
        log_tool_output("pull", &pulled);
        if !pulled.success() {
            return Err(pull_error(pulled.error_text()));
        }

        let deployed = image.with_prefix_latest(tag_prefix);
        let tagged = self
            .runner
            .run(&remote_docker(
                host,
                [
                    "image".to_string(),
                    "tag".to_string(),
                    source.to_string(),
                    deployed.clone(),
                ],
            ))
            .await?;
        if !tagged.success() {
            return Err(pull_error(tagged.error_text()));
        }

        Ok(deployed)
    }

    /// Make the already pulled `<tag_prefix>/<name>:latest` pullable from every node.
    ///
    /// Creates the cluster registry service when `topology` says it is absent,
    /// then pushes the image into it. Returns the reference services should run,
    /// e.g. `127.0.0.1:31337/api-img:latest`.
    pub async fn relay_to_cluster_registry(
        &self,
        image: &ImageRef,
        host: &RemoteHost,
        tag_prefix: &str,
        topology: &SwarmTopology,
    ) -> Result<ImageRef, RegistryError> {
        let endpoint = self.ensure_cluster_registry(host, topology).await?;
        let relay_error = |detail: String| RegistryError::Relay {
            image: image.to_string(),
            host: host.to_string(),
            detail,
        };

        let pulled = image.with_prefix_latest(tag_prefix);
        let target = ImageRef::parse(&format!("{}/{}:latest", endpoint.address(), image.name()))
            .map_err(|e| relay_error(e.to_string()))?;

        let tagged = self
            .runner
            .run(&remote_docker(
                host,
                ["image".to_string(), "tag".to_string(), pulled, target.to_string()],
            ))
            .await?;
        if !tagged.success() {
            return Err(relay_error(tagged.error_text()));
        }

        let pushed = self
            .runner
            .run(
                &remote_docker(host, ["push".to_string(), target.to_string()])
                    .output(self.tool_output),
            )
            .await?;
        log_tool_output("relay push", &pushed);
        if !pushed.success() {
            return Err(relay_error(pushed.error_text()));
        }

        Ok(target)
    }

    /// Discover the cluster registry, creating it if needed.
    ///
    /// Creation races with concurrent first deployments; losing that race
    /// ("already exists") is treated as discovery.
    pub async fn ensure_cluster_registry(
        &self,
        host: &RemoteHost,
        topology: &SwarmTopology,
    ) -> Result<RegistryEndpoint, RegistryError> {
        let inspector = TopologyInspector::new(self.runner);

        if topology.has_cluster_registry {
            let port = inspector.cluster_registry_port(host).await?;
            tracing::debug!(host = %host, port, "reusing cluster registry");
            return Ok(RegistryEndpoint::cluster(port));
        }

        let exposed = PortNegotiator::new(self.runner).exposed_ports(host).await?;
        let port = pick_unused_port(
            &exposed,
            *RELAY_PORT_RANGE.start(),
            *RELAY_PORT_RANGE.end(),
            &mut rand::thread_rng(),
        )?;

        let created = self
            .runner
            .run(&remote_docker(
                host,
                [
                    "service".to_string(),
                    "create".to_string(),
                    "--name".to_string(),
                    CLUSTER_REGISTRY_NAME.to_string(),
                    "--publish".to_string(),
                    format!("{}:{}", port, REGISTRY_CONTAINER_PORT),
                    LOCAL_REGISTRY_IMAGE.to_string(),
                ],
            ))
            .await?;

        if created.success() {
            tracing::info!(host = %host, port, "cluster registry created");
            return Ok(RegistryEndpoint::cluster(port));
        }

        let detail = created.error_text();
        if is_already_exists(&detail) {
            tracing::debug!(host = %host, "cluster registry created concurrently");
            let port = inspector.cluster_registry_port(host).await?;
            return Ok(RegistryEndpoint::cluster(port));
        }

        Err(RegistryError::Relay {
            image: LOCAL_REGISTRY_IMAGE.to_string(),
            host: host.to_string(),
            detail,
        })
    }
}

fn log_tool_output(step: &str, output: &ProcessOutput) {
    for line in output.stdout.lines().filter(|l| !l.trim().is_empty()) {
        tracing::debug!("{}: {}", step, line);
    }
}

/// Whether a docker error says the object is already there.
fn is_already_exists(detail: &str) -> bool {
    let detail = detail.to_ascii_lowercase();
    detail.contains("already exists") || detail.contains("name conflicts")
}
