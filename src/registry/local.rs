// ABOUTME: The local registry container the tunnel exposes to the swarm.
// ABOUTME: Start, stop and port discovery through the local docker daemon.

use super::error::RegistryError;
use super::RegistryEndpoint;
use crate::ports::{PortError, PortNegotiator};
use crate::process::{ProcessRunner, docker};

/// Image run for every registry this tool starts.
pub const LOCAL_REGISTRY_IMAGE: &str = "registry:2";

/// A named `registry:2` container on this machine.
pub struct LocalRegistry<'a, R: ?Sized> {
    runner: &'a R,
    container: String,
}

impl<'a, R: ProcessRunner + ?Sized> LocalRegistry<'a, R> {
    pub fn new(runner: &'a R, container: impl Into<String>) -> Self {
        Self {
            runner,
            container: container.into(),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Endpoint of the running container, or `None` if it is not running.
    ///
    /// # Errors
    ///
    /// Only fails if docker itself cannot be launched.
    pub async fn endpoint(&self) -> Result<Option<RegistryEndpoint>, RegistryError> {
        match PortNegotiator::new(self.runner)
            .local_registry_port(&self.container)
            .await
        {
            Ok(port) => Ok(Some(RegistryEndpoint::local(port, false))),
            Err(PortError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Run the registry publishing `port`.
    ///
    /// A persistent registry restarts with the docker daemon; an ephemeral one
    /// is expected to be stopped by whoever started it.
    pub async fn start(&self, port: u16, persistent: bool) -> Result<RegistryEndpoint, RegistryError> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "-p".to_string(),
            format!("{}:5000", port),
        ];
        if persistent {
            args.push("--restart=always".to_string());
        }
        args.extend([
            "--name".to_string(),
            self.container.clone(),
            LOCAL_REGISTRY_IMAGE.to_string(),
        ]);

        let output = self.runner.run(&docker(args)).await?;
        if !output.success() {
            return Err(RegistryError::Start {
                container: self.container.clone(),
                detail: output.error_text(),
            });
        }

        tracing::info!(container = %self.container, port, "local registry started");
        Ok(RegistryEndpoint::local(port, !persistent))
    }

    /// Stop the container and remove it with its volumes.
    pub async fn stop(&self) -> Result<(), RegistryError> {
        let stopped = self
            .runner
            .run(&docker(["container", "stop", self.container.as_str()]))
            .await?;
        if !stopped.success() {
            return Err(RegistryError::Stop {
                container: self.container.clone(),
                detail: stopped.error_text(),
            });
        }

        let removed = self
            .runner
            .run(&docker(["container", "rm", "-v", self.container.as_str()]))
            .await?;
        if !removed.success() {
            return Err(RegistryError::Stop {
                container: self.container.clone(),
                detail: removed.error_text(),
            });
        }

        tracing::info!(container = %self.container, "local registry removed");
        Ok(())
    }
}
