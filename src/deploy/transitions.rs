// ABOUTME: State transition methods for the deployment pipeline.
// ABOUTME: Each method consumes self and returns the next state on success.

use crate::output::Output;
use crate::process::{OutputMode, ProcessRunner, remote_docker, shell};
use crate::registry::{RegistryBridge, RegistryEndpoint};
use crate::topology::TopologyInspector;
use crate::tunnel::TunnelHandle;

use super::deployment::{Deployment, Route};
use super::error::DeployError;
use super::metadata::{DeploymentMetadata, METADATA_LABEL};
use super::state::{Built, Idle, NeedsRelay, Pulled, Pushed, Ready, Updated};

// =============================================================================
// Idle -> Built
// =============================================================================

impl<'r> Deployment<'r, Idle> {
    /// Run the configured build command in the working directory.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::Build` on a nonzero exit.
    #[must_use = "deployment state must be used"]
    pub async fn build<R: ProcessRunner + ?Sized>(
        self,
        runner: &R,
        output: &Output,
    ) -> Result<Deployment<'r, Built>, DeployError> {
        let mode = output.tool_output();
        let mut command = shell(&self.request.build_command)
            .output(mode)
            .merge_streams(mode == OutputMode::Piped);
        if let Some(dir) = &self.request.working_dir {
            command = command.cwd(dir);
        }

        let result = runner.run(&command).await?;
        if !result.success() {
            let detail = match (result.error_text(), result.exit_code) {
                (text, _) if !text.is_empty() => last_lines(&text, 20),
                (_, Some(code)) => format!("exit code {}", code),
                (_, None) => "terminated by signal".to_string(),
            };
            return Err(DeployError::Build {
                command: self.request.build_command.clone(),
                detail,
            });
        }

        Ok(self.transition(Built))
    }
}

// =============================================================================
// Built -> Pushed
// =============================================================================

impl<'r> Deployment<'r, Built> {
    /// Tag the built image into the local registry and push it.
    #[must_use = "deployment state must be used"]
    pub async fn push<R: ProcessRunner + ?Sized>(
        self,
        runner: &R,
        local_registry: &RegistryEndpoint,
        output: &Output,
    ) -> Result<Deployment<'r, Pushed>, DeployError> {
        let local_image = RegistryBridge::new(runner)
            .tool_output(output.tool_output())
            .tag_and_push(
                &self.request.image,
                local_registry,
                &self.request.build_command,
            )
            .await?;

        Ok(self.transition(Pushed { local_image }))
    }
}

// =============================================================================
// Pushed -> Pulled
// =============================================================================

impl<'r> Deployment<'r, Pushed> {
    /// Pull the image on the remote host through the tunnel's remote port.
    #[must_use = "deployment state must be used"]
    pub async fn pull<R: ProcessRunner + ?Sized>(
        self,
        runner: &R,
        tunnel_port: u16,
        output: &Output,
    ) -> Result<Deployment<'r, Pulled>, DeployError> {
        let remote_tag = RegistryBridge::new(runner)
            .tool_output(output.tool_output())
            .pull_and_retag_on_remote(
                &self.request.image,
                &self.request.remote_host,
                tunnel_port,
                &self.request.tag_prefix,
            )
            .await?;

        Ok(self.transition(Pulled { remote_tag }))
    }

    /// Pull through an open tunnel.
    #[must_use = "deployment state must be used"]
    pub async fn pull_through<R: ProcessRunner + ?Sized>(
        self,
        runner: &R,
        tunnel: &TunnelHandle,
        output: &Output,
    ) -> Result<Deployment<'r, Pulled>, DeployError> {
        self.pull(runner, tunnel.destination_port(), output).await
    }
}

// =============================================================================
// Pulled -> Ready | NeedsRelay
// =============================================================================

impl<'r> Deployment<'r, Pulled> {
    /// Query the swarm and pick the transfer path.
    #[must_use = "deployment route must be used"]
    pub async fn inspect_topology<R: ProcessRunner + ?Sized>(
        self,
        runner: &R,
    ) -> Result<Route<'r>, DeployError> {
        let topology = TopologyInspector::new(runner)
            .snapshot(&self.request.remote_host)
            .await?;

        let remote_tag = self.state.remote_tag.clone();
        if topology.is_multi_node() {
            Ok(Route::MultiNode(self.transition(NeedsRelay {
                remote_tag,
                topology,
            })))
        } else {
            Ok(Route::SingleNode(self.transition(Ready {
                image: remote_tag,
                topology,
            })))
        }
    }
}

// =============================================================================
// NeedsRelay -> Ready
// =============================================================================

impl<'r> Deployment<'r, NeedsRelay> {
    /// Push the pulled image into the cluster registry so any node can run it.
    #[must_use = "deployment state must be used"]
    pub async fn relay<R: ProcessRunner + ?Sized>(
        self,
        runner: &R,
        output: &Output,
    ) -> Result<Deployment<'r, Ready>, DeployError> {
        let image = RegistryBridge::new(runner)
            .tool_output(output.tool_output())
            .relay_to_cluster_registry(
                &self.request.image,
                &self.request.remote_host,
                &self.request.tag_prefix,
                &self.state.topology,
            )
            .await?;

        let topology = self.state.topology;
        tracing::debug!(remote_tag = %self.state.remote_tag, relayed = %image, "image relayed");
        Ok(self.transition(Ready {
            image: image.to_string(),
            topology,
        }))
    }
}

// =============================================================================
// Ready -> Updated
// =============================================================================

impl<'r> Deployment<'r, Ready> {
    /// Force-update the service to the new image and attach the metadata label.
    ///
    /// No previous image is recorded, so a failure here is not rolled back.
    #[must_use = "deployment state must be used"]
    pub async fn update<R: ProcessRunner + ?Sized>(
        self,
        runner: &R,
        metadata: &DeploymentMetadata,
    ) -> Result<Deployment<'r, Updated>, DeployError> {
        let label = metadata.to_label().map_err(|e| DeployError::Update {
            service: self.request.service_name.to_string(),
            detail: format!("could not serialize metadata: {}", e),
        })?;

        let command = remote_docker(
            &self.request.remote_host,
            [
                "service".to_string(),
                "update".to_string(),
                "--force".to_string(),
                "--image".to_string(),
                self.state.image.clone(),
                "--label-add".to_string(),
                format!("{}={}", METADATA_LABEL, label),
                self.request.service_name.to_string(),
            ],
        );

        let result = runner.run(&command).await?;
        if !result.success() {
            return Err(DeployError::Update {
                service: self.request.service_name.to_string(),
                detail: result.error_text(),
            });
        }

        let image = self.state.image.clone();
        Ok(self.transition(Updated {
            image,
            metadata: metadata.clone(),
        }))
    }
}

/// The last `n` lines of a tool's output.
fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}
