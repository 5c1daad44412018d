// ABOUTME: Runs one deployment end to end and always tears down what it acquired.
// ABOUTME: build -> tunnel -> push -> pull -> topology -> relay? -> update, then teardown.

use std::time::Duration;

use snafu::ResultExt;

use crate::diagnostics::{Diagnostics, Warning};
use crate::output::Output;
use crate::process::ProcessRunner;
use crate::registry::{LocalRegistry, RegistryEndpoint};
use crate::tunnel::{TunnelHandle, TunnelManager};

use super::deployment::{Deployment, Route};
use super::error::{DeployError, PipelineError, Stage, StageSnafu};
use super::metadata::DeploymentMetadata;
use super::request::DeploymentRequest;

/// How long a killed tunnel process gets to exit before teardown moves on.
const TUNNEL_EXIT_GRACE: Duration = Duration::from_secs(5);

/// Terminal value of one pipeline run. Never retried.
#[derive(Debug)]
pub struct PipelineResult {
    pub succeeded: bool,
    pub failed_stage: Option<Stage>,
    pub error: Option<PipelineError>,
    /// Image the service now runs, on success.
    pub deployed_image: Option<String>,
    /// Non-fatal problems, mostly from teardown.
    pub warnings: Vec<Warning>,
}

impl PipelineResult {
    fn finish(outcome: Result<String, PipelineError>, diagnostics: Diagnostics) -> Self {
        let warnings = diagnostics.into_warnings();
        match outcome {
            Ok(image) => Self {
                succeeded: true,
                failed_stage: None,
                error: None,
                deployed_image: Some(image),
                warnings,
            },
            Err(error) => Self {
                succeeded: false,
                failed_stage: Some(error.stage()),
                error: Some(error),
                deployed_image: None,
                warnings,
            },
        }
    }

    /// Error text of the failure, with the originating tool output.
    pub fn error_detail(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// 0 on success, otherwise the failed stage's code.
    pub fn exit_code(&self) -> i32 {
        self.error.as_ref().map_or(0, PipelineError::exit_code)
    }
}

/// Transient resources of one run, released in `teardown`.
#[derive(Default)]
struct Acquired {
    tunnel: Option<TunnelHandle>,
    ephemeral_registry: Option<String>,
}

/// Entry point of the pipeline.
pub struct DeploymentCoordinator<'a, R: ?Sized> {
    runner: &'a R,
    ssh_program: String,
}

impl<'a, R: ProcessRunner + ?Sized> DeploymentCoordinator<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self {
            runner,
            ssh_program: "ssh".to_string(),
        }
    }

    pub fn ssh_program(mut self, program: impl Into<String>) -> Self {
        self.ssh_program = program.into();
        self
    }

    /// Deploy `request`, reporting the first failing stage.
    ///
    /// The tunnel and any ephemeral registry are released before this returns,
    /// whatever the outcome. If the returned future is dropped mid-run, the
    /// tunnel is still killed when its handle drops.
    pub async fn run(&self, request: &DeploymentRequest, output: &Output) -> PipelineResult {
        let mut acquired = Acquired::default();
        let mut diagnostics = Diagnostics::default();

        let outcome = self.execute(request, output, &mut acquired).await;
        self.teardown(acquired, &mut diagnostics).await;

        match &outcome {
            Ok(image) => tracing::info!(service = %request.service_name, image = %image, "deployment done"),
            Err(e) => tracing::error!(service = %request.service_name, stage = %e.stage(), "deployment failed: {}", e),
        }

        PipelineResult::finish(outcome, diagnostics)
    }

    async fn execute(
        &self,
        request: &DeploymentRequest,
        output: &Output,
        acquired: &mut Acquired,
    ) -> Result<String, PipelineError> {
        let runner = self.runner;

        output.progress(&format!("→ Building {}...", request.image));
        let built = Deployment::new(request)
            .build(runner, output)
            .await
            .context(StageSnafu { stage: Stage::Building })?;

        output.progress(&format!("→ Opening tunnel to {}...", request.remote_host));
        let registry = self
            .local_registry(request, acquired)
            .await
            .context(StageSnafu { stage: Stage::TunnelOpening })?;
        let tunnel = TunnelManager::new(runner)
            .ssh_program(&self.ssh_program)
            .allocation_timeout(request.allocation_timeout)
            .open(&request.remote_host, registry.port)
            .await
            .map_err(DeployError::from)
            .context(StageSnafu { stage: Stage::TunnelOpening })?;
        let tunnel = acquired.tunnel.insert(tunnel);

        output.progress(&format!("→ Pushing to {}...", registry));
        let pushed = built
            .push(runner, &registry, output)
            .await
            .context(StageSnafu { stage: Stage::Pushing })?;

        output.progress(&format!(
            "→ Pulling on {} through port {}...",
            request.remote_host,
            tunnel.destination_port()
        ));
        let pulled = pushed
            .pull_through(runner, tunnel, output)
            .await
            .context(StageSnafu { stage: Stage::Pulling })?;

        let ready = match pulled
            .inspect_topology(runner)
            .await
            .context(StageSnafu { stage: Stage::TopologyCheck })?
        {
            Route::SingleNode(ready) => ready,
            Route::MultiNode(relay) => {
                output.progress(&format!(
                    "→ Relaying to the cluster registry ({} nodes)...",
                    relay.topology().node_count
                ));
                relay
                    .relay(runner, output)
                    .await
                    .context(StageSnafu { stage: Stage::Relaying })?
            }
        };

        output.progress(&format!(
            "→ Updating service {} to {}...",
            request.service_name,
            ready.image_to_deploy()
        ));
        let metadata = DeploymentMetadata::collect(&request.tag_prefix, ready.image_to_deploy());
        let updated = ready
            .update(runner, &metadata)
            .await
            .context(StageSnafu { stage: Stage::Updating })?;

        Ok(updated.deployed_image().to_string())
    }

    /// The running local registry, starting an ephemeral one when allowed.
    async fn local_registry(
        &self,
        request: &DeploymentRequest,
        acquired: &mut Acquired,
    ) -> Result<RegistryEndpoint, DeployError> {
        let local = LocalRegistry::new(self.runner, request.registry.container.as_str());
        if let Some(endpoint) = local.endpoint().await? {
            return Ok(endpoint);
        }

        if !request.registry.auto_start {
            return Err(DeployError::RegistryNotFound {
                container: request.registry.container.clone(),
            });
        }

        let endpoint = local.start(request.registry.port, false).await?;
        acquired.ephemeral_registry = Some(request.registry.container.clone());
        Ok(endpoint)
    }

    /// Close the tunnel, then remove the ephemeral registry it pointed at.
    async fn teardown(&self, acquired: Acquired, diagnostics: &mut Diagnostics) {
        if let Some(tunnel) = acquired.tunnel {
            let host = tunnel.host().to_string();
            if let Err(e) = tunnel.shutdown(TUNNEL_EXIT_GRACE).await {
                diagnostics.warn(Warning::tunnel_teardown(format!(
                    "tunnel to {} may still be running: {}",
                    host, e
                )));
            }
        }

        if let Some(container) = acquired.ephemeral_registry
            && let Err(e) = LocalRegistry::new(self.runner, container.as_str()).stop().await
        {
            diagnostics.warn(Warning::registry_cleanup(format!(
                "ephemeral registry {} was not removed: {}",
                container, e
            )));
        }
    }
}
