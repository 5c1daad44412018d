// ABOUTME: Generic deployment struct parameterized by state marker.
// ABOUTME: State types carry their own data for compile-time guarantees.

use crate::topology::SwarmTopology;
use crate::types::{ImageRef, RemoteHost, ServiceName};

use super::metadata::DeploymentMetadata;
use super::request::DeploymentRequest;
use super::state::{Idle, NeedsRelay, Pulled, Pushed, Ready, Updated};

/// A deployment in progress, parameterized by its current state.
///
/// Stages can only run in pipeline order; skipping one does not compile:
///
/// ```compile_fail
/// use deployer::deploy::{Deployment, DeploymentRequest};
/// use deployer::output::{Output, OutputMode};
/// use deployer::process::LocalRunner;
///
/// async fn skip_build(request: &DeploymentRequest) {
///     let runner = LocalRunner::new();
///     let output = Output::new(OutputMode::Quiet);
///     // `pull` only exists once the image has been pushed.
///     Deployment::new(request).pull(&runner, 40661, &output).await;
/// }
/// ```
///
/// ```compile_fail
/// use deployer::deploy::{Deployment, DeploymentMetadata, DeploymentRequest};
/// use deployer::process::LocalRunner;
///
/// async fn update_unbuilt(request: &DeploymentRequest, metadata: &DeploymentMetadata) {
///     let runner = LocalRunner::new();
///     Deployment::new(request).update(&runner, metadata).await;
/// }
/// ```
#[derive(Debug)]
pub struct Deployment<'r, S> {
    pub(crate) request: &'r DeploymentRequest,
    pub(crate) state: S,
}

/// Outcome of the topology check.
#[derive(Debug)]
pub enum Route<'r> {
    /// One node: the pulled image is already where tasks run.
    SingleNode(Deployment<'r, Ready>),
    /// Several nodes: the image must go through the cluster registry first.
    MultiNode(Deployment<'r, NeedsRelay>),
}

impl<'r> Deployment<'r, Idle> {
    pub fn new(request: &'r DeploymentRequest) -> Self {
        Deployment {
            request,
            state: Idle,
        }
    }
}

impl<'r, S> Deployment<'r, S> {
    pub fn request(&self) -> &'r DeploymentRequest {
        self.request
    }

    pub fn service_name(&self) -> &ServiceName {
        &self.request.service_name
    }

    pub fn image(&self) -> &ImageRef {
        &self.request.image
    }

    pub fn host(&self) -> &RemoteHost {
        &self.request.remote_host
    }

    pub(crate) fn transition<T>(self, state: T) -> Deployment<'r, T> {
        Deployment {
            request: self.request,
            state,
        }
    }
}

impl Deployment<'_, Pushed> {
    /// Reference pushed into the local registry.
    pub fn local_image(&self) -> &ImageRef {
        &self.state.local_image
    }
}

impl Deployment<'_, Pulled> {
    /// Tag the image carries on the remote host.
    pub fn remote_tag(&self) -> &str {
        &self.state.remote_tag
    }
}

impl Deployment<'_, NeedsRelay> {
    pub fn topology(&self) -> &SwarmTopology {
        &self.state.topology
    }
}

impl Deployment<'_, Ready> {
    /// Image the service will be updated to.
    pub fn image_to_deploy(&self) -> &str {
        &self.state.image
    }

    pub fn topology(&self) -> &SwarmTopology {
        &self.state.topology
    }
}

impl Deployment<'_, Updated> {
    pub fn deployed_image(&self) -> &str {
        &self.state.image
    }

    pub fn metadata(&self) -> &DeploymentMetadata {
        &self.state.metadata
    }
}
