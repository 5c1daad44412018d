// ABOUTME: Deployment state marker types for the type state pattern.
// ABOUTME: Each state carries what the previous stage produced.

use crate::topology::SwarmTopology;
use crate::types::ImageRef;

use super::metadata::DeploymentMetadata;

/// Initial state: nothing built yet.
/// Available actions: `build()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Idle;

/// Image built locally.
/// Available actions: `push()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Built;

/// Image pushed to the local registry.
/// Available actions: `pull()`
#[derive(Debug, Clone)]
pub struct Pushed {
    pub(crate) local_image: ImageRef,
}

/// Image pulled on the remote host and tagged for the swarm.
/// Available actions: `inspect_topology()`
#[derive(Debug, Clone)]
pub struct Pulled {
    pub(crate) remote_tag: String,
}

/// Multi-node swarm: the image exists on one node only.
/// Available actions: `relay()`
#[derive(Debug, Clone)]
pub struct NeedsRelay {
    pub(crate) remote_tag: String,
    pub(crate) topology: SwarmTopology,
}

/// Image pullable by every node that may run the service.
/// Available actions: `update()`
#[derive(Debug, Clone)]
pub struct Ready {
    pub(crate) image: String,
    pub(crate) topology: SwarmTopology,
}

/// Service updated; terminal.
#[derive(Debug, Clone)]
pub struct Updated {
    pub(crate) image: String,
    pub(crate) metadata: DeploymentMetadata,
}
