// ABOUTME: Deployment error types with SNAFU stage context.
// ABOUTME: DeployError says what broke, PipelineError adds the stage it broke in.

use std::fmt;

use snafu::Snafu;
use thiserror::Error;

use crate::ports::PortError;
use crate::process::ProcessError;
use crate::registry::RegistryError;
use crate::topology::TopologyError;
use crate::tunnel::TunnelError;

/// Errors raised inside pipeline stages.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("build command `{command}` failed: {detail}")]
    Build { command: String, detail: String },

    #[error("local registry {container} is not running (start it with `deployer registry start`)")]
    RegistryNotFound { container: String },

    #[error("failed to update service {service}: {detail}")]
    Update { service: String, detail: String },

    #[error(transparent)]
    Tunnel(#[from] TunnelError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Failure taxonomy for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Build,
    TunnelAllocation,
    Launch,
    TagMismatch,
    Push,
    Pull,
    Relay,
    Update,
    PortExhaustion,
    TopologyQuery,
    /// No local registry to tunnel to.
    RegistryUnavailable,
}

impl DeployError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> FailureKind {
        match self {
            DeployError::Build { .. } => FailureKind::Build,
            DeployError::RegistryNotFound { .. } => FailureKind::RegistryUnavailable,
            DeployError::Update { .. } => FailureKind::Update,
            DeployError::Tunnel(TunnelError::Allocation { .. }) => FailureKind::TunnelAllocation,
            DeployError::Tunnel(TunnelError::Process(_)) => FailureKind::Launch,
            DeployError::Registry(e) => registry_kind(e),
            DeployError::Topology(e) => topology_kind(e),
            DeployError::Port(e) => port_kind(e),
            DeployError::Process(_) => FailureKind::Launch,
        }
    }
}

fn registry_kind(err: &RegistryError) -> FailureKind {
    match err {
        RegistryError::TagMismatch { .. } => FailureKind::TagMismatch,
        RegistryError::Push { .. } => FailureKind::Push,
        RegistryError::Pull { .. } => FailureKind::Pull,
        RegistryError::Relay { .. } => FailureKind::Relay,
        RegistryError::Start { .. } | RegistryError::Stop { .. } => {
            FailureKind::RegistryUnavailable
        }
        RegistryError::Port(e) => port_kind(e),
        RegistryError::Topology(e) => topology_kind(e),
        RegistryError::Process(_) => FailureKind::Launch,
    }
}

fn topology_kind(err: &TopologyError) -> FailureKind {
    match err {
        TopologyError::Process(_) => FailureKind::Launch,
        TopologyError::Query { .. } | TopologyError::NoPublishedPort { .. } => {
            FailureKind::TopologyQuery
        }
    }
}

fn port_kind(err: &PortError) -> FailureKind {
    match err {
        PortError::Exhausted { .. } => FailureKind::PortExhaustion,
        PortError::NotFound { .. } => FailureKind::RegistryUnavailable,
        PortError::Query { .. } => FailureKind::TopologyQuery,
        PortError::Process(_) => FailureKind::Launch,
    }
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Building,
    TunnelOpening,
    Pushing,
    Pulling,
    TopologyCheck,
    Relaying,
    Updating,
}

impl Stage {
    /// Process exit code for a run that failed in this stage.
    pub fn exit_code(self) -> i32 {
        match self {
            Stage::Building => 10,
            Stage::TunnelOpening => 11,
            Stage::Pushing => 12,
            Stage::Pulling => 13,
            Stage::TopologyCheck => 14,
            Stage::Relaying => 15,
            Stage::Updating => 16,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Building => "build",
            Stage::TunnelOpening => "tunnel",
            Stage::Pushing => "push",
            Stage::Pulling => "pull",
            Stage::TopologyCheck => "topology check",
            Stage::Relaying => "relay",
            Stage::Updating => "service update",
        };
        f.write_str(name)
    }
}

/// A stage failure, terminal for the run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    #[snafu(display("{stage} failed: {source}"))]
    Stage { stage: Stage, source: DeployError },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Stage { stage, .. } => *stage,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Stage { source, .. } => source.kind(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.stage().exit_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snafu::ResultExt;

    #[test]
    fn stage_context_wraps_source() {
        let result: Result<(), DeployError> = Err(DeployError::Build {
            command: "make image".to_string(),
            detail: "exit code 2".to_string(),
        });
        let err = result.context(StageSnafu { stage: Stage::Building }).unwrap_err();

        assert_eq!(err.stage(), Stage::Building);
        assert_eq!(err.kind(), FailureKind::Build);
        assert_eq!(err.exit_code(), 10);
        assert_eq!(
            err.to_string(),
            "build failed: build command `make image` failed: exit code 2"
        );
    }

    #[test]
    fn exhausted_ports_inside_relay_keep_their_kind() {
        let err = DeployError::Registry(RegistryError::Port(PortError::Exhausted {
            min: 5000,
            max: 60000,
        }));
        assert_eq!(err.kind(), FailureKind::PortExhaustion);
    }

    #[test]
    fn tunnel_launch_failure_is_distinguished() {
        let err = DeployError::Tunnel(TunnelError::Process(ProcessError::Launch {
            program: "ssh".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        }));
        assert_eq!(err.kind(), FailureKind::Launch);
    }

    #[test]
    fn exit_codes_are_distinct_per_stage() {
        let stages = [
            Stage::Building,
            Stage::TunnelOpening,
            Stage::Pushing,
            Stage::Pulling,
            Stage::TopologyCheck,
            Stage::Relaying,
            Stage::Updating,
        ];
        let codes: std::collections::HashSet<i32> = stages.iter().map(|s| s.exit_code()).collect();
        assert_eq!(codes.len(), stages.len());
        assert!(!codes.contains(&0) && !codes.contains(&1));
    }
}
