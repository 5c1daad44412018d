// ABOUTME: Deployment pipeline using the type state pattern.
// ABOUTME: Exports the coordinator, state markers, request, metadata and error types.

mod coordinator;
mod deployment;
mod error;
mod metadata;
mod request;
mod state;
mod transitions;

pub use coordinator::{DeploymentCoordinator, PipelineResult};
pub use deployment::{Deployment, Route};
pub use error::{DeployError, FailureKind, PipelineError, Stage, StageSnafu};
pub use metadata::{DeploymentMetadata, METADATA_LABEL, OperatingSystem};
pub use request::DeploymentRequest;
pub use state::{Built, Idle, NeedsRelay, Pulled, Pushed, Ready, Updated};
