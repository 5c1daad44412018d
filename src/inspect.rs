// ABOUTME: Reads back the deployment label of a swarm service.
// ABOUTME: Reports who deployed it and whether it still runs the recorded image.

use serde_json::Value;
use thiserror::Error;

use crate::deploy::{DeploymentMetadata, METADATA_LABEL};
use crate::process::{ProcessError, ProcessRunner, remote_docker};
use crate::types::{RemoteHost, ServiceName};

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("service {service} not found on {host}: {detail}")]
    ServiceNotFound {
        service: String,
        host: String,
        detail: String,
    },

    #[error("service {service} was not deployed with this tool (no `{label}` label)")]
    MissingLabel { service: String, label: &'static str },

    #[error("service {service} has an unreadable `{label}` label: {source}")]
    InvalidLabel {
        service: String,
        label: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// What a service runs versus what its last deployment recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReport {
    pub service: ServiceName,
    /// Image in the service spec, digest suffix removed.
    pub current_image: String,
    pub metadata: DeploymentMetadata,
}

impl ServiceReport {
    /// False when the service was updated by something other than this tool.
    pub fn image_matches(&self) -> bool {
        self.current_image == self.metadata.image
    }
}

/// Raw fields pulled out of `docker service inspect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectedService {
    pub image: String,
    pub label: Option<String>,
}

/// Fetch and decode the deployment label of `service`.
pub async fn inspect_service<R: ProcessRunner + ?Sized>(
    runner: &R,
    host: &RemoteHost,
    service: &ServiceName,
) -> Result<ServiceReport, InspectError> {
    let output = runner
        .run(&remote_docker(
            host,
            ["service".to_string(), "inspect".to_string(), service.to_string()],
        ))
        .await?;

    let not_found = |detail: String| InspectError::ServiceNotFound {
        service: service.to_string(),
        host: host.to_string(),
        detail,
    };

    if !output.success() {
        return Err(not_found(output.error_text()));
    }

    let inspected = parse_service_inspect(&output.stdout)
        .ok_or_else(|| not_found("unexpected `docker service inspect` output".to_string()))?;

    let label = inspected.label.ok_or_else(|| InspectError::MissingLabel {
        service: service.to_string(),
        label: METADATA_LABEL,
    })?;

    let metadata =
        DeploymentMetadata::from_label(&label).map_err(|source| InspectError::InvalidLabel {
            service: service.to_string(),
            label: METADATA_LABEL,
            source,
        })?;

    Ok(ServiceReport {
        service: service.clone(),
        current_image: inspected.image,
        metadata,
    })
}

/// Extract the task image and the deployment label from `docker service inspect` JSON.
pub fn parse_service_inspect(output: &str) -> Option<InspectedService> {
    let inspected: Value = serde_json::from_str(output).ok()?;
    let service = match &inspected {
        Value::Array(items) => items.first()?,
        other => other,
    };

    let image = service
        .pointer("/Spec/TaskTemplate/ContainerSpec/Image")
        .and_then(Value::as_str)?;
    let label = service
        .pointer("/Spec/Labels")
        .and_then(|labels| labels.get(METADATA_LABEL))
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(InspectedService {
        image: strip_digest(image).to_string(),
        label,
    })
}

/// Swarm pins images by appending `@sha256:...` to the task image.
fn strip_digest(image: &str) -> &str {
    image.split_once('@').map_or(image, |(name, _)| name)
}
