// ABOUTME: Swarm topology queries: node membership and the cluster-wide registry service.
// ABOUTME: Decides between the single-node tunnel path and the multi-node registry relay.

use serde_json::Value;
use thiserror::Error;

use crate::process::{ProcessError, ProcessRunner, remote_docker};
use crate::types::RemoteHost;

/// Name of the registry service published on every swarm node.
pub const CLUSTER_REGISTRY_NAME: &str = "deployer-registry";

/// Port the registry listens on inside its container.
pub const REGISTRY_CONTAINER_PORT: u16 = 5000;

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("topology query `{query}` failed on {host}: {detail}")]
    Query {
        host: String,
        query: &'static str,
        detail: String,
    },

    #[error("service {service} on {host} publishes no registry port")]
    NoPublishedPort { host: String, service: String },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Snapshot of the target swarm, taken once per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwarmTopology {
    pub node_count: usize,
    pub has_cluster_registry: bool,
}

impl SwarmTopology {
    /// More than one node means a task can land where the tunnel did not.
    pub fn is_multi_node(&self) -> bool {
        self.node_count > 1
    }
}

/// Queries the orchestrator behind a remote host.
pub struct TopologyInspector<'a, R: ?Sized> {
    runner: &'a R,
    registry_service: String,
}

impl<'a, R: ProcessRunner + ?Sized> TopologyInspector<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self {
            runner,
            registry_service: CLUSTER_REGISTRY_NAME.to_string(),
        }
    }

    /// Name of the cluster registry service this inspector looks for.
    pub fn registry_service(&self) -> &str {
        &self.registry_service
    }

    async fn query(
        &self,
        host: &RemoteHost,
        query: &'static str,
        args: &[&str],
    ) -> Result<String, TopologyError> {
        let output = self
            .runner
            .run(&remote_docker(host, args.iter().copied()))
            .await?;

        if !output.success() {
            return Err(TopologyError::Query {
                host: host.to_string(),
                query,
                detail: output.error_text(),
            });
        }
        Ok(output.stdout)
    }

    /// Number of nodes in the swarm.
    pub async fn node_count(&self, host: &RemoteHost) -> Result<usize, TopologyError> {
        let stdout = self
            .query(host, "node ls", &["node", "ls", "--format", "{{.ID}}"])
            .await?;
        Ok(parse_node_count(&stdout))
    }

    /// Whether the cluster registry service already exists.
    pub async fn cluster_registry_exists(&self, host: &RemoteHost) -> Result<bool, TopologyError> {
        let stdout = self
            .query(host, "service ls", &["service", "ls", "--format", "{{.Name}}"])
            .await?;
        Ok(service_listed(&stdout, &self.registry_service))
    }

    /// Published port of the existing cluster registry service.
    pub async fn cluster_registry_port(&self, host: &RemoteHost) -> Result<u16, TopologyError> {
        let stdout = self
            .query(
                host,
                "service inspect",
                &["service", "inspect", &self.registry_service],
            )
            .await?;

        parse_registry_published_port(&stdout).ok_or_else(|| TopologyError::NoPublishedPort {
            host: host.to_string(),
            service: self.registry_service.clone(),
        })
    }

    /// Node count and registry presence in one snapshot.
    pub async fn snapshot(&self, host: &RemoteHost) -> Result<SwarmTopology, TopologyError> {
        let node_count = self.node_count(host).await?;
        let has_cluster_registry = if node_count > 1 {
            self.cluster_registry_exists(host).await?
        } else {
            false
        };

        tracing::debug!(host = %host, node_count, has_cluster_registry, "swarm topology");
        Ok(SwarmTopology {
            node_count,
            has_cluster_registry,
        })
    }
}

/// Count node IDs in `docker node ls --format {{.ID}}` output.
pub fn parse_node_count(output: &str) -> usize {
    output.lines().filter(|line| !line.trim().is_empty()).count()
}

/// Exact match of `name` against `docker service ls --format {{.Name}}` output.
pub fn service_listed(output: &str, name: &str) -> bool {
    output.lines().any(|line| line.trim() == name)
}

/// Published port of the registry from `docker service inspect` JSON.
///
/// Prefers the live endpoint ports and falls back to the endpoint spec, taking
/// the entry that targets the registry's container port.
pub fn parse_registry_published_port(output: &str) -> Option<u16> {
    let inspected: Value = serde_json::from_str(output).ok()?;
    let service = match &inspected {
        Value::Array(items) => items.first()?,
        other => other,
    };

    let candidates = [
        service.pointer("/Endpoint/Ports"),
        service.pointer("/Endpoint/Spec/Ports"),
        service.pointer("/Spec/EndpointSpec/Ports"),
    ];

    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_array)
        .find_map(|ports| {
            let published = |port: &Value| {
                port.get("PublishedPort")
                    .and_then(Value::as_u64)
                    .and_then(|p| u16::try_from(p).ok())
                    .filter(|p| *p != 0)
            };

            ports
                .iter()
                .find(|port| {
                    port.get("TargetPort").and_then(Value::as_u64)
                        == Some(u64::from(REGISTRY_CONTAINER_PORT))
                })
                .and_then(published)
                .or_else(|| ports.iter().find_map(published))
        })
}
