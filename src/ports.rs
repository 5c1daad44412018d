// ABOUTME: Port negotiation for registries and tunnels.
// ABOUTME: Local registry port discovery, swarm exposed ports, and collision-free port picking.

use std::collections::HashSet;

use rand::Rng;
use thiserror::Error;

use crate::process::{ProcessError, ProcessRunner, docker, remote_docker};
use crate::types::RemoteHost;

/// Random draws before falling back to a linear scan of the range.
const MAX_RANDOM_ATTEMPTS: usize = 1024;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("container {container} is not running or publishes no port")]
    NotFound { container: String },

    #[error("no unused port left in {min}..={max}")]
    Exhausted { min: u16, max: u16 },

    #[error("failed to list ports exposed on {host}: {detail}")]
    Query { host: String, detail: String },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Discovers ports in use locally and on the swarm.
pub struct PortNegotiator<'a, R: ?Sized> {
    runner: &'a R,
}

impl<'a, R: ProcessRunner + ?Sized> PortNegotiator<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self { runner }
    }

    /// Host port published by a local container, typically the local registry.
    ///
    /// # Errors
    ///
    /// Returns `PortError::NotFound` if the container is absent, stopped, or
    /// publishes nothing.
    pub async fn local_registry_port(&self, container: &str) -> Result<u16, PortError> {
        let output = self.runner.run(&docker(["port", container])).await?;
        if !output.success() {
            tracing::debug!(container, stderr = %output.stderr.trim(), "docker port failed");
            return Err(PortError::NotFound {
                container: container.to_string(),
            });
        }

        parse_container_port(&output.stdout).ok_or_else(|| PortError::NotFound {
            container: container.to_string(),
        })
    }

    /// Every port published by a service on the swarm behind `host`.
    pub async fn exposed_ports(&self, host: &RemoteHost) -> Result<HashSet<u16>, PortError> {
        let output = self
            .runner
            .run(&remote_docker(host, ["service", "ls", "--format", "{{.Ports}}"]))
            .await?;

        if !output.success() {
            return Err(PortError::Query {
                host: host.to_string(),
                detail: output.error_text(),
            });
        }

        Ok(parse_published_ports(&output.stdout))
    }
}

/// Draw a port uniformly from `min..=max` that is not in `used`.
///
/// Random draws are capped; a crowded range then falls back to a scan, so a
/// free port is found whenever one exists.
///
/// # Errors
///
/// Returns `PortError::Exhausted` if the range is empty or entirely used.
pub fn pick_unused_port<G: Rng + ?Sized>(
    used: &HashSet<u16>,
    min: u16,
    max: u16,
    rng: &mut G,
) -> Result<u16, PortError> {
    if min > max {
        return Err(PortError::Exhausted { min, max });
    }

    for _ in 0..MAX_RANDOM_ATTEMPTS {
        let candidate = rng.gen_range(min..=max);
        if !used.contains(&candidate) {
            return Ok(candidate);
        }
    }

    (min..=max)
        .find(|port| !used.contains(port))
        .ok_or(PortError::Exhausted { min, max })
}

/// Parse `docker port <container>` output.
///
/// Example: `5000/tcp -> 0.0.0.0:20000` (often followed by an IPv6 line
/// `5000/tcp -> [::]:20000`).
pub fn parse_container_port(output: &str) -> Option<u16> {
    output.lines().find_map(|line| {
        let (_, binding) = line.split_once("->")?;
        let (_, port) = binding.trim().rsplit_once(':')?;
        port.trim().parse().ok()
    })
}

/// Parse `docker service ls --format {{.Ports}}` output into published ports.
///
/// Each line lists a service's ports, e.g. `*:5000->5000/tcp, *:8081->8081/tcp`.
/// Published ranges (`*:30000-30002->80-82/tcp`) are expanded.
pub fn parse_published_ports(output: &str) -> HashSet<u16> {
    let mut ports = HashSet::new();

    for entry in output.lines().flat_map(|line| line.split(',')) {
        let Some((published, _)) = entry.trim().split_once("->") else {
            continue;
        };
        let published = published.rsplit_once(':').map_or(published, |(_, p)| p);

        match published.split_once('-') {
            Some((start, end)) => {
                if let (Ok(start), Ok(end)) = (start.parse::<u16>(), end.parse::<u16>()) {
                    ports.extend(start..=end);
                }
            }
            None => {
                if let Ok(port) = published.parse::<u16>() {
                    ports.insert(port);
                }
            }
        }
    }

    ports
}
