// ABOUTME: Image registries on both ends of the tunnel.
// ABOUTME: The local registry container and the bridge that moves images through it.

mod bridge;
mod error;
mod local;

pub use bridge::{RELAY_PORT_RANGE, RegistryBridge};
pub use error::RegistryError;
pub use local::{LOCAL_REGISTRY_IMAGE, LocalRegistry};

use std::fmt;

/// Where an image registry can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEndpoint {
    pub host: String,
    pub port: u16,
    /// Started for this deployment only and removed when it ends.
    pub is_ephemeral: bool,
}

impl RegistryEndpoint {
    pub fn local(port: u16, is_ephemeral: bool) -> Self {
        Self {
            host: "localhost".to_string(),
            port,
            is_ephemeral,
        }
    }

    /// The registry as seen from any swarm node through the routing mesh.
    pub fn cluster(port: u16) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port,
            is_ephemeral: false,
        }
    }

    /// `host:port`, the registry component of an image reference.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for RegistryEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address())?;
        if self.is_ephemeral {
            write!(f, " (ephemeral)")?;
        }
        Ok(())
    }
}
