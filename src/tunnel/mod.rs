// ABOUTME: Reverse SSH tunnels from the swarm host back to the local registry.
// ABOUTME: Spawns ssh, resolves the remote-allocated port, and owns the process lifetime.

mod error;
mod handle;
mod manager;

pub use error::TunnelError;
pub use handle::{TunnelHandle, TunnelState};
pub use manager::{DEFAULT_ALLOCATION_TIMEOUT, TunnelManager, parse_allocated_port};
