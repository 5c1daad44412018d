// ABOUTME: Tunnel error types.
// ABOUTME: Launch failures versus tunnels that never reported an allocated port.

use thiserror::Error;

use crate::process::ProcessError;

#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("reverse tunnel to {host} was not allocated: {detail}")]
    Allocation { host: String, detail: String },

    #[error(transparent)]
    Process(#[from] ProcessError),
}
