// ABOUTME: Registry error types.
// ABOUTME: One variant per transfer step so failures keep their origin.

use thiserror::Error;

use crate::ports::PortError;
use crate::process::ProcessError;
use crate::topology::TopologyError;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Tagging failed, usually because the build produced a differently named image.
    #[error("could not tag {image} (is it the image `{build_command}` builds?): {detail}")]
    TagMismatch {
        image: String,
        build_command: String,
        detail: String,
    },

    #[error("failed to push {image}: {detail}")]
    Push { image: String, detail: String },

    #[error("failed to pull {image} on {host}: {detail}")]
    Pull {
        image: String,
        host: String,
        detail: String,
    },

    #[error("failed to relay {image} into the cluster registry on {host}: {detail}")]
    Relay {
        image: String,
        host: String,
        detail: String,
    },

    #[error("failed to start registry container {container}: {detail}")]
    Start { container: String, detail: String },

    #[error("failed to remove registry container {container}: {detail}")]
    Stop { container: String, detail: String },

    #[error(transparent)]
    Port(#[from] PortError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Process(#[from] ProcessError),
}
