// ABOUTME: Command module aggregator for the deployer CLI.
// ABOUTME: Re-exports the up, registry, and inspect command handlers.

mod inspect;
mod registry;
mod up;

pub use inspect::inspect;
pub use registry::{start_registry, stop_registry};
pub use up::up;

use std::path::{Path, PathBuf};

use deployer::config::Config;
use deployer::error::Result;

/// Load the config given with `--file`, or discover it in the current directory.
///
/// Returns the absolute path it was read from so worker processes can reuse it.
pub fn load_config(file: Option<&Path>) -> Result<(Config, PathBuf)> {
    let path = match file {
        Some(path) => path.to_path_buf(),
        None => Config::locate(&std::env::current_dir()?)?,
    };
    let path = std::path::absolute(&path)?;
    let config = Config::load(&path)?;
    Ok((config, path))
}
