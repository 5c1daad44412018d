// ABOUTME: Process execution layer shared by every pipeline component.
// ABOUTME: Runs local and remote (docker -H ssh://) commands through one trait.

mod command;
mod error;
mod lines;
mod local;
mod runner;

pub use command::{CommandSpec, OutputMode, docker, remote_docker, shell};
pub use error::ProcessError;
pub use lines::LossyLines;
pub use local::LocalRunner;
pub use runner::{OutputStream, ProcessControl, ProcessHandle, ProcessOutput, ProcessRunner};
