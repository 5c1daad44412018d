// ABOUTME: Process execution error types.
// ABOUTME: Separates launch failures from I/O failures; nonzero exits are not errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started at all (missing binary, permissions).
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    pub fn is_launch_failure(&self) -> bool {
        matches!(self, ProcessError::Launch { .. })
    }
}
