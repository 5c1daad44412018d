// ABOUTME: The ProcessRunner trait and the values it produces.
// ABOUTME: Buffered runs return ProcessOutput; spawned processes return a ProcessHandle.

use async_trait::async_trait;
use tokio::io::AsyncRead;

use super::command::CommandSpec;
use super::error::ProcessError;

/// Result of a completed command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// The most useful text to show when the command failed.
    pub fn error_text(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// A readable child output stream.
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Lifecycle control over a spawned process.
#[async_trait]
pub trait ProcessControl: Send {
    /// OS process id, if known.
    fn id(&self) -> Option<u32>;

    /// Wait for the process to exit and return its exit code.
    async fn wait(&mut self) -> std::io::Result<Option<i32>>;

    /// Request termination without waiting. Safe to call from `Drop`.
    fn kill(&mut self) -> std::io::Result<()>;
}

/// A process that is still running, with its output streams detached.
pub struct ProcessHandle {
    pub stdout: Option<OutputStream>,
    pub stderr: Option<OutputStream>,
    pub control: Box<dyn ProcessControl>,
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.control.id())
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .finish()
    }
}

/// Executes commands. Nonzero exits are reported through the output, never as errors.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run a command to completion.
    async fn run(&self, command: &CommandSpec) -> Result<ProcessOutput, ProcessError>;

    /// Start a command and hand back control before it completes.
    /// Output streams are always piped.
    fn spawn(&self, command: &CommandSpec) -> Result<ProcessHandle, ProcessError>;
}

#[async_trait]
impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    async fn run(&self, command: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        (**self).run(command).await
    }

    fn spawn(&self, command: &CommandSpec) -> Result<ProcessHandle, ProcessError> {
        (**self).spawn(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_text_prefers_stderr() {
        let output = ProcessOutput {
            exit_code: Some(1),
            stdout: "partial output".to_string(),
            stderr: "Error: No such image: api-img\n".to_string(),
        };
        assert_eq!(output.error_text(), "Error: No such image: api-img");
    }

    #[test]
    fn error_text_falls_back_to_stdout() {
        let output = ProcessOutput {
            exit_code: Some(1),
            stdout: " denied \n".to_string(),
            stderr: String::new(),
        };
        assert_eq!(output.error_text(), "denied");
    }

    #[test]
    fn signal_termination_is_not_success() {
        let output = ProcessOutput::default();
        assert!(!output.success());
    }
}
